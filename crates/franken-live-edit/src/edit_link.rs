//! Addressable "edit this" references.
//!
//! A link has the shape `<base>?objId=<handle>[&name=<name>][&key=<key>]`
//! with `name` and `key` escaped like `encodeURIComponent`.

use serde::{Deserialize, Serialize};

use crate::identity_registry::EditHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLink {
    pub handle: EditHandle,
    pub name: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditLinkError {
    #[error("edit link has no query string")]
    MissingQuery,
    #[error("edit link has no objId parameter")]
    MissingHandle,
    #[error("invalid objId {0:?}")]
    InvalidHandle(String),
    #[error("invalid percent-encoding in {0:?}")]
    InvalidEncoding(String),
}

/// Empty or absent `name`/`key` parameters are omitted.
pub fn build_edit_link(
    base_path: &str,
    handle: EditHandle,
    name: Option<&str>,
    key: Option<&str>,
) -> String {
    let mut link = format!("{base_path}?objId={handle}");
    for (param, value) in [("name", name), ("key", key)] {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            link.push('&');
            link.push_str(param);
            link.push('=');
            link.push_str(&encode_uri_component(value));
        }
    }
    link
}

pub fn parse_edit_link(link: &str) -> Result<EditLink, EditLinkError> {
    let (_, query) = link.split_once('?').ok_or(EditLinkError::MissingQuery)?;
    let query = query.split_once('#').map_or(query, |(query, _)| query);
    let mut handle = None;
    let mut name = None;
    let mut key = None;
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (param, raw) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode_uri_component(raw)
            .ok_or_else(|| EditLinkError::InvalidEncoding(raw.to_string()))?;
        match param {
            "objId" => {
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| EditLinkError::InvalidHandle(value.clone()))?;
                handle = Some(EditHandle(parsed));
            }
            "name" => name = Some(value),
            "key" => key = Some(value),
            _ => {}
        }
    }
    Ok(EditLink {
        handle: handle.ok_or(EditLinkError::MissingHandle)?,
        name,
        key,
    })
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(byte, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

/// Percent-encode every UTF-8 byte outside the unreserved set.
pub fn encode_uri_component(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for byte in text.bytes() {
        if is_unreserved(byte) {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// Inverse of [`encode_uri_component`]; also reads `+` as a space.
/// Returns `None` for a malformed escape or non-UTF-8 result.
pub fn decode_uri_component(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'%' => {
                let hex = text.get(index + 1..index + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                index += 3;
            }
            b'+' => {
                decoded.push(b' ');
                index += 1;
            }
            byte => {
                decoded.push(byte);
                index += 1;
            }
        }
    }
    String::from_utf8(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_embeds_handle_and_escaped_params() {
        assert_eq!(
            build_edit_link("/edit", EditHandle(3), Some("my config"), Some("a&b")),
            "/edit?objId=3&name=my%20config&key=a%26b"
        );
    }

    #[test]
    fn empty_params_are_omitted() {
        assert_eq!(
            build_edit_link("/edit", EditHandle(0), None, Some("")),
            "/edit?objId=0"
        );
        assert_eq!(
            build_edit_link("/edit", EditHandle(0), Some(""), Some("k")),
            "/edit?objId=0&key=k"
        );
    }

    #[test]
    fn encoding_matches_encode_uri_component() {
        assert_eq!(encode_uri_component("A-z_0.!~*'()"), "A-z_0.!~*'()");
        assert_eq!(encode_uri_component("a b/c?d=e"), "a%20b%2Fc%3Fd%3De");
        assert_eq!(encode_uri_component("é"), "%C3%A9");
    }

    #[test]
    fn parse_inverts_build() {
        let link = build_edit_link("/edit", EditHandle(12), Some("naïve name"), Some("k/1"));
        assert_eq!(
            parse_edit_link(&link),
            Ok(EditLink {
                handle: EditHandle(12),
                name: Some("naïve name".into()),
                key: Some("k/1".into()),
            })
        );
    }

    #[test]
    fn parse_reports_malformed_links() {
        assert_eq!(parse_edit_link("/edit"), Err(EditLinkError::MissingQuery));
        assert_eq!(
            parse_edit_link("/edit?key=k"),
            Err(EditLinkError::MissingHandle)
        );
        assert_eq!(
            parse_edit_link("/edit?objId=-1"),
            Err(EditLinkError::InvalidHandle("-1".into()))
        );
        assert_eq!(
            parse_edit_link("/edit?objId=1&key=%zz"),
            Err(EditLinkError::InvalidEncoding("%zz".into()))
        );
    }

    #[test]
    fn decode_accepts_plus_and_rejects_truncated_escapes() {
        assert_eq!(decode_uri_component("a+b%21"), Some("a b!".into()));
        assert_eq!(decode_uri_component("%2"), None);
        assert_eq!(decode_uri_component("%FF"), None);
    }
}
