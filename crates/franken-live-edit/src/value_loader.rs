//! Renders the current value at `(object, key)` as re-enterable source text.

use crate::interpreter::{EvalFailure, Realm};
use crate::object_model::{JsValue, ObjectHandle, PropertyKey};

/// Render the own property `key` of `object`.
///
/// Inherited values are never surfaced. Strings become single-quoted
/// literals; everything else goes through the default string conversion.
/// An absent own property renders as `undefined`. An array too long to
/// render is a `RangeError`.
pub fn load(realm: &Realm, object: ObjectHandle, key: &str) -> Result<String, EvalFailure> {
    let value = realm
        .heap()
        .get_own_property(object, &PropertyKey::from(key))?
        .map_or(JsValue::Undefined, |desc| desc.value);
    match &value {
        JsValue::Str(text) => Ok(quote_string(text)),
        other => realm.to_display_string(other),
    }
}

/// Single-quote `text`, escaping only backslashes and single quotes.
pub fn quote_string(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for ch in text.chars() {
        if matches!(ch, '\\' | '\'') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('\'');
    quoted
}
