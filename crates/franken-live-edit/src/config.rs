//! Session configuration.
//!
//! Every field has a default, so an empty JSON object is a complete
//! configuration.

use serde::{Deserialize, Serialize};

use crate::edit_controller::EditConfig;
use crate::interpreter::InterpreterLimits;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveEditConfig {
    pub edit: EditConfig,
    pub interpreter: InterpreterLimits,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid live edit config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("max_source_bytes must be positive")]
    ZeroSourceLimit,
    #[error("parser max_depth must be positive")]
    ZeroParserDepth,
    #[error("max_events must be positive")]
    ZeroEventLimit,
    #[error("link_base_path must not contain '?' or '#': {0:?}")]
    InvalidLinkBase(String),
}

impl LiveEditConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.edit.max_source_bytes == 0 {
            return Err(ConfigError::ZeroSourceLimit);
        }
        if self.edit.parser_limits.max_depth == 0 {
            return Err(ConfigError::ZeroParserDepth);
        }
        if self.edit.max_events == 0 {
            return Err(ConfigError::ZeroEventLimit);
        }
        if self.edit.link_base_path.contains(['?', '#']) {
            return Err(ConfigError::InvalidLinkBase(
                self.edit.link_base_path.clone(),
            ));
        }
        Ok(())
    }
}
