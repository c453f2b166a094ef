use thiserror::Error;

/// Internal failures raised while building or running the engine.
///
/// These never cross the public `sanitize`/`analyze`/`validate` boundaries;
/// each boundary logs the error and converts it into a conservative result.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Invalid configuration for {key}: {reason}")]
    Config { key: String, reason: String },

    #[error("Failed to compile pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to convert content to text: {0}")]
    Conversion(#[from] serde_json::Error),

    #[error("Content of {actual} bytes exceeds the analysis bound of {max} bytes")]
    InputTooLarge { max: usize, actual: usize },
}

impl GuardError {
    pub(crate) fn config(key: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            key: key.to_owned(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        assert_eq!(
            GuardError::InputTooLarge { max: 10, actual: 11 }.to_string(),
            "Content of 11 bytes exceeds the analysis bound of 10 bytes"
        );
        assert_eq!(
            GuardError::config("max_title_length", "must be positive").to_string(),
            "Invalid configuration for max_title_length: must be positive"
        );
    }
}
