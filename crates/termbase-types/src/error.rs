use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unsupported language code: {0}")]
    UnsupportedLanguage(String),

    #[error("invalid concept id: {0}")]
    InvalidId(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl TypeError {
    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
