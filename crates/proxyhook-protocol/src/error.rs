use thiserror::Error;

/// Errors that can occur while decoding an inbound frame
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Message has no type field")]
    MissingType,

    #[error("Message type is not a string: {0}")]
    InvalidType(serde_json::Value),

    #[error("Invalid {field} in {message_type} message: {reason}")]
    InvalidField {
        message_type: &'static str,
        field: &'static str,
        reason: String,
    },
}

impl DecodeError {
    pub fn invalid_field(
        message_type: &'static str,
        field: &'static str,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidField {
            message_type,
            field,
            reason: reason.to_string(),
        }
    }

    /// Whether the discriminator itself could not be read.
    ///
    /// Such frames are handled the same way as an unknown message type.
    pub fn is_undiscriminated(&self) -> bool {
        !matches!(self, DecodeError::InvalidField { .. })
    }
}
