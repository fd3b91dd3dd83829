//! Error types for the messaging core.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Conversation or thread retrieval failed. Non-fatal: the caller keeps
    /// whatever data it already has and may retry.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The durable write failed after all attempts. Carries the original text
    /// so the composer can be restored for a retry.
    #[error("Send failed: {reason}")]
    Send { reason: String, content: String },

    /// Could not create or locate a conversation when starting a new chat.
    #[error("Conversation error: {0}")]
    Conversation(String),

    /// A realtime feed could not be established or dropped.
    #[error("Subscription error: {0}")]
    Subscription(String),
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_keeps_content() {
        let err = Error::Send {
            reason: "relay refused".to_string(),
            content: "hello there".to_string(),
        };
        match err {
            Error::Send { content, .. } => assert_eq!(content, "hello there"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_error_serializes_as_display_string() {
        let err = Error::Fetch("backend offline".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Fetch failed: backend offline\"");
    }
}
