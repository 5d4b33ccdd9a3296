//! Provider adapters
//!
//! - [`ProviderAdapter`]: the interface every provider implements
//! - [`Registry`]: lookup of adapters by provider type
//! - one module per supported provider

pub mod config;
pub mod discord;
pub mod email;
pub mod github;
pub mod google_drive;
pub mod http;
pub mod metadata;
pub mod notion;
pub mod registry;
pub mod slack;
pub mod trait_;
pub mod webhook;

use serde_json::Value as JsonValue;

pub use metadata::{AuthType, ProviderMetadata};
pub use registry::{Registry, RegistryError};
pub use trait_::{Action, ActionData, ErrorKind, ProviderAdapter, ProviderError, ProviderOutput};

/// Sender name shown on chat notifications.
pub const BOT_USERNAME: &str = "Knowledge Base Bot";

/// Non-blank string field of an action payload.
pub fn required_str<'a>(
    payload: &'a JsonValue,
    key: &str,
    action: &Action,
) -> Result<&'a str, ProviderError> {
    optional_str(payload, key)
        .ok_or_else(|| ProviderError::invalid_payload(action, format!("'{key}' is required")))
}

/// String field of an action payload; blank values count as absent.
pub fn optional_str<'a>(payload: &'a JsonValue, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(JsonValue::as_str)
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_payload_fields_count_as_missing() {
        let payload = json!({"message": "  ", "subject": "Hi", "n": 3});
        assert_eq!(optional_str(&payload, "subject"), Some("Hi"));
        assert_eq!(optional_str(&payload, "message"), None);
        assert_eq!(optional_str(&payload, "n"), None);

        let err = required_str(&payload, "message", &Action::SendMessage).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPayload);
        assert_eq!(
            err.to_string(),
            "Invalid payload for send_message: 'message' is required"
        );
    }
}
