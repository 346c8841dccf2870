//! Inbound frame parsing and outbound serialization

use crate::error::GameError;
use crate::types::{ClientEvent, ServerEvent};

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Parse and validate a text frame from a client
    pub fn parse_client_event(text: &str, max_name_length: usize) -> Result<ClientEvent, GameError> {
        let event: ClientEvent =
            serde_json::from_str(text).map_err(|e| GameError::InvalidMessage {
                reason: format!("Failed to deserialize client event: {}", e),
            })?;

        Self::validate_client_event(&event, max_name_length)?;
        Ok(event)
    }

    /// Validate a decoded client event
    pub fn validate_client_event(
        event: &ClientEvent,
        max_name_length: usize,
    ) -> Result<(), GameError> {
        if let ClientEvent::FindGame(name) = event {
            if name.trim().is_empty() {
                return Err(GameError::InvalidMessage {
                    reason: "Player name cannot be empty".to_string(),
                });
            }

            if name.chars().count() > max_name_length {
                return Err(GameError::InvalidMessage {
                    reason: format!(
                        "Player name exceeds {} characters",
                        max_name_length
                    ),
                });
            }
        }

        // Move targets are range-checked by the session registry so that
        // out-of-range cells surface as move rejections.
        Ok(())
    }

    /// Serialize a server event to a JSON text frame
    pub fn serialize_server_event(event: &ServerEvent) -> crate::error::Result<String> {
        serde_json::to_string(event).map_err(|e| {
            GameError::Internal {
                message: format!("Failed to serialize {} event: {}", event.name(), e),
            }
            .into()
        })
    }
}
