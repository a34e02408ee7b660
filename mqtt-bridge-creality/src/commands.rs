//! Commands received from the broker.

use serde_json::json;

/// Requested light state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCommand {
    On,
    Off,
}

impl LightCommand {
    /// Parse a command payload: `ON`/`1` or `OFF`/`0`.
    pub fn parse(payload: &str) -> Option<Self> {
        match payload.trim() {
            "ON" | "1" => Some(LightCommand::On),
            "OFF" | "0" => Some(LightCommand::Off),
            _ => None,
        }
    }

    /// Printer control message for this command.
    pub fn to_ws_message(&self) -> String {
        let light_sw = match self {
            LightCommand::On => 1,
            LightCommand::Off => 0,
        };
        json!({ "method": "set", "params": { "lightSw": light_sw } }).to_string()
    }
}
