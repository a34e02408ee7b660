//! Device identity.

use std::fmt;

use url::Url;

use crate::snapshot::Snapshot;

/// Manufacturer reported in every device block.
pub const MANUFACTURER: &str = "Creality";

const DEFAULT_ID: &str = "creality_printer";
const DEFAULT_NAME: &str = "Creality Printer";
const DEFAULT_MODEL: &str = "K1/K1 SE/K1 Max";

/// Identity of the bridged printer, fixed for the life of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Topic-safe device id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Printer model.
    pub model: String,
    /// Network address of the printer, when known.
    pub printer_address: Option<String>,
}

impl DeviceIdentity {
    /// Derive the identity from the first snapshot.
    ///
    /// A non-empty `name_override` replaces the reported name.
    pub fn from_snapshot(
        snapshot: &Snapshot,
        name_override: Option<&str>,
        printer_address: Option<String>,
    ) -> Self {
        let field = |keys: [&str; 2]| {
            keys.into_iter()
                .find_map(|key| snapshot.str(key))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let id = field(["deviceId", "device_id"]).unwrap_or(DEFAULT_ID);
        let name = name_override
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or_else(|| field(["deviceName", "device_name"]))
            .unwrap_or(DEFAULT_NAME);
        let model = field(["deviceModel", "device_model"]).unwrap_or(DEFAULT_MODEL);

        Self {
            id: sanitize_id(id),
            name: name.to_string(),
            model: model.to_string(),
            printer_address,
        }
    }

    /// Manufacturer name.
    pub fn manufacturer(&self) -> &'static str {
        MANUFACTURER
    }

    /// Unique id of an entity owned by this device.
    pub fn unique_id(&self, entity_id: &str) -> String {
        format!("{}_{}", self.id, entity_id)
    }

    /// Camera stream URL, when the printer address is known.
    pub fn camera_stream_url(&self) -> Option<String> {
        self.printer_address
            .as_deref()
            .map(|addr| format!("http://{}:8080/?action=stream", addr))
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {}, id {})",
            self.name, MANUFACTURER, self.model, self.id
        )?;
        if let Some(addr) = &self.printer_address {
            write!(f, " at {}", addr)?;
        }
        Ok(())
    }
}

/// Lowercase an id and replace spaces and dashes with underscores.
pub fn sanitize_id(id: &str) -> String {
    id.to_lowercase().replace([' ', '-'], "_")
}

/// Host part of the printer WebSocket URL.
pub fn printer_address_from_url(ws_url: &str) -> Option<String> {
    Url::parse(ws_url.trim())
        .ok()?
        .host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_snapshot() {
        let snapshot =
            Snapshot::parse(br#"{"deviceId":"K1-SE 01","deviceName":"Garage","deviceModel":"K1 SE"}"#)
                .unwrap();

        let identity = DeviceIdentity::from_snapshot(&snapshot, None, None);
        assert_eq!(identity.id, "k1_se_01");
        assert_eq!(identity.name, "Garage");
        assert_eq!(identity.model, "K1 SE");
        assert_eq!(identity.unique_id("printing"), "k1_se_01_printing");
        assert_eq!(identity.camera_stream_url(), None);
    }

    #[test]
    fn test_identity_defaults_and_fallback_keys() {
        let identity = DeviceIdentity::from_snapshot(&Snapshot::default(), None, None);
        assert_eq!(identity.id, "creality_printer");
        assert_eq!(identity.name, "Creality Printer");
        assert_eq!(identity.model, "K1/K1 SE/K1 Max");

        let snapshot = Snapshot::parse(br#"{"device_id":"k1","device_model":"K1 Max","deviceId":7}"#)
            .unwrap();
        let identity = DeviceIdentity::from_snapshot(&snapshot, None, None);
        assert_eq!(identity.id, "k1");
        assert_eq!(identity.model, "K1 Max");
    }

    #[test]
    fn test_name_override() {
        let snapshot = Snapshot::parse(br#"{"deviceName":"Reported"}"#).unwrap();

        let identity = DeviceIdentity::from_snapshot(&snapshot, Some("Configured"), None);
        assert_eq!(identity.name, "Configured");

        let identity = DeviceIdentity::from_snapshot(&snapshot, Some("  "), None);
        assert_eq!(identity.name, "Reported");
    }

    #[test]
    fn test_printer_address() {
        assert_eq!(
            printer_address_from_url("ws://192.168.1.50:9999/").as_deref(),
            Some("192.168.1.50")
        );
        assert_eq!(printer_address_from_url("not a url"), None);

        let identity = DeviceIdentity::from_snapshot(
            &Snapshot::default(),
            None,
            printer_address_from_url("ws://k1.lan:9999"),
        );
        assert_eq!(
            identity.camera_stream_url().as_deref(),
            Some("http://k1.lan:8080/?action=stream")
        );
    }
}
