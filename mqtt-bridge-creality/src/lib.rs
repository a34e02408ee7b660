//! MQTT bridge for Creality 3D printers.
//!
//! The printer pushes JSON telemetry snapshots over a WebSocket. This crate
//! turns each snapshot into MQTT topics and announces the printer to Home
//! Assistant through MQTT discovery.
//!
//! - [`session`] - WebSocket session with reconnection
//! - [`snapshot`] - Loosely typed snapshot access and numeric coercion
//! - [`normalize`] - Generic `{base}/{snake_case_key}` topics
//! - [`derive`] - Structured temperature, job, status and CFS topics
//! - [`discovery`] - Discovery catalog, startup cleanup and purge
//! - [`bridge`] - Orchestration of all of the above
//!
//! # Topic layout
//!
//! With base topic `creality/k1`:
//!
//! ```text
//! creality/k1/status                       online / offline (retained)
//! creality/k1/nozzle_temp                  219.900
//! creality/k1/temperature/nozzle/current   219.900
//! creality/k1/job/progress                 50
//! creality/k1/printing                     true
//! creality/k1/printer_status               active
//! creality/k1/cfs/1/humidity               28
//! creality/k1/light_sw/set                 ON / OFF (command)
//! ```

pub mod admin;
pub mod bridge;
pub mod commands;
pub mod config;
pub mod derive;
pub mod discovery;
pub mod identity;
pub mod normalize;
pub mod session;
pub mod snapshot;

pub use bridge::{ControlChannel, CrealityBridge};
pub use config::{ConfigOverrides, CrealityBridgeConfig, CrealityConfig};
pub use identity::DeviceIdentity;
pub use session::{MessageHandler, Session, SessionError, SessionHandle, SessionState};
pub use snapshot::Snapshot;
