//! HTTP-controlled light bulb exposed as On/Brightness/Hue/Saturation/ColorTemperature.
//!
//! Characteristic reads and writes become requests against user-configured
//! device urls; status bodies are parsed with regular expressions and
//! converted between device units and HomeKit units.

pub mod accessory;
pub mod cache;
pub mod characteristic;
pub mod config;
pub mod error;
pub mod notification;
pub mod pattern;
pub mod proxy;
pub mod pull_timer;
pub mod template;
pub mod units;

pub use accessory::{register, AccessoryInformation, Lightbulb};
pub use characteristic::{ColorMode, Property, Value};
pub use config::DeviceConfig;
pub use error::{BulbError, ConfigError, ExtractionError, Result};
pub use notification::Notification;
pub use proxy::{DeviceProxy, LightState};
