//! The lightbulb accessory as seen by whoever drives it.

use log::{info, log, warn, Level};
use serde::Serialize;
use std::sync::Arc;

use crate::characteristic::{Property, Value};
use crate::config::DeviceConfig;
use crate::error::Result;
use crate::notification::{self, Notification};
use crate::proxy::{DeviceProxy, LightState};
use crate::pull_timer::PullTimer;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryInformation {
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial_number: &'static str,
    pub firmware_revision: &'static str,
    pub characteristics: Vec<Property>,
}

pub struct Lightbulb {
    proxy: Arc<DeviceProxy>,
    pull_timer: Option<PullTimer>,
}

/// Builds the accessory, or logs why it can't and returns `None`.
pub fn register(config: serde_json::Value) -> Option<Lightbulb> {
    let config = match DeviceConfig::from_value(config) {
        Ok(config) => config,
        Err(err) => {
            warn!("Error occurred while parsing configuration: {err}");
            warn!("Aborting...");
            return None;
        }
    };
    match Lightbulb::new(config) {
        Ok(lightbulb) => Some(lightbulb),
        Err(err) => {
            warn!("Error occurred while creating the lightbulb: {err}");
            warn!("Aborting...");
            None
        }
    }
}

impl Lightbulb {
    pub fn new(config: DeviceConfig) -> Result<Self> {
        let pull_interval = config.pull_interval;
        let proxy = Arc::new(DeviceProxy::new(Arc::new(config))?);

        let pull_timer = match pull_interval {
            Some(interval) => match PullTimer::start(proxy.clone(), interval) {
                Ok(timer) => Some(timer),
                Err(err) => {
                    warn!("Failed to start pull timer: {err}");
                    None
                }
            },
            None => None,
        };

        let lightbulb = Self { proxy, pull_timer };
        lightbulb.log_options();
        Ok(lightbulb)
    }

    pub fn name(&self) -> &str {
        &self.proxy.config().name
    }

    pub fn proxy(&self) -> &Arc<DeviceProxy> {
        &self.proxy
    }

    pub fn characteristics(&self) -> Vec<Property> {
        let config = self.proxy.config();
        Property::ALL
            .into_iter()
            .filter(|property| config.supports(*property))
            .collect()
    }

    pub fn information(&self) -> AccessoryInformation {
        AccessoryInformation {
            name: self.name().to_string(),
            manufacturer: "httpbulb",
            model: "HTTP Lightbulb",
            serial_number: "LB01",
            firmware_revision: env!("CARGO_PKG_VERSION"),
            characteristics: self.characteristics(),
        }
    }

    pub fn identify(&self) {
        info!("[{}] Identify requested!", self.name());
    }

    pub fn get(&self, property: Property) -> Result<Value> {
        self.proxy.get(property)
    }

    pub fn set(&self, property: Property, value: Value) -> Result<()> {
        self.proxy.set(property, value)
    }

    pub fn notify(&self, notification: &Notification) -> Result<Property> {
        notification::apply(&self.proxy, notification).inspect_err(|err| {
            warn!("[{}] Ignoring notification: {err}", self.name())
        })
    }

    pub fn state(&self) -> LightState {
        self.proxy.snapshot()
    }

    fn log_options(&self) {
        let config = self.proxy.config();
        let level = if config.debug { Level::Info } else { Level::Debug };
        info!("[{}] Lightbulb successfully configured...", config.name);
        log!(level, "[{}] Lightbulb started with the following options:", config.name);
        log!(level, "  - power: {:?}", config.power);
        for property in self.characteristics() {
            if let Some(endpoint) = config.endpoint(property) {
                log!(level, "  - {property}: {endpoint:?}");
            }
        }
        if let Some(auth) = &config.auth {
            log!(level, "  - auth options: {auth:?}");
        }
        if let Some(timer) = &self.pull_timer {
            log!(level, "  - pullTimer started with interval {:?}", timer.interval());
        }
    }
}
