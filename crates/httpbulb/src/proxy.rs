//! Device proxy: maps characteristic get/set onto the configured device urls.

use log::{debug, info, warn};
use parking_lot::Mutex;
use reqwest::blocking::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::StatusCache;
use crate::characteristic::{ColorMode, Property, Value};
use crate::config::{DeviceConfig, PropertyEndpoint};
use crate::error::{BulbError, Result};
use crate::pattern;
use crate::template::RenderedRequest;
use crate::units;

/// HAP default for ColorTemperature.
const DEFAULT_MIRED: i64 = 140;

/// Last known characteristic values, in HomeKit units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightState {
    pub on: bool,
    pub brightness: i64,
    pub hue: i64,
    pub saturation: i64,
    pub color_temperature: i64,
    pub color_mode: ColorMode,
}

impl LightState {
    fn new(config: &DeviceConfig) -> Self {
        let color_temperature = config
            .color_temperature
            .as_ref()
            .map(|endpoint| DEFAULT_MIRED.clamp(*endpoint.range.start(), *endpoint.range.end()))
            .unwrap_or(DEFAULT_MIRED);
        Self {
            on: false,
            brightness: 0,
            hue: 0,
            saturation: 0,
            color_temperature,
            color_mode: ColorMode::Undefined,
        }
    }

    pub fn get(&self, property: Property) -> Value {
        match property {
            Property::Power => Value::Bool(self.on),
            Property::Brightness => Value::Int(self.brightness),
            Property::Hue => Value::Int(self.hue),
            Property::Saturation => Value::Int(self.saturation),
            Property::ColorTemperature => Value::Int(self.color_temperature),
        }
    }

    fn set(&mut self, property: Property, value: Value) {
        match property {
            Property::Power => self.on = value.as_bool(),
            Property::Brightness => self.brightness = value.as_int(),
            Property::Hue => self.hue = value.as_int(),
            Property::Saturation => self.saturation = value.as_int(),
            Property::ColorTemperature => self.color_temperature = value.as_int(),
        }
    }
}

struct ProxyState {
    light: LightState,
    withhold_power_call: bool,
    caches: [StatusCache; 5],
}

impl ProxyState {
    fn remember(&mut self, property: Property, value: Value, now: Instant) {
        self.light.set(property, value);
        self.caches[property.index()].store(value, now);
    }
}

pub struct DeviceProxy {
    config: Arc<DeviceConfig>,
    client: Client,
    state: Mutex<ProxyState>,
    /// Held for the duration of a device request, one per property.
    in_flight: [Mutex<()>; 5],
    power_activity: (flume::Sender<()>, flume::Receiver<()>),
}

impl DeviceProxy {
    pub fn new(config: Arc<DeviceConfig>) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let caches = Property::ALL.map(|property| {
            let ttl = match property {
                Property::Power => config.power.status_cache,
                other => config
                    .endpoint(other)
                    .map(|endpoint| endpoint.status_cache)
                    .unwrap_or_default(),
            };
            StatusCache::new(ttl)
        });
        let state = ProxyState {
            light: LightState::new(&config),
            withhold_power_call: false,
            caches,
        };

        Ok(Self {
            config,
            client,
            state: Mutex::new(state),
            in_flight: Default::default(),
            power_activity: flume::bounded(1),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn snapshot(&self) -> LightState {
        self.state.lock().light
    }

    /// Fires once per power get/set/push; used to reset the pull timer.
    pub fn power_activity(&self) -> flume::Receiver<()> {
        self.power_activity.1.clone()
    }

    pub fn get(&self, property: Property) -> Result<Value> {
        let result = match property {
            Property::Power => {
                self.signal_power_activity();
                self.get_power(true).map(Value::Bool)
            }
            _ => self.get_level(property).map(Value::Int),
        };
        result.inspect_err(|err| warn!("[{}] get {} failed: {}", self.config.name, property, err))
    }

    pub fn set(&self, property: Property, value: Value) -> Result<()> {
        let result = match property {
            Property::Power => power_value(value).and_then(|on| self.set_power(on)),
            _ => level_value(property, value).and_then(|level| self.set_level(property, level)),
        };
        result.inspect_err(|err| warn!("[{}] set {} failed: {}", self.config.name, property, err))
    }

    /// Re-reads the power state from the device, ignoring the cache.
    pub fn poll_power(&self) -> Result<bool> {
        self.get_power(false)
    }

    /// Records a value reported by the device itself, without a read.
    pub fn push(&self, property: Property, value: Value) -> Result<()> {
        match property {
            Property::Power => {
                let on = power_value(value)?;
                self.signal_power_activity();
                self.state
                    .lock()
                    .remember(property, Value::Bool(on), Instant::now());
            }
            _ => {
                let endpoint = self.endpoint(property)?;
                let level = level_value(property, value)?;
                check_range(property, endpoint, level)?;
                self.state
                    .lock()
                    .remember(property, Value::Int(level), Instant::now());
            }
        }
        info!("[{}] Updating '{}' to new value: {}", self.config.name, property, value);
        Ok(())
    }

    fn endpoint(&self, property: Property) -> Result<&PropertyEndpoint> {
        self.config
            .endpoint(property)
            .ok_or(BulbError::Unsupported(property))
    }

    fn cached(&self, property: Property) -> Option<Value> {
        let value = self.state.lock().caches[property.index()].fresh(Instant::now());
        if let Some(value) = value {
            debug!("[{}] {} served from cache: {}", self.config.name, property, value);
        }
        value
    }

    fn get_power(&self, use_cache: bool) -> Result<bool> {
        if use_cache {
            if let Some(value) = self.cached(Property::Power) {
                return Ok(value.as_bool());
            }
        }

        let _guard = self.in_flight[Property::Power.index()].lock();
        let power = &self.config.power;
        let body = self.send(power.status_url.render(None, &[]))?;
        debug!("[{}] power status returned successfully. Body: '{}'", self.config.name, body);

        let on = pattern::matches(&power.status_pattern, &body);
        debug!("[{}] power is currently {}", self.config.name, if on { "ON" } else { "OFF" });
        self.state
            .lock()
            .remember(Property::Power, Value::Bool(on), Instant::now());
        Ok(on)
    }

    fn get_level(&self, property: Property) -> Result<i64> {
        let endpoint = self.endpoint(property)?;

        if matches!(property, Property::Hue | Property::Saturation) {
            let light = self.snapshot();
            if light.color_mode == ColorMode::Temperature {
                let value = light.get(property).as_int();
                debug!(
                    "[{}] {} derived from color temperature: {}",
                    self.config.name, property, value
                );
                return Ok(value);
            }
        }
        if let Some(value) = self.cached(property) {
            return Ok(value.as_int());
        }

        let _guard = self.in_flight[property.index()].lock();
        let body = self.send(endpoint.status_url.render(None, &[]))?;
        debug!(
            "[{}] {} status returned successfully. Body: '{}'",
            self.config.name, property, body
        );

        let raw = pattern::extract(&endpoint.status_pattern, &body, endpoint.group_index)?;
        let value = endpoint.unit.to_homekit(raw);
        check_range(property, endpoint, value)?;
        debug!("[{}] {} is currently at {}", self.config.name, property, value);

        self.state
            .lock()
            .remember(property, Value::Int(value), Instant::now());
        Ok(value)
    }

    fn set_power(&self, on: bool) -> Result<()> {
        self.signal_power_activity();
        {
            let mut state = self.state.lock();
            if on && state.withhold_power_call && state.light.on {
                state.withhold_power_call = false;
                debug!("[{}] withholding power on request, light is already on", self.config.name);
                return Ok(());
            }
        }

        let _guard = self.in_flight[Property::Power.index()].lock();
        let power = &self.config.power;
        let template = if on { &power.on_url } else { &power.off_url };
        let siblings = self.siblings(None);
        let body = self.send(template.render(None, &siblings))?;
        debug!(
            "[{}] Successfully set power to {}. Body: '{}'",
            self.config.name,
            if on { "ON" } else { "OFF" },
            body
        );

        self.state
            .lock()
            .remember(Property::Power, Value::Bool(on), Instant::now());
        Ok(())
    }

    fn set_level(&self, property: Property, value: i64) -> Result<()> {
        let endpoint = self.endpoint(property)?;
        check_range(property, endpoint, value)?;

        if property == Property::Brightness {
            // An on request already on its way reaches the device first.
            drop(self.in_flight[Property::Power.index()].lock());
        }

        let _guard = self.in_flight[property.index()].lock();
        let device_value = endpoint.unit.to_device(value).to_string();
        let siblings = self.siblings(Some((property, value)));
        let body = self.send(endpoint.set_url.render(Some(&device_value), &siblings))?;
        debug!(
            "[{}] Successfully set {} to {}. Body: '{}'",
            self.config.name, property, value, body
        );

        let mut state = self.state.lock();
        state.remember(property, Value::Int(value), Instant::now());
        match property {
            Property::Brightness if endpoint.withhold_power_update => {
                state.withhold_power_call = true;
            }
            Property::Hue | Property::Saturation => state.light.color_mode = ColorMode::Color,
            Property::ColorTemperature => {
                let hsv = units::temperature_to_hsv(value);
                state.light.color_mode = ColorMode::Temperature;
                state.light.hue = i64::from(hsv.hue);
                state.light.saturation = i64::from(hsv.saturation);
                state.caches[Property::Hue.index()].invalidate();
                state.caches[Property::Saturation.index()].invalidate();
                debug!(
                    "[{}] color temperature {} mired shown as hue {} saturation {}",
                    self.config.name, value, hsv.hue, hsv.saturation
                );
            }
            _ => {}
        }
        Ok(())
    }

    /// Current values for `%brightness` style placeholders; `pending` overrides the stored value.
    fn siblings(&self, pending: Option<(Property, i64)>) -> Vec<(&'static str, i64)> {
        let light = self.snapshot();
        Property::ALL
            .into_iter()
            .filter(|property| self.config.endpoint(*property).is_some())
            .filter_map(|property| {
                let placeholder = property.placeholder()?;
                let value = match pending {
                    Some((pending, value)) if pending == property => value,
                    _ => light.get(property).as_int(),
                };
                Some((placeholder, value))
            })
            .collect()
    }

    fn send(&self, request: RenderedRequest) -> Result<String> {
        debug!("[{}] {} {}", self.config.name, request.method, request.url);
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &self.config.auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(BulbError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn signal_power_activity(&self) {
        let _ = self.power_activity.0.try_send(());
    }
}

fn check_range(property: Property, endpoint: &PropertyEndpoint, value: i64) -> Result<()> {
    if endpoint.range.contains(&value) {
        return Ok(());
    }
    Err(BulbError::Range {
        property,
        value,
        min: *endpoint.range.start(),
        max: *endpoint.range.end(),
    })
}

fn power_value(value: Value) -> Result<bool> {
    match value {
        Value::Bool(on) => Ok(on),
        Value::Int(0) => Ok(false),
        Value::Int(1) => Ok(true),
        Value::Int(other) => Err(BulbError::InvalidValue {
            property: Property::Power,
            value: other.to_string(),
        }),
    }
}

fn level_value(property: Property, value: Value) -> Result<i64> {
    match value {
        Value::Int(level) => Ok(level),
        Value::Bool(other) => Err(BulbError::InvalidValue {
            property,
            value: other.to_string(),
        }),
    }
}
