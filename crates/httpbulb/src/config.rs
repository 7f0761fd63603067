//! Accessory configuration.
//!
//! The JSON layout follows the HTTP lightbulb accessory configuration:
//! power urls at the top level (or in the legacy `power` object), and one
//! optional object per color/brightness characteristic. Parsing produces a
//! single immutable [`DeviceConfig`].

use log::warn;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheTtl;
use crate::characteristic::Property;
use crate::error::ConfigError;
use crate::pattern::DEFAULT_GROUP_INDEX;
use crate::template::{RawUrl, UrlTemplate};
use crate::units;

const DEFAULT_NAME: &str = "Lightbulb";
const DEFAULT_TIMEOUT_MS: u64 = 3000;
const DEFAULT_POWER_PATTERN: &str = "1";
const DEFAULT_LEVEL_PATTERN: &str = "([0-9]{1,3})";
const DEFAULT_ZIGBEE_PATTERN: &str = "([0-9]{1,5})";
const DEFAULT_MIRED_PATTERN: &str = "([0-9]{2,3})";
const DEFAULT_KELVIN_PATTERN: &str = "([0-9]{4,5})";
/// HAP defaults for the ColorTemperature characteristic.
pub const MIRED_MIN: i64 = 50;
pub const MIRED_MAX: i64 = 400;

/// Device-side unit of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Percent,
    /// 0-254 levels.
    Rgb,
    Degrees,
    /// 0-65535 hue.
    Zigbee,
    Mired,
    Kelvin,
}

impl Unit {
    /// Device value to HomeKit value.
    pub fn to_homekit(self, raw: i64) -> i64 {
        match self {
            Unit::Percent | Unit::Degrees | Unit::Mired => raw,
            Unit::Rgb => units::rgb_to_percent(raw),
            Unit::Zigbee => units::zigbee_to_degrees(raw),
            Unit::Kelvin => units::kelvin_to_mired(raw),
        }
    }

    /// HomeKit value to device value.
    pub fn to_device(self, value: i64) -> i64 {
        match self {
            Unit::Percent | Unit::Degrees | Unit::Mired => value,
            Unit::Rgb => units::percent_to_rgb(value),
            Unit::Zigbee => units::degrees_to_zigbee(value),
            Unit::Kelvin => units::mired_to_kelvin(value),
        }
    }

    fn parse(property: Property, name: Option<&str>) -> Result<Self, ConfigError> {
        let name = name.unwrap_or("").trim().to_ascii_lowercase();
        let unit = match (property, name.as_str()) {
            (Property::Brightness | Property::Saturation, "" | "percent") => Unit::Percent,
            (Property::Brightness | Property::Saturation, "rgb") => Unit::Rgb,
            (Property::Hue, "" | "hsv" | "degrees") => Unit::Degrees,
            (Property::Hue, "zigbee") => Unit::Zigbee,
            (Property::ColorTemperature, "" | "mired") => Unit::Mired,
            (Property::ColorTemperature, "kelvin") => Unit::Kelvin,
            _ => {
                return Err(ConfigError::UnsupportedUnit {
                    property: config_key(property).to_string(),
                    unit: name,
                })
            }
        };
        Ok(unit)
    }

    fn default_pattern(self) -> &'static str {
        match self {
            Unit::Zigbee => DEFAULT_ZIGBEE_PATTERN,
            Unit::Mired => DEFAULT_MIRED_PATTERN,
            Unit::Kelvin => DEFAULT_KELVIN_PATTERN,
            Unit::Percent | Unit::Rgb | Unit::Degrees => DEFAULT_LEVEL_PATTERN,
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PowerEndpoint {
    pub on_url: UrlTemplate,
    pub off_url: UrlTemplate,
    pub status_url: UrlTemplate,
    pub status_pattern: Regex,
    pub status_cache: CacheTtl,
}

#[derive(Debug, Clone)]
pub struct PropertyEndpoint {
    pub set_url: UrlTemplate,
    pub status_url: UrlTemplate,
    pub status_pattern: Regex,
    pub group_index: usize,
    pub unit: Unit,
    /// Legal HomeKit-side values.
    pub range: RangeInclusive<i64>,
    pub status_cache: CacheTtl,
    pub withhold_power_update: bool,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub name: String,
    pub debug: bool,
    pub timeout: Duration,
    pub auth: Option<Credentials>,
    pub pull_interval: Option<Duration>,
    pub power: PowerEndpoint,
    pub brightness: Option<PropertyEndpoint>,
    pub hue: Option<PropertyEndpoint>,
    pub saturation: Option<PropertyEndpoint>,
    pub color_temperature: Option<PropertyEndpoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    name: Option<String>,
    #[serde(default)]
    debug: bool,
    timeout: Option<u64>,
    on_url: Option<RawUrl>,
    off_url: Option<RawUrl>,
    status_url: Option<RawUrl>,
    power: Option<serde_json::Value>,
    status_pattern: Option<serde_json::Value>,
    #[serde(default)]
    status_cache: CacheTtl,
    brightness: Option<serde_json::Value>,
    hue: Option<serde_json::Value>,
    saturation: Option<serde_json::Value>,
    color_temperature: Option<serde_json::Value>,
    auth: Option<RawAuth>,
    pull_interval: Option<u64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawPower {
    on_url: Option<RawUrl>,
    off_url: Option<RawUrl>,
    status_url: Option<RawUrl>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProperty {
    set_url: Option<RawUrl>,
    status_url: Option<RawUrl>,
    unit: Option<String>,
    status_pattern: Option<serde_json::Value>,
    pattern_group_to_extract: Option<usize>,
    #[serde(default)]
    withhold_power_update: bool,
    #[serde(default)]
    status_cache: CacheTtl,
    min_value: Option<serde_json::Value>,
    max_value: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawAuth {
    username: Option<String>,
    password: Option<String>,
}

impl DeviceConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)?;
        Self::from_value(serde_json::from_slice(&bytes)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_value(value)?;

        let legacy: RawPower = match raw.power {
            Some(legacy @ serde_json::Value::Object(_)) => serde_json::from_value(legacy)?,
            _ => RawPower::default(),
        };
        let power = PowerEndpoint {
            on_url: required_url("onUrl", raw.on_url, legacy.on_url)?,
            off_url: required_url("offUrl", raw.off_url, legacy.off_url)?,
            status_url: required_url("statusUrl", raw.status_url, legacy.status_url)?,
            status_pattern: compile_pattern(
                "statusPattern",
                raw.status_pattern,
                DEFAULT_POWER_PATTERN,
            )?,
            status_cache: raw.status_cache,
        };

        let auth = match raw.auth {
            Some(RawAuth {
                username: Some(username),
                password: Some(password),
            }) if !username.is_empty() && !password.is_empty() => {
                Some(Credentials { username, password })
            }
            Some(_) => {
                warn!("'auth.username' and/or 'auth.password' was not set!");
                None
            }
            None => None,
        };

        Ok(Self {
            name: raw.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            debug: raw.debug,
            timeout: Duration::from_millis(
                raw.timeout
                    .filter(|millis| *millis > 0)
                    .unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
            auth,
            pull_interval: raw
                .pull_interval
                .filter(|millis| *millis > 0)
                .map(Duration::from_millis),
            power,
            brightness: parse_property(Property::Brightness, raw.brightness)?,
            hue: parse_property(Property::Hue, raw.hue)?,
            saturation: parse_property(Property::Saturation, raw.saturation)?,
            color_temperature: parse_property(Property::ColorTemperature, raw.color_temperature)?,
        })
    }

    /// Endpoint of an optional characteristic; `None` for power or when not configured.
    pub fn endpoint(&self, property: Property) -> Option<&PropertyEndpoint> {
        match property {
            Property::Power => None,
            Property::Brightness => self.brightness.as_ref(),
            Property::Hue => self.hue.as_ref(),
            Property::Saturation => self.saturation.as_ref(),
            Property::ColorTemperature => self.color_temperature.as_ref(),
        }
    }

    pub fn supports(&self, property: Property) -> bool {
        property == Property::Power || self.endpoint(property).is_some()
    }

    pub fn withhold_power_update(&self) -> bool {
        self.brightness
            .as_ref()
            .is_some_and(|endpoint| endpoint.withhold_power_update)
    }
}

/// `$XDG_CONFIG_HOME/httpbulb/config.json`, falling back to `~/.config`.
pub fn default_config_path() -> Option<PathBuf> {
    let base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg)
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config")
    } else {
        return None;
    };
    Some(base.join("httpbulb").join("config.json"))
}

fn config_key(property: Property) -> &'static str {
    match property {
        Property::Power => "power",
        Property::Brightness => "brightness",
        Property::Hue => "hue",
        Property::Saturation => "saturation",
        Property::ColorTemperature => "colorTemperature",
    }
}

fn required_url(
    name: &str,
    location: Option<RawUrl>,
    legacy: Option<RawUrl>,
) -> Result<UrlTemplate, ConfigError> {
    location
        .or(legacy)
        .ok_or_else(|| ConfigError::MissingProperty(name.to_string()))?
        .parse(name)
}

/// Falls back to the default pattern, with a warning, when the configured one isn't a string or doesn't compile.
fn compile_pattern(
    name: &str,
    configured: Option<serde_json::Value>,
    default: &str,
) -> Result<Regex, ConfigError> {
    match configured {
        None | Some(serde_json::Value::Null) => {}
        Some(serde_json::Value::String(pattern)) => match Regex::new(&pattern) {
            Ok(regex) => return Ok(regex),
            Err(err) => warn!("Property '{name}' is not a valid pattern ({err}). Using the default one!"),
        },
        Some(_) => warn!("Property '{name}' was given in an unsupported type. Using the default one!"),
    }
    Regex::new(default).map_err(|err| ConfigError::InvalidPattern {
        property: name.to_string(),
        message: err.to_string(),
    })
}

fn parse_property(
    property: Property,
    value: Option<serde_json::Value>,
) -> Result<Option<PropertyEndpoint>, ConfigError> {
    let key = config_key(property);
    let value = match value {
        None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => {
            return Ok(None)
        }
        Some(value @ serde_json::Value::Object(_)) => value,
        Some(_) => return Err(ConfigError::NotAnObject(key.to_string())),
    };
    let raw: RawProperty = serde_json::from_value(value)?;

    let (set_url, status_url) = match (raw.set_url, raw.status_url) {
        (Some(set_url), Some(status_url)) => (set_url, status_url),
        _ => return Err(ConfigError::MissingUrls(key.to_string())),
    };
    let set_url = set_url.parse(&format!("{key}.setUrl"))?;
    let status_url = status_url.parse(&format!("{key}.statusUrl"))?;

    let unit = Unit::parse(property, raw.unit.as_deref())?;
    let status_pattern = compile_pattern(
        &format!("{key}.statusPattern"),
        raw.status_pattern,
        unit.default_pattern(),
    )?;

    let range = match property {
        Property::Hue => 0..=360,
        Property::ColorTemperature => temperature_range(unit, raw.min_value, raw.max_value)?,
        _ => 0..=100,
    };

    Ok(Some(PropertyEndpoint {
        set_url,
        status_url,
        status_pattern,
        group_index: raw.pattern_group_to_extract.unwrap_or(DEFAULT_GROUP_INDEX),
        unit,
        range,
        status_cache: raw.status_cache,
        withhold_power_update: property == Property::Brightness && raw.withhold_power_update,
    }))
}

/// Bounds are configured in the device unit; Kelvin bounds swap ends once converted.
fn temperature_range(
    unit: Unit,
    min: Option<serde_json::Value>,
    max: Option<serde_json::Value>,
) -> Result<RangeInclusive<i64>, ConfigError> {
    let convert = |name: &str, value| -> Result<Option<i64>, ConfigError> {
        match bound(name, value) {
            None => Ok(None),
            Some(value) if value <= 0 => Err(ConfigError::InvalidNumber {
                property: format!("colorTemperature.{name}"),
                value: value.to_string(),
            }),
            Some(value) => Ok(Some(unit.to_homekit(value))),
        }
    };
    let first = convert("minValue", min)?;
    let second = convert("maxValue", max)?;

    let (low, high) = match unit {
        Unit::Kelvin => (second.unwrap_or(MIRED_MIN), first.unwrap_or(MIRED_MAX)),
        _ => (first.unwrap_or(MIRED_MIN), second.unwrap_or(MIRED_MAX)),
    };
    Ok(low.min(high)..=low.max(high))
}

fn bound(name: &str, value: Option<serde_json::Value>) -> Option<i64> {
    match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Number(number)) if number.is_i64() => number.as_i64(),
        Some(_) => {
            warn!("'colorTemperature.{name}' needs to be a number. Ignoring it and using default!");
            None
        }
    }
}
