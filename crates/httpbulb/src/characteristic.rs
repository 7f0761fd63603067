//! Characteristics of a lightbulb service and the values they carry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BulbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    #[serde(rename = "On")]
    Power,
    Brightness,
    Hue,
    Saturation,
    ColorTemperature,
}

impl Property {
    pub const ALL: [Property; 5] = [
        Property::Power,
        Property::Brightness,
        Property::Hue,
        Property::Saturation,
        Property::ColorTemperature,
    ];

    /// Characteristic name as used in notifications.
    pub fn characteristic(self) -> &'static str {
        match self {
            Property::Power => "On",
            Property::Brightness => "Brightness",
            Property::Hue => "Hue",
            Property::Saturation => "Saturation",
            Property::ColorTemperature => "ColorTemperature",
        }
    }

    /// Placeholder substituted with this property's current value in url templates.
    pub fn placeholder(self) -> Option<&'static str> {
        match self {
            Property::Power => None,
            Property::Brightness => Some("%brightness"),
            Property::Hue => Some("%hue"),
            Property::Saturation => Some("%saturation"),
            Property::ColorTemperature => Some("%colorTemperature"),
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.characteristic())
    }
}

impl FromStr for Property {
    type Err = BulbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "On" | "on" | "power" => Ok(Property::Power),
            "Brightness" | "brightness" => Ok(Property::Brightness),
            "Hue" | "hue" => Ok(Property::Hue),
            "Saturation" | "saturation" => Ok(Property::Saturation),
            "ColorTemperature" | "colorTemperature" | "color-temperature" | "colortemperature" => {
                Ok(Property::ColorTemperature)
            }
            other => Err(BulbError::UnknownCharacteristic(other.to_string())),
        }
    }
}

/// A characteristic value in HomeKit units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl Value {
    pub fn as_bool(self) -> bool {
        match self {
            Value::Bool(value) => value,
            Value::Int(value) => value != 0,
        }
    }

    pub fn as_int(self) -> i64 {
        match self {
            Value::Bool(value) => i64::from(value),
            Value::Int(value) => value,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
        }
    }
}

impl FromStr for Value {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "true" | "on" => Ok(Value::Bool(true)),
            "false" | "off" => Ok(Value::Bool(false)),
            other => other.parse().map(Value::Int),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

/// Which kind of color write was last authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Undefined,
    Color,
    Temperature,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_characteristic_names_and_aliases() {
        assert_eq!("On".parse::<Property>().unwrap(), Property::Power);
        assert_eq!("power".parse::<Property>().unwrap(), Property::Power);
        assert_eq!(
            "colorTemperature".parse::<Property>().unwrap(),
            Property::ColorTemperature
        );
        assert!(matches!(
            "Volume".parse::<Property>(),
            Err(BulbError::UnknownCharacteristic(name)) if name == "Volume"
        ));
    }

    #[test]
    fn values_deserialize_untagged() {
        let on: Value = serde_json::from_str("true").unwrap();
        let level: Value = serde_json::from_str("42").unwrap();
        assert_eq!(on, Value::Bool(true));
        assert_eq!(level, Value::Int(42));
        assert!(Value::Int(1).as_bool());
        assert_eq!(Value::Bool(true).as_int(), 1);
    }

    #[test]
    fn values_parse_from_cli_words() {
        assert_eq!("on".parse::<Value>().unwrap(), Value::Bool(true));
        assert_eq!(" 75 ".parse::<Value>().unwrap(), Value::Int(75));
        assert!("bright".parse::<Value>().is_err());
    }
}
