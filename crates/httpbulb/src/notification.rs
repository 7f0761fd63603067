//! Push updates sent by the device instead of polled by us.

use serde::Deserialize;

use crate::characteristic::{Property, Value};
use crate::error::{BulbError, Result};
use crate::proxy::DeviceProxy;

/// `{"characteristic": "Brightness", "value": 200}`; the value is in device units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    pub characteristic: String,
    pub value: Value,
}

impl Notification {
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Converts the notified value into HomeKit units and records it.
pub fn apply(proxy: &DeviceProxy, notification: &Notification) -> Result<Property> {
    let property: Property = notification.characteristic.parse()?;
    if !proxy.config().supports(property) {
        return Err(BulbError::UnknownCharacteristic(
            notification.characteristic.clone(),
        ));
    }

    let value = match (property, notification.value) {
        (Property::Power, value) => value,
        (_, Value::Int(raw)) => {
            let unit = proxy
                .config()
                .endpoint(property)
                .map(|endpoint| endpoint.unit)
                .ok_or(BulbError::Unsupported(property))?;
            Value::Int(unit.to_homekit(raw))
        }
        (_, value @ Value::Bool(_)) => value,
    };
    proxy.push(property, value)?;
    Ok(property)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::tests::{lamp_device, proxy_for};

    #[test]
    fn parses_notification_body() {
        let notification =
            Notification::from_json(r#"{"characteristic": "On", "value": true}"#).unwrap();
        assert_eq!(
            notification,
            Notification {
                characteristic: "On".to_string(),
                value: Value::Bool(true),
            }
        );
        assert!(Notification::from_json(r#"{"value": 1}"#).is_err());
    }

    #[test]
    fn converts_device_units() {
        let device = lamp_device();
        let proxy = proxy_for(
            &device,
            r#""brightness": {"setUrl": "{base}/b?v=%s", "statusUrl": "{base}/brightness", "unit": "rgb"},
               "colorTemperature": {"setUrl": "{base}/ct?v=%s", "statusUrl": "{base}/temperature",
                                    "unit": "kelvin"}"#,
        );
        let brightness = Notification {
            characteristic: "Brightness".to_string(),
            value: Value::Int(254),
        };
        let temperature = Notification {
            characteristic: "ColorTemperature".to_string(),
            value: Value::Int(4000),
        };
        assert_eq!(apply(&proxy, &brightness).unwrap(), Property::Brightness);
        assert_eq!(apply(&proxy, &temperature).unwrap(), Property::ColorTemperature);

        let state = proxy.snapshot();
        assert_eq!(state.brightness, 100);
        assert_eq!(state.color_temperature, 250);
        assert!(device.hits().is_empty());
    }

    #[test]
    fn rejects_unconfigured_characteristics() {
        let device = lamp_device();
        let proxy = proxy_for(&device, "");
        let hue = Notification {
            characteristic: "Hue".to_string(),
            value: Value::Int(10),
        };
        assert!(matches!(
            apply(&proxy, &hue),
            Err(BulbError::UnknownCharacteristic(name)) if name == "Hue"
        ));
        let unknown = Notification {
            characteristic: "Volume".to_string(),
            value: Value::Int(10),
        };
        assert!(apply(&proxy, &unknown).is_err());
    }

    #[test]
    fn power_notification_does_not_touch_color_mode() {
        let device = lamp_device();
        let proxy = proxy_for(&device, "");
        let on = Notification {
            characteristic: "On".to_string(),
            value: Value::Int(1),
        };
        apply(&proxy, &on).unwrap();
        let state = proxy.snapshot();
        assert!(state.on);
        assert_eq!(state.color_mode, crate::characteristic::ColorMode::Undefined);
    }
}
