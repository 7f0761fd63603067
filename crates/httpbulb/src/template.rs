//! Request templates with `%s` / `%brightness` style placeholders.

use reqwest::Method;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::ConfigError;

const VALUE_PLACEHOLDER: &str = "%s";

/// One configured device request.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlTemplate {
    pub url: String,
    pub method: Method,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// A template with all placeholders filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// Either `"http://..."` or `{ "url": ..., "method": ..., "body": ..., "headers": ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawUrl {
    Plain(String),
    Detailed {
        url: String,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        body: Option<serde_json::Value>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl RawUrl {
    pub(crate) fn parse(self, property: &str) -> Result<UrlTemplate, ConfigError> {
        let (url, method, body, headers) = match self {
            RawUrl::Plain(url) => (url, None, None, BTreeMap::new()),
            RawUrl::Detailed {
                url,
                method,
                body,
                headers,
            } => (url, method, body, headers),
        };

        let trimmed = url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl {
                property: property.to_string(),
                url,
            });
        }

        let method = match method {
            None => Method::GET,
            Some(name) => Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| ConfigError::InvalidMethod {
                    property: property.to_string(),
                    method: name,
                })?,
        };

        let body = body.map(|body| match body {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        });

        Ok(UrlTemplate {
            url: trimmed.to_string(),
            method,
            body,
            headers: headers.into_iter().collect(),
        })
    }
}

impl UrlTemplate {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            body: None,
            headers: Vec::new(),
        }
    }

    /// Fills in `%s` with `value` and named placeholders with `siblings`.
    pub fn render(&self, value: Option<&str>, siblings: &[(&str, i64)]) -> RenderedRequest {
        RenderedRequest {
            method: self.method.clone(),
            url: substitute(&self.url, value, siblings),
            body: self
                .body
                .as_deref()
                .map(|body| substitute(body, value, siblings)),
            headers: self.headers.clone(),
        }
    }
}

/// Named placeholders go first: `%saturation` begins with `%s`.
pub fn substitute(text: &str, value: Option<&str>, siblings: &[(&str, i64)]) -> String {
    let mut siblings = siblings.to_vec();
    siblings.sort_by_key(|(placeholder, _)| std::cmp::Reverse(placeholder.len()));

    let mut rendered = text.to_string();
    for (placeholder, current) in siblings {
        rendered = rendered.replace(placeholder, &current.to_string());
    }
    if let Some(value) = value {
        rendered = rendered.replace(VALUE_PLACEHOLDER, value);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_value_placeholder() {
        let template = UrlTemplate::get("http://bulb.local/set?level=%s");
        let request = template.render(Some("42"), &[]);
        assert_eq!(request.url, "http://bulb.local/set?level=42");
        assert_eq!(request.method, Method::GET);
    }

    #[test]
    fn named_placeholders_are_not_clobbered_by_value() {
        let rendered = substitute(
            "http://bulb/color?h=%s&s=%saturation&b=%brightness",
            Some("120"),
            &[("%saturation", 80), ("%brightness", 55)],
        );
        assert_eq!(rendered, "http://bulb/color?h=120&s=80&b=55");
    }

    #[test]
    fn leaves_value_placeholder_without_value() {
        assert_eq!(
            substitute("http://bulb/on?x=%s&t=%colorTemperature", None, &[("%colorTemperature", 250)]),
            "http://bulb/on?x=%s&t=250"
        );
    }

    #[test]
    fn parses_plain_and_detailed_urls() {
        let plain: RawUrl = serde_json::from_str(r#""http://bulb/status""#).unwrap();
        assert_eq!(
            plain.parse("statusUrl").unwrap(),
            UrlTemplate::get("http://bulb/status")
        );

        let detailed: RawUrl = serde_json::from_str(
            r#"{"url": "http://bulb/light", "method": "put",
                "body": {"brightness": "%s"}, "headers": {"X-Key": "abc"}}"#,
        )
        .unwrap();
        let template = detailed.parse("setUrl").unwrap();
        assert_eq!(template.method, Method::PUT);
        assert_eq!(template.body.as_deref(), Some(r#"{"brightness":"%s"}"#));
        assert_eq!(template.headers, vec![("X-Key".to_string(), "abc".to_string())]);

        let request = template.render(Some("7"), &[]);
        assert_eq!(request.body.as_deref(), Some(r#"{"brightness":"7"}"#));
    }

    #[test]
    fn rejects_non_http_urls_and_bad_methods() {
        let raw: RawUrl = serde_json::from_str(r#""ftp://bulb""#).unwrap();
        assert!(matches!(
            raw.parse("onUrl"),
            Err(ConfigError::InvalidUrl { property, .. }) if property == "onUrl"
        ));

        let raw: RawUrl =
            serde_json::from_str(r#"{"url": "http://bulb", "method": "GE T"}"#).unwrap();
        assert!(matches!(raw.parse("onUrl"), Err(ConfigError::InvalidMethod { .. })));
    }
}
