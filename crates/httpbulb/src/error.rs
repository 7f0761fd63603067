use crate::characteristic::Property;
use thiserror::Error as ThisError;

/// Startup configuration problems. Any of these aborts the accessory.
#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error("property '{0}' is required")]
    MissingProperty(String),

    #[error("property '{0}' was defined, however some urls are missing")]
    MissingUrls(String),

    #[error("property '{0}' needs to be an object")]
    NotAnObject(String),

    #[error("invalid url for '{property}': {url}")]
    InvalidUrl { property: String, url: String },

    #[error("invalid http method for '{property}': {method}")]
    InvalidMethod { property: String, method: String },

    #[error("{unit} is an unsupported {property} unit")]
    UnsupportedUnit { property: String, unit: String },

    #[error("'{property}' must be a positive integer, got {value}")]
    InvalidNumber { property: String, value: String },

    #[error("invalid pattern for '{property}': {message}")]
    InvalidPattern { property: String, message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures turning a status body into a number.
#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("pattern didn't match (or body didn't contain the necessary information): {body}")]
    PatternMismatch { body: String },

    #[error("couldn't find capture group {0}; put the number pattern into that group")]
    MissingCaptureGroup(usize),

    #[error("extracted group is not a number: '{0}'")]
    NotANumber(String),
}

#[derive(ThisError, Debug)]
pub enum BulbError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("device returned http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("{property} value {value} is not in range {min}..={max}")]
    Range {
        property: Property,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{0} is not configured for this lightbulb")]
    Unsupported(Property),

    #[error("unknown characteristic: {0}")]
    UnknownCharacteristic(String),

    #[error("invalid value for {property}: {value}")]
    InvalidValue { property: Property, value: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BulbError>;
