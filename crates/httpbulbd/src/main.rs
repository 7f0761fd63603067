use clap::{Parser, Subcommand};
use httpbulb::config::default_config_path;
use httpbulb::{BulbError, Lightbulb, Notification, Property, Value};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use tiny_http::{Method, Response, Server, StatusCode};

#[derive(Parser, Debug)]
#[command(name = "httpbulbd", version, about = "HTTP lightbulb accessory")]
struct Cli {
    /// Accessory config file (defaults to ~/.config/httpbulb/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the config and print the accessory information
    Check,
    /// Read a characteristic from the device (On, Brightness, Hue, Saturation, ColorTemperature)
    Get { characteristic: String },
    /// Write a characteristic to the device
    Set {
        characteristic: String,
        /// true/false or on/off for On, an integer otherwise
        value: String,
    },
    /// Run the local HTTP API server
    Serve {
        /// Port to bind on localhost
        #[arg(long, default_value_t = 9125)]
        port: u16,
    },
}

#[derive(Deserialize)]
struct SetRequest {
    value: Value,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let path = match cli.config {
        Some(path) => path,
        None => default_config_path().ok_or("Unable to determine config directory")?,
    };
    let raw: serde_json::Value = serde_json::from_slice(
        &fs::read(&path).map_err(|err| format!("Failed to read {}: {err}", path.display()))?,
    )?;
    init_logger(raw.get("debug").and_then(|v| v.as_bool()).unwrap_or(false));

    let lightbulb = httpbulb::register(raw)
        .ok_or_else(|| format!("Invalid accessory configuration in {}", path.display()))?;

    match cli.command {
        Command::Check => {
            println!("{}", serde_json::to_string_pretty(&lightbulb.information())?);
        }
        Command::Get { characteristic } => {
            let property: Property = characteristic.parse()?;
            let value = lightbulb.get(property)?;
            println!("{property}={value}");
        }
        Command::Set {
            characteristic,
            value,
        } => {
            let property: Property = characteristic.parse()?;
            let value: Value = value
                .parse()
                .map_err(|_| format!("'{value}' is not a valid value for {property}"))?;
            lightbulb.set(property, value)?;
            println!("{}", serde_json::to_string_pretty(&lightbulb.state())?);
        }
        Command::Serve { port } => {
            run_api_server(&lightbulb, port)?;
        }
    }

    Ok(())
}

fn init_logger(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

fn run_api_server(lightbulb: &Lightbulb, port: u16) -> Result<(), Box<dyn Error>> {
    let server = Server::http(("127.0.0.1", port)).map_err(|err| -> Box<dyn Error> {
        format!("Failed to bind 127.0.0.1:{port} (is the port already in use?): {err}").into()
    })?;
    info!("httpbulbd API listening on http://127.0.0.1:{port}");

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();
        let (path, _query) = url.split_once('?').unwrap_or((url.as_str(), ""));

        let body = read_body(request.as_reader(), &method, path);

        let (status, payload) = handle_api_request(lightbulb, &method, path, &body);
        if let Err(err) = request.respond(json_response(status, &payload)) {
            warn!("Failed to respond to {method} {path}: {err}");
        }
    }

    Ok(())
}

/// An unreadable body is logged and treated as empty.
fn read_body(mut reader: impl Read, method: &Method, path: &str) -> String {
    let mut body = String::new();
    if let Err(err) = reader.read_to_string(&mut body) {
        warn!("Failed to read request body for {method} {path}: {err}");
        body.clear();
    }
    body
}

fn handle_api_request(
    lightbulb: &Lightbulb,
    method: &Method,
    path: &str,
    body: &str,
) -> (StatusCode, serde_json::Value) {
    match (method, path) {
        (Method::Get, "/v1/health") => (StatusCode(200), json!({"status": "ok"})),
        (Method::Get, "/v1/state") => to_json(&lightbulb.state()),
        (Method::Get, "/v1/info") => to_json(&lightbulb.information()),
        (Method::Post, "/v1/identify") => {
            lightbulb.identify();
            (StatusCode(200), json!({"identified": true}))
        }
        (Method::Post, "/v1/notifications") => {
            let notification = match Notification::from_json(body) {
                Ok(value) => value,
                Err(_) => return json_error(StatusCode(400), "Invalid JSON body for notification"),
            };
            match lightbulb.notify(&notification) {
                Ok(property) => (
                    StatusCode(200),
                    json!({"characteristic": property, "updated": true}),
                ),
                Err(err) => json_error(status_for(&err), err),
            }
        }
        (Method::Get, path) if path.starts_with("/v1/characteristics/") => {
            let property = match characteristic_from_path(path) {
                Ok(property) => property,
                Err(err) => return json_error(status_for(&err), err),
            };
            match lightbulb.get(property) {
                Ok(value) => (
                    StatusCode(200),
                    json!({"characteristic": property, "value": value}),
                ),
                Err(err) => json_error(status_for(&err), err),
            }
        }
        (Method::Put, path) if path.starts_with("/v1/characteristics/") => {
            let property = match characteristic_from_path(path) {
                Ok(property) => property,
                Err(err) => return json_error(status_for(&err), err),
            };
            let request: SetRequest = match serde_json::from_str(body) {
                Ok(value) => value,
                Err(_) => return json_error(StatusCode(400), "Invalid JSON body for set request"),
            };
            match lightbulb.set(property, request.value) {
                Ok(()) => (
                    StatusCode(200),
                    json!({"characteristic": property, "value": request.value}),
                ),
                Err(err) => json_error(status_for(&err), err),
            }
        }
        _ => json_error(StatusCode(404), "Not found"),
    }
}

fn characteristic_from_path(path: &str) -> Result<Property, BulbError> {
    let raw_name = &path["/v1/characteristics/".len()..];
    let name = urlencoding::decode(raw_name)
        .map(|value| value.into_owned())
        .unwrap_or_else(|_| raw_name.to_string());
    name.parse()
}

fn status_for(err: &BulbError) -> StatusCode {
    match err {
        BulbError::Unsupported(_) | BulbError::UnknownCharacteristic(_) => StatusCode(404),
        BulbError::Range { .. } | BulbError::InvalidValue { .. } | BulbError::Json(_) => {
            StatusCode(400)
        }
        BulbError::Transport(_) | BulbError::HttpStatus { .. } | BulbError::Extraction(_) => {
            StatusCode(502)
        }
        BulbError::Configuration(_) => StatusCode(500),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> (StatusCode, serde_json::Value) {
    match serde_json::to_value(value) {
        Ok(value) => (StatusCode(200), value),
        Err(err) => json_error(StatusCode(500), err),
    }
}

fn json_response(
    status: StatusCode,
    value: &serde_json::Value,
) -> Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"{}".to_vec());
    let response = Response::from_data(body).with_status_code(status);
    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

fn json_error<E: std::fmt::Display>(status: StatusCode, err: E) -> (StatusCode, serde_json::Value) {
    (status, json!({ "error": err.to_string() }))
}
