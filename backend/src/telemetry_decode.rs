use sensor_bridge_shared::TelemetryFrame;
use serde_json::Value;
use thiserror::Error;

/// Marker shown for any field the node did not report.
pub const ABSENT: &str = "NA";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

pub fn decode_line(line: &str) -> Result<TelemetryFrame, DecodeError> {
    let value: Value = serde_json::from_str(line)?;
    let kind = match value {
        Value::Object(map) => return Ok(serde_json::from_value(Value::Object(map))?),
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
    };
    Err(DecodeError::NotAnObject(kind))
}

/// Human readable rendering of a raw reading; strings print unquoted.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn fmt(value: &Option<Value>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{}{suffix}", render_value(v)),
        None => ABSENT.to_string(),
    }
}

pub fn status_line(frame: &TelemetryFrame) -> String {
    format!(
        "MQ2={}  T={}  H={}  Dist={}  FIRE={} FLOOD={} QUAKE={}  GPS_ACTIVE={} GPS_FIX={}  LAT={} LON={}",
        fmt(&frame.gas_reading, ""),
        fmt(&frame.temperature, "C"),
        fmt(&frame.humidity, "%"),
        fmt(&frame.distance_cm, "cm"),
        fmt(&frame.fire, ""),
        fmt(&frame.flood, ""),
        fmt(&frame.quake, ""),
        fmt(&frame.gps_active, ""),
        fmt(&frame.gps_fix, ""),
        fmt(&frame.latitude, ""),
        fmt(&frame.longitude, ""),
    )
}
