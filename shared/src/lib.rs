use serde::Deserialize;
use serde_json::Value;

/// One JSON line as emitted by the sensor node firmware.
///
/// Every field keeps the raw JSON value so that a missing key (`None`) stays
/// distinguishable from a present but oddly typed reading. JSON `null` is
/// treated the same as a missing key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TelemetryFrame {
    /// MQ-2 gas sensor, raw ADC counts.
    #[serde(rename = "mq2_adc")]
    pub gas_reading: Option<Value>,
    #[serde(rename = "temp")]
    pub temperature: Option<Value>, // °C
    #[serde(rename = "hum")]
    pub humidity: Option<Value>, // %RH
    #[serde(rename = "dist_cm")]
    pub distance_cm: Option<Value>,

    // hazard flags, 0/1 or bool depending on firmware revision
    pub fire: Option<Value>,
    pub flood: Option<Value>,
    pub quake: Option<Value>,

    pub gps_active: Option<Value>,
    pub gps_fix: Option<Value>,
    #[serde(rename = "lat", alias = "latitude")]
    pub latitude: Option<Value>,
    #[serde(rename = "lon", alias = "longitude")]
    pub longitude: Option<Value>,
}

/// Dashboard channel identifiers ("virtual pins").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VirtualPin {
    V0, // temperature gauge
    V1, // humidity gauge
    V2, // dam depth gauge (ultrasonic distance)
    V3, // fire alarm
    V4, // flood alarm
    V5, // quake alarm
    V6, // gps active
    V7, // latitude label
    V8, // longitude label
}

impl VirtualPin {
    pub fn as_str(self) -> &'static str {
        match self {
            VirtualPin::V0 => "V0",
            VirtualPin::V1 => "V1",
            VirtualPin::V2 => "V2",
            VirtualPin::V3 => "V3",
            VirtualPin::V4 => "V4",
            VirtualPin::V5 => "V5",
            VirtualPin::V6 => "V6",
            VirtualPin::V7 => "V7",
            VirtualPin::V8 => "V8",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_and_null_keys_are_absent() {
        let frame: TelemetryFrame =
            serde_json::from_str(r#"{"temp": 21.5, "hum": null, "extra": "ignored"}"#)
                .expect("frame should parse");
        assert_eq!(frame.temperature, Some(json!(21.5)));
        assert_eq!(frame.humidity, None);
        assert_eq!(frame.distance_cm, None);
        assert_eq!(frame.latitude, None);
    }

    #[test]
    fn coordinates_accept_long_key_names() {
        let frame: TelemetryFrame =
            serde_json::from_str(r#"{"latitude": 33.6, "lon": "-117.9"}"#).unwrap();
        assert_eq!(frame.latitude, Some(json!(33.6)));
        assert_eq!(frame.longitude, Some(json!("-117.9")));
    }
}
