use crate::telemetry_decode::{ABSENT, render_value};
use sensor_bridge_shared::{TelemetryFrame, VirtualPin};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Distance reported to the depth gauge when the ultrasonic reading is missing.
pub const DISTANCE_SENTINEL: i64 = -1;

// ======================================================================
//  Rate gate
// ======================================================================

/// Bounds pushes to at most one per interval. The timestamp is taken on the
/// attempt, not on confirmed delivery.
#[derive(Debug, Clone)]
pub struct RateGate {
    interval_ms: u64,
    last_push_ms: Option<u64>,
}

impl RateGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            last_push_ms: None,
        }
    }

    /// Returns true (and records `now_ms`) when a push is due.
    pub fn try_acquire(&mut self, now_ms: u64) -> bool {
        let due = match self.last_push_ms {
            None => true,
            Some(last) => now_ms
                .checked_sub(last)
                .is_some_and(|elapsed| elapsed >= self.interval_ms),
        };
        if due {
            self.last_push_ms = Some(now_ms);
        }
        due
    }

    #[cfg(test)]
    pub fn last_push_ms(&self) -> Option<u64> {
        self.last_push_ms
    }
}

// ======================================================================
//  Payload
// ======================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelValue::Int(v) => write!(f, "{v}"),
            // gauges expect "25.0", not "25"
            ChannelValue::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{v:.1}")
            }
            ChannelValue::Float(v) => write!(f, "{v}"),
            ChannelValue::Text(s) => f.write_str(s),
        }
    }
}

/// Channel values for one batch update, in pin order.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardPayload {
    channels: Vec<(VirtualPin, ChannelValue)>,
}

impl DashboardPayload {
    pub fn from_frame(frame: &TelemetryFrame) -> Self {
        let gauge = |v: &Option<Value>| {
            coerce_float(v.as_ref())
                .map(ChannelValue::Float)
                .unwrap_or(ChannelValue::Int(0))
        };
        let flag = |v: &Option<Value>| ChannelValue::Int(coerce_flag(v.as_ref()));

        let distance = coerce_float(frame.distance_cm.as_ref())
            .map(ChannelValue::Float)
            .unwrap_or(ChannelValue::Int(DISTANCE_SENTINEL));

        // Show NA for both labels unless the node reported a full fix.
        let (lat, lon) = match (&frame.latitude, &frame.longitude) {
            (Some(lat), Some(lon)) => (render_value(lat), render_value(lon)),
            _ => (ABSENT.to_string(), ABSENT.to_string()),
        };

        Self {
            channels: vec![
                (VirtualPin::V0, gauge(&frame.temperature)),
                (VirtualPin::V1, gauge(&frame.humidity)),
                (VirtualPin::V2, distance),
                (VirtualPin::V3, flag(&frame.fire)),
                (VirtualPin::V4, flag(&frame.flood)),
                (VirtualPin::V5, flag(&frame.quake)),
                (VirtualPin::V6, flag(&frame.gps_active)),
                (VirtualPin::V7, ChannelValue::Text(lat)),
                (VirtualPin::V8, ChannelValue::Text(lon)),
            ],
        }
    }

    #[cfg(test)]
    pub fn get(&self, pin: VirtualPin) -> Option<&ChannelValue> {
        self.channels
            .iter()
            .find(|(p, _)| *p == pin)
            .map(|(_, value)| value)
    }

    /// `(pin, value)` pairs ready to be sent as query parameters.
    pub fn query_pairs(&self) -> impl Iterator<Item = (&'static str, String)> + '_ {
        self.channels
            .iter()
            .map(|(pin, value)| (pin.as_str(), value.to_string()))
    }
}

/// Integer coercion for alarm flags: booleans map to 0/1, fractional numbers
/// truncate, integer strings parse, anything else is 0.
pub fn coerce_flag(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Bool(b)) => i64::from(*b),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Float coercion for gauges. `None` when the reading is absent, unusable or
/// not finite ("nan", "inf").
pub fn coerce_float(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|f: &f64| f.is_finite())
}

// ======================================================================
//  Sink
// ======================================================================

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Destination for batch updates.
pub trait DashboardSink {
    fn push(&mut self, payload: &DashboardPayload) -> Result<(), PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(raw: &str) -> DashboardPayload {
        let frame: TelemetryFrame = serde_json::from_str(raw).unwrap();
        DashboardPayload::from_frame(&frame)
    }

    #[test]
    fn gate_passes_first_attempt_then_bounds_rate() {
        let mut gate = RateGate::new(Duration::from_millis(1_000));
        assert!(gate.try_acquire(0));
        assert!(!gate.try_acquire(1));
        assert!(!gate.try_acquire(999));
        assert!(gate.try_acquire(1_000));
        assert!(!gate.try_acquire(1_500));
        assert!(gate.try_acquire(2_700));
        assert_eq!(gate.last_push_ms(), Some(2_700));
    }

    #[test]
    fn gate_ignores_clock_going_backwards() {
        let mut gate = RateGate::new(Duration::from_millis(100));
        assert!(gate.try_acquire(5_000));
        assert!(!gate.try_acquire(10));
        assert!(gate.try_acquire(5_100));
    }

    #[test]
    fn burst_of_frames_yields_one_push_per_interval() {
        let mut gate = RateGate::new(Duration::from_millis(1_000));
        // a frame every 10 ms for 5 s
        let pushes = (0..500u64).filter(|i| gate.try_acquire(i * 10)).count();
        assert_eq!(pushes, 5);
    }

    #[test]
    fn absent_distance_uses_sentinel() {
        let p = payload("{}");
        assert_eq!(p.get(VirtualPin::V2), Some(&ChannelValue::Int(-1)));
    }

    #[test]
    fn string_distance_is_parsed() {
        let p = payload(r#"{"dist_cm": "12.5"}"#);
        assert_eq!(p.get(VirtualPin::V2), Some(&ChannelValue::Float(12.5)));
        let p = payload(r#"{"dist_cm": "far"}"#);
        assert_eq!(p.get(VirtualPin::V2), Some(&ChannelValue::Int(-1)));
    }

    #[test]
    fn hazard_flags_default_to_zero() {
        let p = payload(r#"{"fire": 1, "flood": "yes", "gps_active": true}"#);
        assert_eq!(p.get(VirtualPin::V3), Some(&ChannelValue::Int(1)));
        assert_eq!(p.get(VirtualPin::V4), Some(&ChannelValue::Int(0)));
        assert_eq!(p.get(VirtualPin::V5), Some(&ChannelValue::Int(0)));
        assert_eq!(p.get(VirtualPin::V6), Some(&ChannelValue::Int(1)));
    }

    #[test]
    fn flag_coercion_matches_integer_semantics() {
        assert_eq!(coerce_flag(Some(&json!(" 1 "))), 1);
        assert_eq!(coerce_flag(Some(&json!(1.9))), 1);
        assert_eq!(coerce_flag(Some(&json!("1.5"))), 0);
        assert_eq!(coerce_flag(Some(&json!(false))), 0);
        assert_eq!(coerce_flag(Some(&json!([1]))), 0);
        assert_eq!(coerce_flag(None), 0);
    }

    #[test]
    fn non_finite_strings_fall_back_to_defaults() {
        let p = payload(r#"{"temp": "nan", "hum": "-inf", "dist_cm": "inf"}"#);
        assert_eq!(p.get(VirtualPin::V0), Some(&ChannelValue::Int(0)));
        assert_eq!(p.get(VirtualPin::V1), Some(&ChannelValue::Int(0)));
        assert_eq!(p.get(VirtualPin::V2), Some(&ChannelValue::Int(-1)));
        assert_eq!(coerce_float(Some(&json!("NaN"))), None);
        assert_eq!(coerce_float(Some(&json!(" 3.5 "))), Some(3.5));
    }

    #[test]
    fn gauges_default_to_zero() {
        let p = payload(r#"{"temp": 25, "hum": "n/a"}"#);
        assert_eq!(p.get(VirtualPin::V0), Some(&ChannelValue::Float(25.0)));
        assert_eq!(p.get(VirtualPin::V1), Some(&ChannelValue::Int(0)));
    }

    #[test]
    fn coordinates_need_both_halves() {
        let p = payload("{}");
        assert_eq!(p.get(VirtualPin::V7), Some(&ChannelValue::Text("NA".into())));
        assert_eq!(p.get(VirtualPin::V8), Some(&ChannelValue::Text("NA".into())));

        let p = payload(r#"{"lat": 33.6}"#);
        assert_eq!(p.get(VirtualPin::V7), Some(&ChannelValue::Text("NA".into())));

        let p = payload(r#"{"lat": 33.6, "lon": "-117.85"}"#);
        assert_eq!(p.get(VirtualPin::V7), Some(&ChannelValue::Text("33.6".into())));
        assert_eq!(p.get(VirtualPin::V8), Some(&ChannelValue::Text("-117.85".into())));
    }

    #[test]
    fn query_pairs_cover_all_pins_in_order() {
        let p = payload(r#"{"temp": 25.0, "hum": 40.5, "dist_cm": 7, "quake": 1}"#);
        let pairs: Vec<(&str, String)> = p.query_pairs().collect();
        assert_eq!(
            pairs,
            vec![
                ("V0", "25.0".to_string()),
                ("V1", "40.5".to_string()),
                ("V2", "7.0".to_string()),
                ("V3", "0".to_string()),
                ("V4", "0".to_string()),
                ("V5", "1".to_string()),
                ("V6", "0".to_string()),
                ("V7", "NA".to_string()),
                ("V8", "NA".to_string()),
            ]
        );
    }
}
