use rand::Rng;
use serde_json::{Map, Value, json};
use std::io;
use std::time::Duration;

/// Fake sensor node used when no device is attached. Emits one plausible
/// JSON frame per `pace`, with the occasional boot message and missing
/// readings thrown in.
#[derive(Debug)]
pub struct DummyNode {
    pace: Duration,
}

impl DummyNode {
    pub fn new(pace: Duration) -> Self {
        Self { pace }
    }
}

impl Iterator for DummyNode {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        std::thread::sleep(self.pace);
        Some(Ok(get_dummy_line()))
    }
}

pub fn get_dummy_line() -> String {
    let mut rng = rand::rng();

    // firmware prints plain text while booting
    if rng.random_bool(0.02) {
        return "ets Jun  8 2016 00:22:57 rst:0x1 (POWERON_RESET)".to_string();
    }

    let mut frame = Map::new();
    frame.insert("mq2_adc".into(), json!(rng.random_range(200..4095)));
    frame.insert("temp".into(), json!(round1(rng.random_range(15.0..40.0))));
    frame.insert("hum".into(), json!(round1(rng.random_range(20.0..90.0))));

    // ultrasonic sensor drops out when nothing is in range
    let dist = if rng.random_bool(0.1) {
        Value::Null
    } else {
        json!(round1(rng.random_range(2.0..400.0)))
    };
    frame.insert("dist_cm".into(), dist);

    for flag in ["fire", "flood", "quake"] {
        frame.insert(flag.into(), json!(u8::from(rng.random_bool(0.05))));
    }

    let gps_fix = rng.random_bool(0.7);
    frame.insert("gps_active".into(), json!(1));
    frame.insert("gps_fix".into(), json!(u8::from(gps_fix)));
    if gps_fix {
        frame.insert("lat".into(), json!(rng.random_range(-90.0..90.0)));
        frame.insert("lon".into(), json!(rng.random_range(-180.0..180.0)));
    }

    Value::Object(frame).to_string()
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
