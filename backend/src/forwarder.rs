use crate::publisher::{DashboardPayload, DashboardSink, PublishError, RateGate};
use crate::telemetry_decode::{DecodeError, decode_line, status_line};
use anyhow::Context;
use sensor_bridge_shared::TelemetryFrame;
use std::io::{self, Write};
use std::time::Duration;

/// Millisecond time source for the rate gate.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<F> Clock for F
where
    F: Fn() -> u64,
{
    fn now_ms(&self) -> u64 {
        self()
    }
}

pub fn get_system_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug)]
pub enum PushOutcome {
    /// Inside the rate window, nothing sent.
    Skipped,
    Delivered,
    /// Sample dropped; no retry.
    Failed(PublishError),
}

#[derive(Debug)]
pub enum LineOutcome {
    Malformed { raw: String, error: DecodeError },
    Frame { frame: TelemetryFrame, status: String },
}

pub struct Forwarder<S, C> {
    sink: S,
    clock: C,
    gate: RateGate,
}

impl<S: DashboardSink, C: Clock> Forwarder<S, C> {
    pub fn new(sink: S, clock: C, push_interval: Duration) -> Self {
        Self {
            sink,
            clock,
            gate: RateGate::new(push_interval),
        }
    }

    pub fn handle_line(&self, line: &str) -> LineOutcome {
        match decode_line(line) {
            Ok(frame) => {
                let status = status_line(&frame);
                LineOutcome::Frame { frame, status }
            }
            Err(error) => LineOutcome::Malformed {
                raw: line.to_string(),
                error,
            },
        }
    }

    /// Pushes `frame` if the rate gate allows it.
    pub fn publish(&mut self, frame: &TelemetryFrame) -> PushOutcome {
        if !self.gate.try_acquire(self.clock.now_ms()) {
            return PushOutcome::Skipped;
        }
        match self.sink.push(&DashboardPayload::from_frame(frame)) {
            Ok(()) => PushOutcome::Delivered,
            Err(e) => PushOutcome::Failed(e),
        }
    }

    /// Consumes `lines` until the source ends or fails. The status line is
    /// written to `out` before the (possibly slow) push; raw echoes go to
    /// `out` too. Publish failures are logged and swallowed.
    pub fn run<I, W>(&mut self, lines: I, out: &mut W) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = io::Result<String>>,
        W: Write,
    {
        for line in lines {
            let line = line.context("serial read failed")?;
            match self.handle_line(&line) {
                LineOutcome::Malformed { raw, error } => {
                    tracing::debug!("skipping malformed frame: {error}");
                    writeln!(out, "RAW: {raw}")?;
                }
                LineOutcome::Frame { frame, status } => {
                    writeln!(out, "{status}")?;
                    out.flush()?;
                    log_push_outcome(&self.publish(&frame));
                }
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn log_push_outcome(push: &PushOutcome) {
    match push {
        PushOutcome::Skipped => {}
        PushOutcome::Delivered => tracing::debug!("[BLYNK] batch update delivered"),
        PushOutcome::Failed(e @ PublishError::Status { .. }) => tracing::warn!("[BLYNK] {e}"),
        PushOutcome::Failed(e) => tracing::warn!("[BLYNK] Error: {e}"),
    }
}
