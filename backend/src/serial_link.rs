use anyhow::Context;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, BufRead, BufReader};
use std::time::Duration;

/// Any producer of raw text lines from the sensor node.
pub type LineSource = Box<dyn Iterator<Item = io::Result<String>> + Send>;

// ======================================================================
//  Serial port to the sensor node
// ======================================================================
pub struct SerialLink {
    inner: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(path: &str, baud: u32, timeout: Duration) -> anyhow::Result<Self> {
        let inner = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .with_context(|| format!("failed to open serial port {path}"))?;
        Ok(Self { inner })
    }

    pub fn lines(self) -> FrameLines<BufReader<Box<dyn SerialPort>>> {
        FrameLines::new(BufReader::new(self.inner))
    }
}

// ======================================================================
//  Line framing
// ======================================================================

/// Longest line kept before the bytes received so far are handed out anyway.
pub const MAX_LINE_BYTES: usize = 4096;

/// Newline framed text lines, lossily decoded and trimmed. Blank lines are
/// skipped. A read timeout keeps the bytes received so far and waits for the
/// rest of the line; a line longer than [`MAX_LINE_BYTES`] is cut there. Any
/// other I/O error is yielded once and ends the sequence.
pub struct FrameLines<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> FrameLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
            done: false,
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buf);
        let text = decode_ignoring_invalid(&raw);
        let line = text.trim();
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }
}

impl<R: BufRead> Iterator for FrameLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let available = match self.reader.fill_buf() {
                Ok(bytes) => bytes,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if available.is_empty() {
                self.done = true;
                return self.take_line().map(Ok);
            }

            let room = MAX_LINE_BYTES - self.buf.len();
            let window = &available[..available.len().min(room)];
            let (used, complete) = match window.iter().position(|&b| b == b'\n') {
                Some(idx) => (idx + 1, true),
                None => (window.len(), window.len() == room),
            };
            self.buf.extend_from_slice(&window[..used]);
            self.reader.consume(used);

            if complete {
                if let Some(line) = self.take_line() {
                    return Some(Ok(line));
                }
            }
        }
        None
    }
}

/// UTF-8 decode that drops invalid byte sequences instead of replacing them.
fn decode_ignoring_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
