//! The framed output protocol.
//!
//! Results and diagnostics leave the process as a byte stream of
//! self-delimited frames on stdout. Each frame starts with a type byte,
//! carries UTF-8 payload, and ends with a single zero byte. Message frames
//! additionally carry a severity byte before the payload.
//!
//! ```text
//! message:  0x01 <severity> "line {n}: " <text> 0x00
//! result:   0x02 [<parsed> ' ']  ("≈ " | "= ") <result> 0x00
//! ```
//!
//! The parsed form is only included when it differs from the result text,
//! so `2 + 2` produces `2 + 2 = 4` while `4` produces just `= 4`.
//!
//! Payload text is assumed to never contain a zero byte; the engine's
//! output has no business containing one, but this is unverified against
//! any engine and a frame would be corrupt if it did.

use std::io::{self, Write};

use crate::engine::Severity;

/// Frame type tags.
pub const FRAME_MESSAGE: u8 = 1;
pub const FRAME_RESULT: u8 = 2;

/// Severity bytes for message frames.
pub const LEVEL_INFO: u8 = 1;
pub const LEVEL_WARNING: u8 = 2;
pub const LEVEL_ERROR: u8 = 3;
pub const LEVEL_UNKNOWN: u8 = 4;

/// End-of-frame marker.
pub const SEPARATOR: u8 = 0;

fn severity_byte(severity: Severity) -> u8 {
    match severity {
        Severity::Info => LEVEL_INFO,
        Severity::Warning => LEVEL_WARNING,
        Severity::Error => LEVEL_ERROR,
        Severity::Unknown => LEVEL_UNKNOWN,
    }
}

/// Serializes frames to an output stream.
///
/// Each frame is assembled into a private buffer and handed to the stream
/// with one `write_all`, so a frame never spans a partial write from the
/// protocol's point of view.
#[derive(Debug)]
pub struct FrameEncoder<W: Write> {
    out: W,
}

impl<W: Write> FrameEncoder<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Emit a message frame for a diagnostic attributed to `line` (1-based).
    pub fn emit_message(&mut self, severity: Severity, line: usize, text: &str) -> io::Result<()> {
        let mut frame = Vec::with_capacity(text.len() + 16);
        frame.push(FRAME_MESSAGE);
        frame.push(severity_byte(severity));
        frame.extend_from_slice(format!("line {line}: ").as_bytes());
        frame.extend_from_slice(text.as_bytes());
        frame.push(SEPARATOR);
        self.out.write_all(&frame)
    }

    /// Emit the terminal result frame.
    pub fn emit_result(&mut self, parsed: &str, result: &str, approximate: bool) -> io::Result<()> {
        let mut frame = Vec::with_capacity(parsed.len() + result.len() + 8);
        frame.push(FRAME_RESULT);
        if parsed != result {
            frame.extend_from_slice(parsed.as_bytes());
            frame.push(b' ');
        }
        frame.extend_from_slice(if approximate { "≈ " } else { "= " }.as_bytes());
        frame.extend_from_slice(result.as_bytes());
        frame.push(SEPARATOR);
        self.out.write_all(&frame)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
