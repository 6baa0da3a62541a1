//! GridConnect ASCII framing.
//!
//! Frames travel over serial or TCP links as `:X` + eight hex header
//! digits + `N` + zero to sixteen hex data digits + `;`. The parser is an
//! accumulator: bytes arrive in arbitrary chunks, frames are recovered at
//! `;` boundaries, and malformed runs are skipped with a debug log rather
//! than surfaced as errors.

use super::{CanFrame, HEADER_MASK};
use tracing::debug;

/// Longest well-formed GridConnect frame: `:X` + 8 + `N` + 16 + `;`.
const MAX_FRAME_CHARS: usize = 28;

/// Encode one frame in GridConnect form.
pub fn encode(frame: &CanFrame) -> String {
    let mut out = String::with_capacity(MAX_FRAME_CHARS);
    out.push_str(&format!(":X{:08X}N", frame.header & HEADER_MASK));
    out.push_str(&hex::encode_upper(&frame.data));
    out.push(';');
    out
}

/// Accumulating GridConnect parser.
///
/// Feed raw bytes with [`GridConnectParser::accept`]; complete frames come
/// back in order. State persists across calls, so a frame split over any
/// chunk boundary is reassembled.
#[derive(Default)]
pub struct GridConnectParser {
    buf: Vec<u8>,
}

impl GridConnectParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a chunk of bytes, returning every frame completed by it.
    pub fn accept(&mut self, bytes: &[u8]) -> Vec<CanFrame> {
        let mut frames = Vec::new();
        for &b in bytes {
            match b {
                b':' => {
                    // A start marker always begins a fresh frame, discarding
                    // any partial garbage before it.
                    if !self.buf.is_empty() {
                        debug!(
                            discarded = self.buf.len(),
                            "GridConnect: discarding partial input at new start marker"
                        );
                    }
                    self.buf.clear();
                    self.buf.push(b);
                }
                b';' => {
                    if !self.buf.is_empty() {
                        self.buf.push(b);
                        match parse_frame(&self.buf) {
                            Some(frame) => frames.push(frame),
                            None => debug!(
                                text = %String::from_utf8_lossy(&self.buf),
                                "GridConnect: dropping malformed frame"
                            ),
                        }
                        self.buf.clear();
                    }
                }
                b'\r' | b'\n' => {}
                _ => {
                    if self.buf.is_empty() {
                        // Noise between frames; ignore until a start marker.
                        continue;
                    }
                    self.buf.push(b);
                    if self.buf.len() > MAX_FRAME_CHARS {
                        debug!("GridConnect: oversized run, resynchronizing");
                        self.buf.clear();
                    }
                }
            }
        }
        frames
    }
}

/// Parse one `:X...N...;` run. Returns `None` for anything malformed.
fn parse_frame(text: &[u8]) -> Option<CanFrame> {
    // ":X" + 8 header digits + "N" + ";" is the minimum.
    let body = text.strip_prefix(b":X")?.strip_suffix(b";")?;
    if body.len() < 9 || body[8] != b'N' {
        return None;
    }
    let header_text = std::str::from_utf8(&body[0..8]).ok()?;
    let header = u32::from_str_radix(header_text, 16).ok()?;
    if header > HEADER_MASK {
        return None;
    }
    let data_text = &body[9..];
    if data_text.len() % 2 != 0 || data_text.len() > 16 {
        return None;
    }
    let data = hex::decode(data_text).ok()?;
    Some(CanFrame { header, data })
}
