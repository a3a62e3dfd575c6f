//! Operator console line assembly.
//!
//! USB packets arrive as arbitrary byte chunks; this module reassembles
//! them into bounded command lines for the rig task. Only printable ASCII
//! matters to the protocol, so anything else (apart from terminators and
//! backspace) is dropped on the floor. Oversized lines are discarded whole
//! rather than truncated, because half a command is worse than none.

#![allow(dead_code)]

use heapless::{String, Vec};

/// Maximum number of bytes accepted on a single console line.
pub const MAX_LINE_LEN: usize = 96;

/// A completed, bounded command line.
pub type ConsoleLine = String<MAX_LINE_LEN>;

/// Reassembles console byte chunks into lines.
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    discarding: bool,
}

impl LineAssembler {
    /// Creates an empty assembler.
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feeds a chunk of bytes, invoking `on_line` for each completed line.
    pub fn push_bytes<F>(&mut self, bytes: &[u8], mut on_line: F)
    where
        F: FnMut(ConsoleLine),
    {
        for &byte in bytes {
            match byte {
                b'\r' | b'\n' => {
                    if self.discarding {
                        self.discarding = false;
                    } else if !self.buffer.is_empty() {
                        if let Some(line) = self.take_line() {
                            on_line(line);
                        }
                    }
                    self.buffer.clear();
                }
                0x08 | 0x7F => {
                    let _ = self.buffer.pop();
                }
                0x20..=0x7E => {
                    if !self.discarding && self.buffer.push(byte).is_err() {
                        self.discarding = true;
                        self.buffer.clear();
                    }
                }
                _ => {}
            }
        }
    }

    /// Returns `true` while a partial line is buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn take_line(&mut self) -> Option<ConsoleLine> {
        let text = core::str::from_utf8(&self.buffer).ok()?;
        let mut line = ConsoleLine::new();
        line.push_str(text).ok()?;
        Some(line)
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}
