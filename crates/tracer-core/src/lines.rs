//! Line framing and the bounded trace-line ring buffer.

use bytes::{Buf, BytesMut};
use std::collections::VecDeque;

/// Reassembles lines from arbitrarily split byte chunks.
///
/// A partial trailing line is held until its terminator arrives. Decoding
/// happens per complete line, so a multi-byte character split across two
/// chunks survives intact.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: BytesMut,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without
    /// terminators (`\n` or `\r\n`). Blank lines are kept.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line = self.pending.split_to(pos);
            self.pending.advance(1);
            let line = line.strip_suffix(b"\r").unwrap_or(&line[..]);
            lines.push(String::from_utf8_lossy(line).into_owned());
        }
        lines
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Discard any partial line.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

/// Ring buffer of the most recent trace lines; oldest lines are evicted
/// first once capacity is reached.
#[derive(Debug)]
pub struct LineBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, lines: I) {
        self.lines.extend(lines);
        let excess = self.lines.len().saturating_sub(self.capacity);
        self.lines.drain(..excess);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
