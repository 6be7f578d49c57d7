//! # Sentence Framer
//!
//! Reassembles an arbitrarily chunked byte stream into text lines.

use bytes::{Buf, BytesMut};

/// Bytes kept without seeing a line feed before the buffer is discarded
pub const MAX_PENDING_BYTES: usize = 1024;

const LINE_FEED: u8 = b'\n';
const CARRIAGE_RETURN: u8 = b'\r';

/// Line framer for NMEA streams
///
/// Only printable ASCII plus CR/LF survives. Lines are split on LF and a
/// trailing CR is trimmed.
///
/// # Examples
///
/// ```
/// use tracker_node::nmea::framer::LineFramer;
///
/// let mut framer = LineFramer::new();
/// assert!(framer.push(b"$GNGGA,1").is_empty());
/// assert_eq!(framer.push(b"23*00\r\n"), vec!["$GNGGA,123*00".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: BytesMut,
}

impl LineFramer {
    /// Creates an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_PENDING_BYTES),
        }
    }

    /// Feed a chunk and collect every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend(
            chunk
                .iter()
                .copied()
                .filter(|&b| b == LINE_FEED || b == CARRIAGE_RETURN || (0x20..=0x7E).contains(&b)),
        );

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == LINE_FEED) {
            let raw = self.buffer.split_to(pos);
            self.buffer.advance(1);

            let mut line = raw.as_ref();
            if let Some((&CARRIAGE_RETURN, rest)) = line.split_last() {
                line = rest;
            }
            // Filtered to ASCII above
            lines.push(String::from_utf8_lossy(line).into_owned());
        }

        if self.buffer.len() > MAX_PENDING_BYTES {
            self.buffer.clear();
        }

        lines
    }
}
