//! Bounded output capture for background jobs.

/// Output buffer holding the captured stdout/stderr of one job.
///
/// The buffer is allowed to grow to twice `max_bytes`, then the head is
/// discarded so roughly `max_bytes` of the most recent output remain.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    /// Raw bytes as produced by the process
    bytes: Vec<u8>,
    /// Target size after trimming
    max_bytes: usize,
    /// Total bytes discarded from the head
    dropped: u64,
}

impl OutputBuffer {
    /// Create a new output buffer bounded to roughly `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            bytes: Vec::new(),
            max_bytes: max_bytes.max(1),
            dropped: 0,
        }
    }

    /// Append a chunk of output.
    pub fn append(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);

        if self.bytes.len() > self.max_bytes * 2 {
            let keep_from = self.bytes.len() - self.max_bytes;
            // Skip UTF-8 continuation bytes (0b10xxxxxx) so we never start mid-character.
            let safe_keep_from = (keep_from..self.bytes.len())
                .find(|&i| self.bytes[i] & 0xC0 != 0x80)
                .unwrap_or(self.bytes.len());
            self.bytes.drain(..safe_keep_from);
            self.dropped += safe_keep_from as u64;
        }
    }

    /// Raw captured bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Current buffer size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been captured (or everything was dropped).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes discarded from the head so far.
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_buffer_new() {
        let buffer = OutputBuffer::new(1024);
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.dropped_bytes(), 0);
    }

    #[test]
    fn test_output_buffer_append() {
        let mut buffer = OutputBuffer::new(1024);
        buffer.append(b"Hello");
        buffer.append(b" World");

        assert_eq!(buffer.len(), 11);
        assert_eq!(buffer.as_bytes(), b"Hello World");
    }

    #[test]
    fn test_output_buffer_trims_head() {
        let mut buffer = OutputBuffer::new(4);
        buffer.append(b"abcdefgh");
        assert_eq!(buffer.as_bytes(), b"abcdefgh");

        buffer.append(b"i");
        assert_eq!(buffer.as_bytes(), b"fghi");
        assert_eq!(buffer.dropped_bytes(), 5);
    }

    #[test]
    fn test_output_buffer_trim_respects_utf8() {
        let mut buffer = OutputBuffer::new(3);
        // 'é' occupies bytes 4..6; a plain cut at len - 3 would land on byte 5
        buffer.append("aaaaébc".as_bytes());
        assert_eq!(buffer.as_bytes(), b"bc");
        assert_eq!(buffer.dropped_bytes(), 6);
    }
}
