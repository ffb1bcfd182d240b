//! Receive buffer for the virtual serial port
//!
//! Radio notifications arrive in small, arbitrarily split chunks. The buffer
//! joins them and hands out complete records terminated by `\r` or `\n`.

/// Pending bytes after which an unterminated record is flushed anyway
pub const MAX_PENDING_LEN: usize = 4096;

#[derive(Debug, Default, Clone)]
pub struct RxBuffer {
    pending: String,
}

impl RxBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every record it completed
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        let mut records = Vec::new();

        for ch in chunk.chars() {
            if ch == '\r' || ch == '\n' {
                // "\r\n" and blank lines produce no empty records
                if !self.pending.is_empty() {
                    records.push(std::mem::take(&mut self.pending));
                }
                continue;
            }

            self.pending.push(ch);
            if self.pending.len() >= MAX_PENDING_LEN {
                tracing::warn!("Rx buffer reached {} bytes without a terminator, flushing", MAX_PENDING_LEN);
                records.push(std::mem::take(&mut self.pending));
            }
        }

        records
    }

    /// Data received since the last terminator
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
