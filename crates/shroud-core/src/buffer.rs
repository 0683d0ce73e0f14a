//! Bounded password accumulator.
//!
//! The buffer holds the password as it is typed: append-only except for
//! single-character removal and full clears. Capacity is fixed and clearing
//! wipes the bytes rather than just resetting the length, so credential
//! material never lingers after a submission.

use secrecy::SecretString;
use zeroize::{Zeroize, Zeroizing};

/// Maximum password length in bytes.
pub const MAX_PASSWORD_LEN: usize = 255;

/// A bounded, self-wiping byte accumulator for the password being typed.
///
/// Contents are always valid UTF-8 because the only way in is
/// [`push`](PasswordBuffer::push). The backing storage is zeroed on clear
/// and on drop.
pub struct PasswordBuffer {
    bytes: Zeroizing<Vec<u8>>,
    capacity: usize,
}

impl PasswordBuffer {
    /// Create an empty buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(MAX_PASSWORD_LEN)
    }

    /// Create an empty buffer with an explicit byte capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Zeroizing::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a character. Returns `false` (leaving the buffer unchanged)
    /// when the encoded character would exceed capacity.
    pub fn push(&mut self, c: char) -> bool {
        let mut encoded = [0u8; 4];
        let encoded = c.encode_utf8(&mut encoded);
        if self.bytes.len() + encoded.len() > self.capacity {
            return false;
        }
        self.bytes.extend_from_slice(encoded.as_bytes());
        true
    }

    /// Remove the last character. Returns `false` if the buffer was empty.
    ///
    /// The removed bytes are wiped, not merely truncated away.
    pub fn pop(&mut self) -> bool {
        if self.bytes.is_empty() {
            return false;
        }
        let mut end = self.bytes.len() - 1;
        // Walk back over UTF-8 continuation bytes to the character start.
        while end > 0 && self.bytes[end] & 0xc0 == 0x80 {
            end -= 1;
        }
        self.bytes[end..].zeroize();
        self.bytes.truncate(end);
        true
    }

    /// Wipe and empty the buffer.
    pub fn clear(&mut self) {
        self.bytes.zeroize();
        self.bytes.clear();
    }

    /// Take the accumulated password for submission, clearing the buffer.
    pub fn take_secret(&mut self) -> SecretString {
        let secret = SecretString::from(String::from_utf8_lossy(&self.bytes).into_owned());
        self.clear();
        secret
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for PasswordBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// Manual Debug implementation to avoid exposing the password.
impl std::fmt::Debug for PasswordBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordBuffer")
            .field("len", &self.bytes.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn push_accumulates_within_capacity() {
        let mut buf = PasswordBuffer::new();
        for c in "secret".chars() {
            assert!(buf.push(c));
        }
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.take_secret().expose_secret(), "secret");
    }

    #[test]
    fn push_length_matches_accepted_characters() {
        // Buffer length after a printable sequence equals the number of
        // characters accepted under the capacity limit.
        let mut buf = PasswordBuffer::with_capacity(4);
        let mut accepted = 0;
        for c in "abcdefgh".chars() {
            if buf.push(c) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 4);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn push_rejects_when_full() {
        let mut buf = PasswordBuffer::with_capacity(2);
        assert!(buf.push('a'));
        assert!(buf.push('b'));
        assert!(!buf.push('c'));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn push_rejects_multibyte_overflow() {
        // One byte of room left; a two-byte character must not split.
        let mut buf = PasswordBuffer::with_capacity(2);
        assert!(buf.push('a'));
        assert!(!buf.push('é'));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.take_secret().expose_secret(), "a");
    }

    #[test]
    fn pop_removes_whole_characters() {
        let mut buf = PasswordBuffer::new();
        buf.push('a');
        buf.push('é');
        assert_eq!(buf.len(), 3);
        assert!(buf.pop());
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.take_secret().expose_secret(), "a");
    }

    #[test]
    fn pop_on_empty_is_noop() {
        let mut buf = PasswordBuffer::new();
        assert!(!buf.pop());
        assert!(buf.is_empty());
    }

    #[test]
    fn clear_empties_regardless_of_content() {
        let mut buf = PasswordBuffer::new();
        for c in "hunter2".chars() {
            buf.push(c);
        }
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.take_secret().expose_secret(), "");
    }

    #[test]
    fn take_secret_clears_the_buffer() {
        let mut buf = PasswordBuffer::new();
        buf.push('x');
        let secret = buf.take_secret();
        assert_eq!(secret.expose_secret(), "x");
        assert!(buf.is_empty());
    }

    #[test]
    fn debug_does_not_leak_contents() {
        let mut buf = PasswordBuffer::new();
        buf.push('p');
        let rendered = format!("{buf:?}");
        assert!(rendered.contains("len: 1"));
        assert!(!rendered.contains("\"p\""));
    }
}
