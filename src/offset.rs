//! Byte/char offset conversion.
//!
//! The `regex` crate reports byte offsets, but entity spans are character
//! offsets into the normalized text (the output contract, and what
//! downstream consumers index with). [`SpanConverter`] pre-computes the
//! mapping so each conversion is O(1); ASCII text short-circuits to the
//! identity mapping.

/// Converter for handling many byte spans from the same text.
pub struct SpanConverter {
    byte_to_char: Vec<usize>,
    is_ascii: bool,
}

impl SpanConverter {
    /// Build a converter for `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        if text.is_ascii() {
            return Self {
                byte_to_char: Vec::new(),
                is_ascii: true,
            };
        }
        // byte index -> char index, with one extra slot for the end offset
        let mut map = vec![0usize; text.len() + 1];
        let mut char_idx = 0;
        for (byte_idx, ch) in text.char_indices() {
            for b in byte_idx..byte_idx + ch.len_utf8() {
                map[b] = char_idx;
            }
            char_idx += 1;
        }
        map[text.len()] = char_idx;
        Self {
            byte_to_char: map,
            is_ascii: false,
        }
    }

    /// Convert a byte offset to a char offset. Offsets past the end clamp
    /// to the text's char length.
    #[must_use]
    pub fn byte_to_char(&self, byte_idx: usize) -> usize {
        if self.is_ascii {
            byte_idx
        } else {
            self.byte_to_char
                .get(byte_idx)
                .or_else(|| self.byte_to_char.last())
                .copied()
                .unwrap_or(0)
        }
    }
}
