//! Fixed-size, overlapping character-window chunker.
//!
//! Splits document text into windows of `chars` characters, each starting
//! `chars - overlap` characters after the previous one. There is no
//! sentence or paragraph awareness: windows are pure character slices,
//! which keeps chunking cheap and fully deterministic.
//!
//! # Parameters
//!
//! - `chars`: window length in characters. `0` means [`DEFAULT_CHUNK_CHARS`].
//! - `overlap`: characters shared by consecutive windows. Defaults to
//!   15% of `chars` and is clamped to `[0, chars - 1]`, so the step is
//!   always at least 1 and the sequence always terminates.
//!
//! Lengths are counted in Unicode scalar values, never bytes, so windows
//! never split a multi-byte character.
//!
//! # Example
//!
//! ```rust
//! use ragkit_core::chunk::chunk_text;
//!
//! let text = "abcdefghijklmnopqrstuvwxy"; // 25 chars
//! let chunks = chunk_text(text, 10, Some(2));
//! assert_eq!(chunks.len(), 4);
//! assert_eq!(chunks[0], "abcdefghij");
//! assert_eq!(chunks[1], "ijklmnopqr");
//! ```

/// Default window length in characters.
pub const DEFAULT_CHUNK_CHARS: usize = 1200;

/// Default overlap as a fraction of the window length.
const DEFAULT_OVERLAP_RATIO: f64 = 0.15;

/// Resolved window geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub chars: usize,
    pub overlap: usize,
}

impl Window {
    /// Apply defaults and clamps to raw parameters.
    pub fn new(chars: usize, overlap: Option<usize>) -> Self {
        let chars = if chars == 0 { DEFAULT_CHUNK_CHARS } else { chars };
        let overlap = overlap
            .unwrap_or_else(|| (chars as f64 * DEFAULT_OVERLAP_RATIO).floor() as usize)
            .min(chars - 1);
        Self { chars, overlap }
    }

    pub fn step(&self) -> usize {
        self.chars.saturating_sub(self.overlap).max(1)
    }
}

/// Lazy, restartable sequence of windows over a text.
///
/// A clone is an independent cursor at the same position.
#[derive(Debug, Clone)]
pub struct ChunkWindows<'a> {
    text: &'a str,
    /// Byte offset of every char, plus `text.len()` as a sentinel.
    offsets: Vec<usize>,
    window: Window,
    pos: usize,
}

impl<'a> Iterator for ChunkWindows<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let char_len = self.offsets.len().saturating_sub(1);
        if self.pos >= char_len {
            return None;
        }
        let end = (self.pos + self.window.chars).min(char_len);
        let slice = &self.text[self.offsets[self.pos]..self.offsets[end]];
        self.pos += self.window.step();
        Some(slice)
    }
}

/// Iterate over the windows of `text`.
///
/// Empty or whitespace-only text yields no windows.
pub fn windows(text: &str, chars: usize, overlap: Option<usize>) -> ChunkWindows<'_> {
    let window = Window::new(chars, overlap);
    let offsets = if text.trim().is_empty() {
        Vec::new()
    } else {
        text.char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect()
    };
    ChunkWindows {
        text,
        offsets,
        window,
        pos: 0,
    }
}

/// Split `text` into owned windows. See [`windows`].
pub fn chunk_text(text: &str, chars: usize, overlap: Option<usize>) -> Vec<String> {
    windows(text, chars, overlap).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twenty_five_chars_ten_two() {
        let text: String = ('a'..='y').collect();
        assert_eq!(text.chars().count(), 25);
        let chunks = chunk_text(&text, 10, Some(2));
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "ijklmnopqr");
        assert_eq!(chunks[2], "qrstuvwxy");
        assert_eq!(chunks[3], "y");
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(chunk_text("", 10, None).is_empty());
        assert!(chunk_text("  \n\t  ", 10, None).is_empty());
    }

    #[test]
    fn test_default_geometry() {
        let w = Window::new(0, None);
        assert_eq!(w.chars, 1200);
        assert_eq!(w.overlap, 180);
        assert_eq!(w.step(), 1020);
    }

    #[test]
    fn test_overlap_clamped_below_chars() {
        let w = Window::new(10, Some(50));
        assert_eq!(w.overlap, 9);
        assert_eq!(w.step(), 1);

        let chunks = chunk_text("abcdefghijkl", 10, Some(50));
        // step 1 over 12 chars
        assert_eq!(chunks.len(), 12);
        assert_eq!(chunks[11], "l");
    }

    #[test]
    fn test_single_char_window() {
        let w = Window::new(1, None);
        assert_eq!(w.overlap, 0);
        assert_eq!(chunk_text("abc", 1, None), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_multibyte_chars_not_split() {
        let text = "┌──────┐héllo wörld";
        for c in chunk_text(text, 4, Some(1)) {
            assert!(c.chars().count() <= 4);
        }
    }

    #[test]
    fn test_restartable_and_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog.";
        let it = windows(text, 8, Some(3));
        let first: Vec<&str> = it.clone().collect();
        let second: Vec<&str> = it.collect();
        assert_eq!(first, second);
        assert_eq!(first, chunk_text(text, 8, Some(3)));
    }

    #[test]
    fn test_short_text_single_window() {
        let chunks = chunk_text("hello", 1200, None);
        assert_eq!(chunks, vec!["hello"]);
    }
}
