#![forbid(unsafe_code)]

//! Stateful pairwise grapheme-boundary oracle.
//!
//! UAX #29 boundary decisions are not a pure function of the adjacent pair:
//! regional-indicator parity (GB12/GB13) and the emoji ZWJ rule (GB11) need
//! the left context back to the start of the current cluster. The breaker
//! keeps exactly that context - the UTF-8 text of the cluster being
//! accumulated - and lets `unicode-segmentation`'s [`GraphemeCursor`] answer
//! each boundary question with it.
//!
//! Callers must route CR and LF around the breaker (they break
//! unconditionally except for the CRLF pair) via [`GraphemeBreaker::restart`].

use unicode_segmentation::GraphemeCursor;

/// Pairwise grapheme-boundary oracle with cluster-local context.
#[derive(Debug, Default)]
pub struct GraphemeBreaker {
    cluster: String,
}

impl GraphemeBreaker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a grapheme boundary exists between the accumulated cluster and
    /// `next`. Consumes `next` into the tracked state: on a boundary the
    /// cluster restarts at `next`, otherwise `next` extends it.
    ///
    /// Returns `true` (boundary) when no cluster has been started yet.
    pub fn advance(&mut self, next: char) -> bool {
        if self.cluster.is_empty() {
            self.cluster.push(next);
            return true;
        }
        let split = self.cluster.len();
        self.cluster.push(next);
        let mut cursor = GraphemeCursor::new(split, self.cluster.len(), true);
        let boundary = cursor.is_boundary(&self.cluster, 0).unwrap_or(true);
        if boundary {
            self.cluster.drain(..split);
        }
        boundary
    }

    /// Unconditionally begin a new cluster at `next`, discarding context.
    pub fn restart(&mut self, next: char) {
        self.cluster.clear();
        self.cluster.push(next);
    }

    /// Drop all context (used between independent walks).
    pub fn clear(&mut self) {
        self.cluster.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundaries(text: &str) -> Vec<bool> {
        let mut b = GraphemeBreaker::new();
        text.chars().map(|c| b.advance(c)).collect()
    }

    #[test]
    fn ascii_always_breaks() {
        assert_eq!(boundaries("abc"), vec![true, true, true]);
    }

    #[test]
    fn combining_mark_joins() {
        assert_eq!(boundaries("e\u{0301}x"), vec![true, false, true]);
    }

    #[test]
    fn zwj_sequence_joins() {
        // man ZWJ woman ZWJ girl: one cluster.
        let seq = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}";
        let b = boundaries(seq);
        assert_eq!(b[0], true);
        assert!(b[1..].iter().all(|&x| !x), "{b:?}");
    }

    #[test]
    fn regional_indicator_parity() {
        // RI RI RI RI: boundary before the first and third only.
        let b = boundaries("\u{1F1FA}\u{1F1F8}\u{1F1E9}\u{1F1EA}");
        assert_eq!(b, vec![true, false, true, false]);
    }

    #[test]
    fn three_regional_indicators() {
        let b = boundaries("\u{1F1FA}\u{1F1F8}\u{1F1E9}");
        assert_eq!(b, vec![true, false, true]);
    }

    #[test]
    fn skin_tone_modifier_joins() {
        let b = boundaries("\u{1F44D}\u{1F3FB}");
        assert_eq!(b, vec![true, false]);
    }

    #[test]
    fn keycap_sequence_joins() {
        let b = boundaries("1\u{FE0F}\u{20E3}");
        assert_eq!(b, vec![true, false, false]);
    }

    #[test]
    fn restart_forgets_parity() {
        let mut b = GraphemeBreaker::new();
        assert!(b.advance('\u{1F1FA}'));
        b.restart('\u{1F1F8}');
        // Parity was reset: the next RI pairs with the restarted one.
        assert!(!b.advance('\u{1F1E9}'));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use unicode_segmentation::UnicodeSegmentation;

    proptest! {
        /// The streaming oracle must agree with whole-string segmentation.
        #[test]
        fn matches_batch_segmentation(s in "\\PC{0,24}") {
            let mut b = GraphemeBreaker::new();
            let streamed: usize = s.chars().map(|c| usize::from(b.advance(c))).sum();
            let batch = s.graphemes(true).count();
            prop_assert_eq!(streamed, batch);
        }
    }
}
