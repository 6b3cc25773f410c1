#![forbid(unsafe_code)]

//! ANSI-aware visible-width string slicing.
//!
//! Extracts the substring occupying a half-open range of terminal columns,
//! preserving everything that makes the region render identically to the
//! original: SGR styles opened before the window are replayed at its start
//! and closed at its end, OSC-8 hyperlinks are reopened and closed in their
//! original flavor, and grapheme clusters (emoji ZWJ sequences, combining
//! marks, regional-indicator pairs) are treated atomically.
//!
//! The engine is a single-pass walk: no width pre-pass for non-negative
//! indices, a bounded scan horizon so short slices of long strings stay
//! proportional to the slice, and vectorized fast paths for printable ASCII.
//!
//! - [`slice`] / [`slice_with`] - `&str` front door, zero-copy on identity
//! - [`slice_latin1`] / [`slice_utf16`] - raw code-unit spans for host
//!   bindings that store text as Latin-1 or UTF-16
//! - [`truncate`] - end-cut convenience with an ellipsis
//!
//! # Example
//! ```
//! use vtslice::{slice, slice_with, SliceOptions};
//!
//! // Styles are closed at the window edge and replayed at its start.
//! assert_eq!(
//!     slice("\x1b[31mhello\x1b[39m world", 0.0, 5.0),
//!     "\x1b[31mhello\x1b[39m"
//! );
//! assert_eq!(
//!     slice("hello\x1b[31m world\x1b[39m", 6.0, 11.0),
//!     "\x1b[31mworld\x1b[39m"
//! );
//!
//! // CJK characters occupy two columns each.
//! assert_eq!(slice("\u{65E5}\u{672C}\u{8A9E}", 2.0, 4.0), "\u{672C}");
//!
//! // Ellipses substitute for the cut columns on either side.
//! let opts = SliceOptions::new().ellipsis("\u{2026}");
//! assert_eq!(slice_with("abcdef", 1.0, 5.0, &opts), "\u{2026}cd\u{2026}");
//! ```

mod cluster;
mod engine;
mod scan;
mod sgr;
mod token;
mod unit;

use std::borrow::Cow;

use engine::{slice_units, total_width, Request, Sliced};

pub use unit::CodeUnit;

/// Options for a slice call.
///
/// `start`/`end` travel as integer-valued doubles (negative counts from the
/// end, `+INFINITY` means "to the end"); these options carry everything else.
#[derive(Debug, Clone, Copy)]
pub struct SliceOptions<'a> {
    ellipsis: &'a str,
    ambiguous_is_narrow: bool,
}

impl<'a> SliceOptions<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ellipsis: "",
            ambiguous_is_narrow: true,
        }
    }

    /// String substituted for cut-off columns; its own visible width is
    /// charged against the window. Empty (the default) disables ellipses.
    #[must_use]
    pub fn ellipsis(mut self, ellipsis: &'a str) -> Self {
        self.ellipsis = ellipsis;
        self
    }

    /// Resolve East-Asian-Ambiguous codepoints as narrow (default) or wide.
    #[must_use]
    pub fn ambiguous_is_narrow(mut self, narrow: bool) -> Self {
        self.ambiguous_is_narrow = narrow;
        self
    }
}

impl Default for SliceOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of slicing a raw code-unit span.
///
/// `Identity` signals that the slice equals the whole input; callers reuse
/// their original buffer instead of copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitSlice<U> {
    Identity,
    Text(Vec<U>),
}

impl<U: CodeUnit> UnitSlice<U> {
    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Materialize the result, copying `input` on the identity path.
    #[must_use]
    pub fn into_units(self, input: &[U]) -> Vec<U> {
        match self {
            Self::Identity => input.to_vec(),
            Self::Text(units) => units,
        }
    }
}

fn slice_span<U: CodeUnit>(
    input: &[U],
    start: f64,
    end: f64,
    ellipsis: &[U],
    ambiguous_is_narrow: bool,
) -> UnitSlice<U> {
    let ellipsis_width = if ellipsis.is_empty() {
        0
    } else {
        // Ellipsis width is its visible width: ANSI inside it counts for zero.
        let prefix = U::ascii_printable_prefix(ellipsis);
        total_width(ellipsis, prefix, ambiguous_is_narrow)
    };
    match slice_units(&Request {
        input,
        start,
        end,
        ellipsis,
        ellipsis_width,
        ambiguous_is_narrow,
    }) {
        Sliced::Identity => UnitSlice::Identity,
        Sliced::Text(units) => UnitSlice::Text(units),
    }
}

/// Slice a Latin-1 span by visible columns.
///
/// Ellipsis characters above U+00FF cannot be represented in Latin-1 output
/// and are replaced by `?`; the [`slice_with`] front door routes such inputs
/// through the UTF-16 path instead.
#[must_use]
pub fn slice_latin1(input: &[u8], start: f64, end: f64, options: &SliceOptions<'_>) -> UnitSlice<u8> {
    let mut ellipsis = Vec::with_capacity(options.ellipsis.len());
    for ch in options.ellipsis.chars() {
        u8::push_char(&mut ellipsis, ch);
    }
    slice_span(input, start, end, &ellipsis, options.ambiguous_is_narrow)
}

/// Slice a UTF-16 span by visible columns. Lone surrogates pass through as
/// single width-1 units.
#[must_use]
pub fn slice_utf16(
    input: &[u16],
    start: f64,
    end: f64,
    options: &SliceOptions<'_>,
) -> UnitSlice<u16> {
    let ellipsis: Vec<u16> = options.ellipsis.encode_utf16().collect();
    slice_span(input, start, end, &ellipsis, options.ambiguous_is_narrow)
}

/// Slice with default options. `Cow::Borrowed` is the zero-copy identity
/// signal: the slice is equivalent to the whole input.
#[must_use]
pub fn slice(input: &str, start: f64, end: f64) -> Cow<'_, str> {
    slice_with(input, start, end, &SliceOptions::new())
}

/// Slice `input` to the visible-column window `[start, end)`.
///
/// ASCII input (with an ASCII ellipsis) is sliced directly on the bytes;
/// anything else goes through the UTF-16 path, mirroring the 8/16-bit host
/// string representations the engine is built around.
#[must_use]
pub fn slice_with<'a>(
    input: &'a str,
    start: f64,
    end: f64,
    options: &SliceOptions<'_>,
) -> Cow<'a, str> {
    if input.is_empty() {
        return Cow::Borrowed(input);
    }
    // Identity precheck, before any transcoding.
    if start == 0.0 && end.is_infinite() && end > 0.0 && options.ellipsis.is_empty() {
        return Cow::Borrowed(input);
    }
    if input.is_ascii() && options.ellipsis.is_ascii() {
        match slice_latin1(input.as_bytes(), start, end, options) {
            UnitSlice::Identity => Cow::Borrowed(input),
            UnitSlice::Text(units) => Cow::Owned(String::from_utf8_lossy(&units).into_owned()),
        }
    } else {
        let units: Vec<u16> = input.encode_utf16().collect();
        match slice_utf16(&units, start, end, options) {
            UnitSlice::Identity => Cow::Borrowed(input),
            UnitSlice::Text(units) => Cow::Owned(String::from_utf16_lossy(&units)),
        }
    }
}

/// Keep the first `max_width` columns, appending `ellipsis` when anything
/// was cut.
#[must_use]
pub fn truncate<'a>(input: &'a str, max_width: f64, ellipsis: &str) -> Cow<'a, str> {
    slice_with(
        input,
        0.0,
        max_width,
        &SliceOptions::new().ellipsis(ellipsis),
    )
}
