#![forbid(unsafe_code)]

//! Unicode oracles for the vtslice engine.
//!
//! This crate isolates the three pure Unicode queries the slicer depends on:
//! - [`codepoint_width`] - terminal cell width of a single codepoint
//! - [`is_emoji_presentation`] - Emoji_Presentation property lookup
//! - [`GraphemeBreaker`] - stateful pairwise grapheme-boundary oracle
//!
//! All three are re-entrant: two threads may query them concurrently without
//! synchronization. [`GraphemeBreaker`] carries per-call state and is owned
//! by one walk at a time.
//!
//! # Example
//! ```
//! use vtslice_unicode::{codepoint_width, GraphemeBreaker};
//!
//! assert_eq!(codepoint_width('a' as u32, true), 1);
//! assert_eq!(codepoint_width(0x4E2D, true), 2); // CJK
//!
//! let mut breaker = GraphemeBreaker::new();
//! breaker.restart('e');
//! assert!(!breaker.advance('\u{0301}')); // combining acute joins
//! assert!(breaker.advance('x'));
//! ```

pub mod breaker;
pub mod emoji;
pub mod width;

pub use breaker::GraphemeBreaker;
pub use emoji::is_emoji_presentation;
pub use width::codepoint_width;
