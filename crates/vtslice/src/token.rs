#![forbid(unsafe_code)]

//! ANSI sequence tokenizer.
//!
//! Recognizes one sequence starting at a given cursor and classifies it as
//! SGR, hyperlink open/close, or opaque control. Dispatch order matters:
//! OSC-8 hyperlinks are a specialization of OSC, so they are attempted before
//! the generic control-string path, which in turn runs before CSI.
//!
//! A `None` return means "not a sequence here": the caller treats the unit as
//! a visible codepoint and advances by one. Unterminated control strings are
//! deliberately `None` - a lone DCS/SOS/PM/APC introducer must not swallow
//! the rest of the input.

use crate::scan::is_escape_value;
use crate::unit::CodeUnit;

const ESC: u32 = 0x1B;
const BEL: u32 = 0x07;
const C1_CSI: u32 = 0x9B;
const C1_OSC: u32 = 0x9D;
const C1_ST: u32 = 0x9C;

/// How a hyperlink or control string was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminator {
    /// BEL (`0x07`), the xterm OSC convention.
    Bel,
    /// `ESC \`.
    EscSt,
    /// C1 ST (`0x9C`).
    C1St,
}

impl Terminator {
    pub(crate) fn bytes(self) -> &'static [u8] {
        match self {
            Self::Bel => &[0x07],
            Self::EscSt => &[0x1B, b'\\'],
            Self::C1St => &[0x9C],
        }
    }
}

/// Parsed OSC-8 hyperlink sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HyperlinkToken {
    /// Non-empty URI opens a link; empty URI closes the active one.
    pub is_open: bool,
    /// Introduced with the C1 OSC byte rather than `ESC ]`.
    pub c1: bool,
    pub terminator: Terminator,
}

impl HyperlinkToken {
    /// The close sequence prefix matching this link's flavor: `OSC 8 ; ;`.
    pub(crate) fn close_prefix(self) -> &'static [u8] {
        if self.c1 {
            &[0x9D, b'8', b';', b';']
        } else {
            &[0x1B, b']', b'8', b';', b';']
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// CSI ending in `m` with only digit/`;`/`:` parameters.
    Sgr,
    /// Any other recognized sequence; skipped, contributes no columns.
    Control,
    Hyperlink(HyperlinkToken),
}

/// A recognized ANSI sequence spanning `at..end` in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub end: usize,
}

/// Attempt to recognize an ANSI sequence starting at `at`.
pub(crate) fn try_parse<U: CodeUnit>(units: &[U], at: usize) -> Option<Token> {
    let v = units[at].value();

    if v == ESC || v == C1_OSC {
        if let Some(token) = parse_hyperlink(units, at) {
            return Some(token);
        }
    }

    if is_escape_value(v) && v != C1_CSI {
        if let Some(end) = parse_control_string(units, at) {
            return Some(Token {
                kind: TokenKind::Control,
                end,
            });
        }
    }

    if v == ESC || v == C1_CSI {
        if let Some((end, is_sgr)) = parse_csi(units, at) {
            return Some(Token {
                kind: if is_sgr { TokenKind::Sgr } else { TokenKind::Control },
                end,
            });
        }
    }

    None
}

/// `OSC 8 ; params ; URI terminator`. Returns `None` when unterminated or not
/// an OSC-8 introduction at all.
fn parse_hyperlink<U: CodeUnit>(units: &[U], at: usize) -> Option<Token> {
    let len = units.len();
    let (c1, mut it) = if units[at].value() == ESC {
        if at + 4 > len
            || units[at + 1].value() != u32::from(b']')
            || units[at + 2].value() != u32::from(b'8')
            || units[at + 3].value() != u32::from(b';')
        {
            return None;
        }
        (false, at + 4)
    } else if units[at].value() == C1_OSC {
        if at + 3 > len
            || units[at + 1].value() != u32::from(b'8')
            || units[at + 2].value() != u32::from(b';')
        {
            return None;
        }
        (true, at + 3)
    } else {
        return None;
    };

    // Skip the params segment to the semicolon introducing the URI.
    while it < len && units[it].value() != u32::from(b';') {
        it += 1;
    }
    if it >= len {
        return None;
    }
    let uri_start = it + 1;

    let mut p = uri_start;
    while p < len {
        let v = units[p].value();
        let (terminator, end) = if v == BEL {
            (Terminator::Bel, p + 1)
        } else if v == ESC && p + 1 < len && units[p + 1].value() == u32::from(b'\\') {
            (Terminator::EscSt, p + 2)
        } else if v == C1_ST {
            (Terminator::C1St, p + 1)
        } else {
            p += 1;
            continue;
        };
        return Some(Token {
            kind: TokenKind::Hyperlink(HyperlinkToken {
                is_open: p > uri_start,
                c1,
                terminator,
            }),
            end,
        });
    }
    None
}

/// OSC (non-8), DCS, SOS, PM, APC, or a standalone ST. Consumes through the
/// terminator; `None` when the string never terminates.
fn parse_control_string<U: CodeUnit>(units: &[U], at: usize) -> Option<usize> {
    let len = units.len();
    let v = units[at].value();

    let (mut it, supports_bel) = match v {
        ESC => {
            if at + 1 >= len {
                return None;
            }
            match units[at + 1].value() {
                x if x == u32::from(b']') => (at + 2, true),
                x if x == u32::from(b'P')
                    || x == u32::from(b'X')
                    || x == u32::from(b'^')
                    || x == u32::from(b'_') =>
                {
                    (at + 2, false)
                }
                x if x == u32::from(b'\\') => return Some(at + 2),
                _ => return None,
            }
        }
        0x9D => (at + 1, true),
        0x90 | 0x98 | 0x9E | 0x9F => (at + 1, false),
        C1_ST => return Some(at + 1),
        _ => return None,
    };

    while it < len {
        let c = units[it].value();
        if supports_bel && c == BEL {
            return Some(it + 1);
        }
        if c == ESC && it + 1 < len && units[it + 1].value() == u32::from(b'\\') {
            return Some(it + 2);
        }
        if c == C1_ST {
            return Some(it + 1);
        }
        it += 1;
    }
    None
}

/// CSI: `ESC [ params intermediates final` or the C1 form. Returns the end
/// cursor and whether the sequence is a well-formed SGR. A byte outside the
/// parameter/intermediate/final ranges stops the parse at that byte (the
/// prefix is consumed as an opaque control); running out of input consumes
/// everything.
fn parse_csi<U: CodeUnit>(units: &[U], at: usize) -> Option<(usize, bool)> {
    let len = units.len();
    let mut it = if units[at].value() == ESC {
        if at + 2 > len || units[at + 1].value() != u32::from(b'[') {
            return None;
        }
        at + 2
    } else if units[at].value() == C1_CSI {
        at + 1
    } else {
        return None;
    };

    let mut canonical = true;
    while it < len {
        let c = units[it].value();

        if (0x40..=0x7E).contains(&c) {
            let is_sgr = c == u32::from(b'm') && canonical;
            return Some((it + 1, is_sgr));
        }

        if (0x30..=0x3F).contains(&c) {
            // SGR permits only digits, semicolons, and colons.
            if !(0x30..=0x39).contains(&c) && c != u32::from(b';') && c != u32::from(b':') {
                canonical = false;
            }
            it += 1;
            continue;
        }

        if (0x20..=0x2F).contains(&c) {
            canonical = false;
            it += 1;
            continue;
        }

        // Malformed interior byte: consume up to (not including) it.
        return Some((it, false));
    }

    Some((len, false))
}
