#![forbid(unsafe_code)]

//! SGR parameter parsing and active-style tracking.
//!
//! The tracker keeps the ordered set of styles in effect at the cursor,
//! keyed by the SGR code that cancels each one (22 cancels bold and dim, 39
//! cancels every foreground color, and so on). Opens are replayed at the
//! slice window's entry point; closes are synthesized in reverse insertion
//! order at its exit.
//!
//! Sequences with colon parameters or more than [`MAX_PARAMS`] values are
//! tracked as a single opaque style - their exact close effect is not locally
//! decidable - and are never re-emitted in the post-cut position.

use smallvec::SmallVec;

use crate::unit::{push_bytes, CodeUnit};

/// Parameter-count cap. ECMA-48 specifies 16 parameters and xterm accepts
/// around 30; anything past 32 is corrupt or adversarial.
pub(crate) const MAX_PARAMS: usize = 32;

/// Parsed SGR parameter list.
#[derive(Debug, Default)]
pub(crate) struct SgrParams {
    pub values: SmallVec<[u16; 8]>,
    pub overflow: bool,
    pub has_colon: bool,
}

impl SgrParams {
    /// Whether the sequence must be treated as opaque.
    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.overflow || self.has_colon
    }
}

/// Parse decimal parameters from the interior of an SGR sequence
/// (`units[range]`, introducer and final byte excluded).
pub(crate) fn parse_params<U: CodeUnit>(units: &[U], from: usize, to: usize) -> SgrParams {
    let mut out = SgrParams::default();
    let mut current: u32 = 0;
    let mut has_digit = false;

    for unit in &units[from..to] {
        let c = unit.value();
        if (0x30..=0x39).contains(&c) {
            // Clamp so pathological digit runs cannot overflow; every code
            // the tracker distinguishes is below 256.
            if current < 100_000 {
                current = current * 10 + (c - 0x30);
            }
            has_digit = true;
        } else if c == u32::from(b';') || c == u32::from(b':') {
            if c == u32::from(b':') {
                out.has_colon = true;
            }
            if out.values.len() >= MAX_PARAMS {
                out.overflow = true;
                return out;
            }
            out.values
                .push(if has_digit { current.min(65_535) as u16 } else { 0 });
            current = 0;
            has_digit = false;
        } else {
            break;
        }
    }
    if has_digit || out.values.is_empty() {
        if out.values.len() >= MAX_PARAMS {
            out.overflow = true;
            return out;
        }
        out.values.push(current.min(65_535) as u16);
    }
    out
}

/// SGR code that cancels `open`, or 0 when unknown (callers fall back to the
/// full reset `ESC [ 0 m`).
#[must_use]
pub(crate) const fn sgr_close_code(open: u16) -> u16 {
    match open {
        1 | 2 => 22,
        3 => 23,
        4 => 24,
        5 | 6 => 25,
        7 => 27,
        8 => 28,
        9 => 29,
        30..=38 | 90..=97 => 39,
        40..=48 | 100..=107 => 49,
        53 => 55,
        _ => 0,
    }
}

/// Whether `code` cancels styles rather than starting one.
#[must_use]
pub(crate) const fn is_sgr_end_code(code: u16) -> bool {
    matches!(code, 0 | 22 | 23 | 24 | 25 | 27 | 28 | 29 | 39 | 49 | 55)
}

/// Short owned byte sequence: a rebuilt SGR open like `ESC [ 3 8 ; 5 ; 1 9 6 m`.
type SeqBytes = SmallVec<[u8; 16]>;

fn push_decimal(buf: &mut SeqBytes, n: u16) {
    let mut digits = [0u8; 5];
    let mut i = digits.len();
    let mut n = n;
    loop {
        i -= 1;
        digits[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    buf.extend_from_slice(&digits[i..]);
}

/// Build `ESC [ a ; b ; ... m` (or the C1 form) from parameter values.
fn make_sgr_seq(c1: bool, codes: &[u16]) -> SeqBytes {
    let mut buf = SeqBytes::new();
    if c1 {
        buf.push(0x9B);
    } else {
        buf.extend_from_slice(b"\x1b[");
    }
    for (i, &code) in codes.iter().enumerate() {
        if i > 0 {
            buf.push(b';');
        }
        push_decimal(&mut buf, code);
    }
    buf.push(b'm');
    buf
}

#[derive(Debug)]
struct StyleEntry {
    open: SeqBytes,
    /// Close code; 0 means "cancel with full reset".
    close: u16,
}

/// Ordered set of active SGR styles, at most one entry per close code.
#[derive(Debug, Default)]
pub(crate) struct StyleTracker {
    entries: SmallVec<[StyleEntry; 4]>,
}

impl StyleTracker {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn has_close(&self, code: u16) -> bool {
        self.entries.iter().any(|e| e.close == code)
    }

    fn start(&mut self, open: SeqBytes, close: u16) {
        self.entries.retain(|e| e.close != close);
        self.entries.push(StyleEntry { open, close });
    }

    fn end(&mut self, close: u16) {
        self.entries.retain(|e| e.close != close);
    }

    /// Apply one SGR sequence (`units[from..to]`, terminator included) to the
    /// active set, decomposing multi-parameter sequences.
    pub fn apply<U: CodeUnit>(&mut self, units: &[U], from: usize, to: usize) {
        let c1 = units[from].value() == 0x9B;
        let param_from = if c1 { from + 1 } else { from + 2 };
        let param_to = to - 1; // final 'm'
        let params = parse_params(units, param_from, param_to);

        if params.is_opaque() {
            // Whole sequence tracked as one style with a best-guess close.
            let first = params.values.first().copied().unwrap_or(0);
            let close = sgr_close_code(first);
            let mut open = SeqBytes::new();
            open.extend((from..to).map(|i| units[i].value() as u8));
            self.start(open, close);
            return;
        }

        let values = &params.values;
        let mut i = 0;
        while i < values.len() {
            let code = values[i];

            if code == 0 {
                self.entries.clear();
                i += 1;
                continue;
            }

            // Extended foreground (38) / background (48) color.
            if code == 38 || code == 48 {
                let close = if code == 38 { 39 } else { 49 };
                if i + 1 < values.len() {
                    let color_type = values[i + 1];
                    if color_type == 5 && i + 2 < values.len() {
                        let seq = [code, 5, values[i + 2]];
                        self.start(make_sgr_seq(c1, &seq), close);
                        i += 3;
                        continue;
                    }
                    if color_type == 2 && i + 4 < values.len() {
                        let seq = [code, 2, values[i + 2], values[i + 3], values[i + 4]];
                        self.start(make_sgr_seq(c1, &seq), close);
                        i += 5;
                        continue;
                    }
                }
                self.start(make_sgr_seq(c1, &[code]), close);
                i += 1;
                continue;
            }

            if is_sgr_end_code(code) {
                self.end(code);
                i += 1;
                continue;
            }

            let close = sgr_close_code(code);
            self.start(make_sgr_seq(c1, &[code]), close);
            i += 1;
        }
    }

    /// Replay every active open sequence in insertion order.
    pub fn emit_opens<U: CodeUnit>(&self, out: &mut Vec<U>) {
        for entry in &self.entries {
            push_bytes(out, &entry.open);
        }
    }

    /// Synthesize closes in reverse insertion order, 7-bit flavor.
    pub fn emit_closes<U: CodeUnit>(&self, out: &mut Vec<U>) {
        for entry in self.entries.iter().rev() {
            if entry.close == 0 {
                push_bytes(out, b"\x1b[0m");
            } else {
                push_bytes(out, &make_sgr_seq(false, &[entry.close]));
            }
        }
    }

    /// Whether a sequence with these parameters is pure closing effect
    /// against the current active set: every parameter either resets (with
    /// styles active) or cancels an actually-active style, and none starts
    /// one. Such sequences are the only SGR allowed past the slice end.
    pub fn close_only(&self, params: &SgrParams) -> bool {
        let values = &params.values;
        let mut has_start = false;
        let mut has_closing_effect = false;

        let mut i = 0;
        while i < values.len() {
            let code = values[i];

            if code == 0 {
                if !self.is_empty() {
                    has_closing_effect = true;
                }
                i += 1;
                continue;
            }

            if is_sgr_end_code(code) {
                if self.has_close(code) {
                    has_closing_effect = true;
                }
                i += 1;
                continue;
            }

            if code == 38 || code == 48 {
                has_start = true;
                if i + 1 < values.len() {
                    let color_type = values[i + 1];
                    if color_type == 5 && i + 2 < values.len() {
                        i += 3;
                        continue;
                    }
                    if color_type == 2 && i + 4 < values.len() {
                        i += 5;
                        continue;
                    }
                }
                i += 1;
                continue;
            }

            has_start = true;
            i += 1;
        }

        has_closing_effect && !has_start
    }
}
