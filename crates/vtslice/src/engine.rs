#![forbid(unsafe_code)]

//! Single-pass streaming slice engine.
//!
//! One walk of the input drives three machines in lockstep: the ANSI
//! tokenizer, the grapheme accumulator, and the visible-column bookkeeping
//! that decides inclusion. `position` always names the column where the
//! currently-accumulating cluster begins - it only advances at cluster
//! boundaries, so every comparison against `start`/`end` happens against a
//! stable column number.
//!
//! A cluster's bytes are not committed until its boundary is known: a
//! cluster is emitted only when it fits entirely inside the window, so a
//! wide character straddling `end` is dropped rather than leaking an extra
//! column. ANSI between a cluster's codepoints rides along inside the
//! emitted span; ANSI between clusters sits in a small pending buffer until
//! the next boundary decides whether it is replayed verbatim or filtered
//! down to its closing effect.
//!
//! When the end of the slice is not knowable up front (non-negative indices,
//! finite `end`, ellipsis requested), content in the last `ellipsis_width`
//! columns is routed to a speculative zone: reaching input past the zone
//! confirms the cut (drop zone, emit ellipsis), while EOF inside it flushes
//! the zone verbatim and cancels the ellipsis.

use smallvec::SmallVec;
use tracing::trace;
use vtslice_unicode::GraphemeBreaker;

use crate::cluster::GraphemeState;
use crate::scan::is_escape_value;
use crate::sgr::{parse_params, StyleTracker};
use crate::token::{self, HyperlinkToken, Token, TokenKind};
use crate::unit::{push_bytes, CodeUnit};

const CR: u32 = 0x0D;
const LF: u32 = 0x0A;

/// Slice result: either "reuse the input verbatim" or an owned buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Sliced<U> {
    Identity,
    Text(Vec<U>),
}

/// One slice invocation, bounds still in double space.
pub(crate) struct Request<'a, U: CodeUnit> {
    pub input: &'a [U],
    pub start: f64,
    pub end: f64,
    pub ellipsis: &'a [U],
    pub ellipsis_width: usize,
    pub ambiguous_is_narrow: bool,
}

/// Resolved column bounds, clamped in double space so negative indices and
/// out-of-range values cannot misbehave when cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    start: usize,
    end: usize,
    cut_start: bool,
    cut_end: bool,
    empty: bool,
}

fn resolve_bounds(start_d: f64, end_d: f64, total_w: usize) -> Bounds {
    let total = total_w as f64;
    let mut from = if start_d < 0.0 { total + start_d } else { start_d };
    let mut to = if end_d < 0.0 { total + end_d } else { end_d };
    if from < 0.0 {
        from = 0.0;
    }
    if to > total {
        to = total;
    }
    // `!(to > from)` also catches NaN.
    if !(to > from) {
        return Bounds {
            start: 0,
            end: 0,
            cut_start: false,
            cut_end: false,
            empty: true,
        };
    }
    let start = from as usize;
    let end = to as usize;
    Bounds {
        start,
        end,
        cut_start: start > 0,
        cut_end: end < total_w,
        empty: false,
    }
}

/// Total visible width of `input` in columns, skipping ANSI sequences.
/// Used for negative-index resolution and ellipsis measurement only; the
/// non-negative emit walk never needs it.
pub(crate) fn total_width<U: CodeUnit>(
    input: &[U],
    ascii_prefix: usize,
    ambiguous_is_narrow: bool,
) -> usize {
    // The codepoint at `ascii_prefix` might join the last ASCII character,
    // so that character's column is withheld until its cluster finalizes.
    let mut total = ascii_prefix.saturating_sub(1);
    let mut has_prev = false;
    let mut gs = GraphemeState::default();
    let mut breaker = GraphemeBreaker::new();
    if ascii_prefix > 0 {
        let seed = input[ascii_prefix - 1].value();
        has_prev = true;
        gs.reset(seed, ambiguous_is_narrow);
        breaker.restart(char::from_u32(seed).unwrap_or('\u{FFFD}'));
    }

    let mut p = ascii_prefix;
    while p < input.len() {
        if is_escape_value(input[p].value()) {
            if let Some(tok) = token::try_parse(input, p) {
                p = tok.end;
                continue;
            }
        }
        let (cp, n) = U::decode(input, p);
        let prev = gs.last_cp();
        let ch = char::from_u32(cp).unwrap_or('\u{FFFD}');
        let should_break = if !has_prev {
            breaker.restart(ch);
            true
        } else if prev == CR && cp == LF {
            false
        } else if prev == CR || prev == LF || cp == CR || cp == LF {
            breaker.restart(ch);
            true
        } else {
            breaker.advance(ch)
        };
        if should_break {
            if has_prev {
                total += gs.width();
            }
            gs.reset(cp, ambiguous_is_narrow);
        } else {
            gs.add(cp, ambiguous_is_narrow);
        }
        has_prev = true;
        p += n;
    }
    if has_prev {
        total += gs.width();
    }
    total
}

/// Slice `req.input` to the visible-column window `[start, end)`.
pub(crate) fn slice_units<U: CodeUnit>(req: &Request<'_, U>) -> Sliced<U> {
    let input = req.input;
    let len = input.len();
    if len == 0 {
        return Sliced::Text(Vec::new());
    }

    // No-op: slice(s) / slice(s, 0) / slice(s, 0, inf) without ellipsis.
    if req.start == 0.0 && req.end.is_infinite() && req.end > 0.0 && req.ellipsis_width == 0 {
        trace!("identity fast path");
        return Sliced::Identity;
    }

    // Printable-ASCII prefix: byte positions equal column positions there.
    // The scan is capped at the requested range (plus slop for the reserved
    // character and one potential joiner) so a tiny slice of a huge string
    // stays O(slice-length). Negative or unbounded ranges scan everything -
    // the width pre-pass needs the full prefix anyway.
    let prefix_scan_len = if req.start >= 0.0 && req.end >= 0.0 && req.end.is_finite() {
        let cap = req.end + 2.0;
        if cap < len as f64 {
            cap as usize
        } else {
            len
        }
    } else {
        len
    };
    let ascii_prefix = U::ascii_printable_prefix(&input[..prefix_scan_len]);

    let whole_ascii = prefix_scan_len == len && ascii_prefix == len;
    // Strict `<`: the unit at `ascii_prefix` might be a combining mark that
    // joins the last prefix character.
    let slice_inside =
        req.start >= 0.0 && req.end >= 0.0 && req.end < ascii_prefix as f64;
    if whole_ascii || slice_inside {
        trace!(ascii_prefix, "ascii fast path");
        return ascii_fast_path(req, ascii_prefix, whole_ascii);
    }

    let (start, end, cut_end_known, cut_end_hint) = if req.start >= 0.0 && !(req.end < 0.0) {
        // Non-negative indices: no pre-pass; the cut is detected lazily.
        // Any start past twice the unit count is past any possible width.
        if !req.start.is_finite() || req.start > len as f64 * 2.0 {
            return Sliced::Text(Vec::new());
        }
        let start = req.start as usize;
        if !req.end.is_finite() || req.end > len as f64 * 2.0 {
            (start, usize::MAX, true, false)
        } else {
            let end = req.end as usize;
            if end <= start {
                return Sliced::Text(Vec::new());
            }
            (start, end, false, false)
        }
    } else {
        // Negative index: one width pre-pass, then the same emit walk.
        let total_w = total_width(input, ascii_prefix, req.ambiguous_is_narrow);
        let b = resolve_bounds(req.start, req.end, total_w);
        if b.empty {
            return Sliced::Text(Vec::new());
        }
        (b.start, b.end, true, b.cut_end)
    };

    trace!(start, end, "streaming walk");
    run_walk(req, ascii_prefix, start, end, cut_end_known, cut_end_hint)
}

fn ascii_fast_path<U: CodeUnit>(
    req: &Request<'_, U>,
    ascii_prefix: usize,
    whole_ascii: bool,
) -> Sliced<U> {
    let input = req.input;
    let total_w = if whole_ascii { input.len() } else { ascii_prefix };
    let b = resolve_bounds(req.start, req.end, total_w);
    if b.empty {
        return Sliced::Text(Vec::new());
    }
    // When only a prefix was proven ASCII, the slice ends inside it but the
    // string continues: the end is always a cut.
    let cut_end = if whole_ascii { b.cut_end } else { true };
    if !b.cut_start && !cut_end {
        return Sliced::Identity;
    }

    let (mut st, mut en) = (b.start, b.end);
    if req.ellipsis_width > 0 {
        let do_start = b.cut_start && req.ellipsis_width < en - st;
        if do_start {
            st += req.ellipsis_width;
        }
        let do_end = cut_end && req.ellipsis_width < en - st;
        if do_end {
            en -= req.ellipsis_width;
        }
        if !do_start && !do_end {
            return Sliced::Text(req.ellipsis.to_vec());
        }
        let mut out = Vec::with_capacity(en - st + 2 * req.ellipsis.len());
        if do_start {
            out.extend_from_slice(req.ellipsis);
        }
        out.extend_from_slice(&input[st..en]);
        if do_end {
            out.extend_from_slice(req.ellipsis);
        }
        return Sliced::Text(out);
    }
    Sliced::Text(input[st..en].to_vec())
}

/// ANSI sequence held between a visible codepoint and the next boundary
/// decision.
#[derive(Debug, Clone, Copy)]
struct Pending {
    from: usize,
    to: usize,
    kind: TokenKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushMode {
    /// Between clusters, inside the window: apply state and emit verbatim.
    Emit,
    /// Inside a cluster span: apply state only, the bytes ride along.
    Absorb,
    /// Past the cut: emit only sequences with pure closing effect.
    CloseFilter,
}

#[derive(Debug, Clone, Copy)]
struct ActiveHyperlink {
    from: usize,
    to: usize,
    link: HyperlinkToken,
}

fn run_walk<U: CodeUnit>(
    req: &Request<'_, U>,
    ascii_prefix: usize,
    start0: usize,
    end0: usize,
    cut_end_known: bool,
    cut_end_hint: bool,
) -> Sliced<U> {
    let mut start = start0;
    let mut end = end0;
    let end_unbounded = end == usize::MAX;
    let cut_start_for_ellipsis = start > 0;

    let mut need_start_ellipsis = false;
    let mut need_end_ellipsis = false;
    let mut ellipsis_end_budget = 0usize;
    let ew = req.ellipsis_width;
    if ew > 0 {
        let span = if end_unbounded {
            usize::MAX - start
        } else {
            end - start
        };
        if cut_start_for_ellipsis && ew < span {
            need_start_ellipsis = true;
            start += ew;
        }
        if cut_end_known && cut_end_hint && ew < end - start {
            need_end_ellipsis = true;
            end -= ew;
        } else if !cut_end_known && !end_unbounded && ew < end - start {
            // Lazy cut: budget the ellipsis speculatively; the zone below
            // resolves it at EOF or at the first column past the zone.
            need_end_ellipsis = true;
            ellipsis_end_budget = ew;
            end -= ew;
        }
        if cut_end_known
            && (cut_start_for_ellipsis || cut_end_hint)
            && !need_start_ellipsis
            && !need_end_ellipsis
        {
            // Degenerate: the range is too small for any content.
            return Sliced::Text(req.ellipsis.to_vec());
        }
    }
    let spec_end = if ellipsis_end_budget > 0 {
        end + ellipsis_end_budget
    } else {
        end
    };

    // Fast-forward through the proven-ASCII prefix: one column per unit, no
    // ANSI, every unit a boundary. Stop one short so the last prefix
    // character seeds the grapheme state (the next codepoint may join it),
    // and never jump past `start` (the window entry needs the style replay).
    let ff_to = start.min(ascii_prefix.saturating_sub(1));

    let walker = Walker {
        input: req.input,
        ellipsis: req.ellipsis,
        ambiguous_is_narrow: req.ambiguous_is_narrow,
        p: ff_to,
        position: ff_to,
        include: false,
        has_prev: false,
        cluster_from: ff_to,
        cluster_to: ff_to,
        gs: GraphemeState::default(),
        breaker: GraphemeBreaker::new(),
        styles: StyleTracker::default(),
        hyperlink: None,
        pending: SmallVec::new(),
        out: Vec::with_capacity(req.input.len().min(4096)),
        spec_zone: Vec::new(),
        in_spec_zone: false,
        start,
        end,
        end_unbounded,
        spec_end,
        need_start_ellipsis,
        need_end_ellipsis,
        ellipsis_end_budget,
        saw_cut_end: false,
    };
    walker.run()
}

struct Walker<'a, U: CodeUnit> {
    input: &'a [U],
    ellipsis: &'a [U],
    ambiguous_is_narrow: bool,

    /// Cursor into `input`, in units.
    p: usize,
    /// Column where the currently-accumulating cluster begins.
    position: usize,
    include: bool,
    has_prev: bool,
    /// Unit span of the currently-accumulating cluster (ANSI between its
    /// codepoints included).
    cluster_from: usize,
    cluster_to: usize,
    gs: GraphemeState,
    breaker: GraphemeBreaker,
    styles: StyleTracker,
    hyperlink: Option<ActiveHyperlink>,
    pending: SmallVec<[Pending; 4]>,
    out: Vec<U>,
    spec_zone: Vec<U>,
    in_spec_zone: bool,

    start: usize,
    end: usize,
    end_unbounded: bool,
    /// `end` plus the speculative ellipsis budget (equal to `end` without one).
    spec_end: usize,
    need_start_ellipsis: bool,
    need_end_ellipsis: bool,
    ellipsis_end_budget: usize,
    saw_cut_end: bool,
}

impl<U: CodeUnit> Walker<'_, U> {
    fn run(mut self) -> Sliced<U> {
        let len = self.input.len();
        'walk: while self.p < len {
            // Bound every scan to the remaining column budget; without this
            // a short slice of a megabyte of trailing text would scan it all.
            let scan_to = self.scan_horizon();
            let next_esc = U::find_escape(&self.input[self.p..scan_to]).map(|i| self.p + i);
            let run_end = next_esc.unwrap_or(scan_to);

            if !self.bulk_ascii(run_end) {
                break 'walk;
            }

            while self.p < run_end {
                let (cp, n) = U::decode(self.input, self.p);
                if !self.visible_cp(cp, n) {
                    break 'walk;
                }
            }

            if self.p >= len {
                break;
            }

            // Either a unit the escape scan matched or the unexamined unit at
            // the horizon; both are verified here.
            if is_escape_value(self.input[self.p].value()) {
                if let Some(tok) = token::try_parse(self.input, self.p) {
                    self.take_token(tok);
                    continue;
                }
            }
            let (cp, n) = U::decode(self.input, self.p);
            if !self.visible_cp(cp, n) {
                break 'walk;
            }
        }
        self.finish()
    }

    fn scan_horizon(&self) -> usize {
        if self.end_unbounded {
            return self.input.len();
        }
        let remaining = self.spec_end.saturating_sub(self.position);
        let budget = remaining.saturating_mul(2).saturating_add(4);
        self.p.saturating_add(budget).min(self.input.len())
    }

    /// Bulk-process all but the last character of the printable-ASCII prefix
    /// of `[p, run_end)`: each is a width-1 cluster, so start-reach, window
    /// entry, and zone partitioning reduce to arithmetic. The last character
    /// is left for [`Self::visible_cp`] so the grapheme state is seeded in
    /// case the following codepoint joins it. Returns `false` on cut.
    fn bulk_ascii(&mut self, run_end: usize) -> bool {
        let ascii_len = U::ascii_printable_prefix(&self.input[self.p..run_end]);
        let mut bulk_n = ascii_len.saturating_sub(1);
        if bulk_n == 0 {
            return true;
        }

        // The first bulk character is a boundary: settle the open cluster.
        if self.has_prev {
            if !self.finalize_cluster() {
                return false;
            }
            if !self.end_unbounded && self.position >= self.spec_end {
                self.saw_cut_end = true;
                self.flush_pending(FlushMode::CloseFilter);
                return false;
            }
        }

        if !self.include && self.position < self.start {
            let skip = (self.start - self.position).min(bulk_n);
            self.p += skip;
            self.position += skip;
            bulk_n -= skip;
        }
        if bulk_n > 0 && !self.include && self.position >= self.start {
            self.enter_window();
        }
        if bulk_n > 0 && self.include {
            self.flush_pending(FlushMode::Emit);
            let emit_n = if self.end_unbounded {
                bulk_n
            } else {
                self.spec_end.saturating_sub(self.position).min(bulk_n)
            };
            if emit_n > 0 {
                if self.ellipsis_end_budget > 0 && !self.end_unbounded && self.position < self.end
                {
                    // Split the run at the main/zone boundary.
                    let to_main = (self.end - self.position).min(emit_n);
                    self.out
                        .extend_from_slice(&self.input[self.p..self.p + to_main]);
                    if emit_n > to_main {
                        self.in_spec_zone = true;
                        self.spec_zone
                            .extend_from_slice(&self.input[self.p + to_main..self.p + emit_n]);
                    }
                } else if self.in_spec_zone || (!self.end_unbounded && self.position >= self.end) {
                    self.in_spec_zone = true;
                    self.spec_zone
                        .extend_from_slice(&self.input[self.p..self.p + emit_n]);
                } else {
                    self.out
                        .extend_from_slice(&self.input[self.p..self.p + emit_n]);
                }
                self.p += emit_n;
                self.position += emit_n;
                bulk_n -= emit_n;
            }
            if !self.end_unbounded && self.position >= self.spec_end {
                self.saw_cut_end = true;
                return false;
            }
        }
        // Whatever remains was pre-window; skip it.
        self.p += bulk_n;
        self.position += bulk_n;
        true
    }

    /// Process one visible codepoint. Returns `false` when the walk is done
    /// (cut detected past `spec_end`).
    fn visible_cp(&mut self, cp: u32, n: usize) -> bool {
        let prev = self.gs.last_cp();
        let ch = char::from_u32(cp).unwrap_or('\u{FFFD}');
        let should_break = if !self.has_prev {
            self.breaker.restart(ch);
            true
        } else if prev == CR && cp == LF {
            false
        } else if prev == CR || prev == LF || cp == CR || cp == LF {
            self.breaker.restart(ch);
            true
        } else {
            self.breaker.advance(ch)
        };

        if should_break {
            if self.has_prev && !self.finalize_cluster() {
                return false;
            }
            if !self.end_unbounded && self.position >= self.spec_end {
                self.saw_cut_end = true;
                self.flush_pending(FlushMode::CloseFilter);
                return false;
            }
            if !self.include && self.position >= self.start {
                self.enter_window();
            }
            if self.include {
                self.flush_pending(FlushMode::Emit);
            } else {
                self.pending.clear();
            }
            self.cluster_from = self.p;
            self.cluster_to = self.p + n;
            self.gs.reset(cp, self.ambiguous_is_narrow);
        } else {
            if self.include {
                self.flush_pending(FlushMode::Absorb);
            } else {
                self.pending.clear();
            }
            self.cluster_to = self.p + n;
            self.gs.add(cp, self.ambiguous_is_narrow);
        }
        self.has_prev = true;
        self.p += n;
        true
    }

    /// Commit the accumulated cluster now that its width is known: emit it
    /// if it fits the window entirely, or declare the cut if it overflows.
    /// Advances `position` either way. Returns `false` on cut.
    fn finalize_cluster(&mut self) -> bool {
        let w = self.gs.width();
        if self.include {
            if !self.end_unbounded && self.position + w > self.spec_end {
                self.saw_cut_end = true;
                self.flush_pending(FlushMode::CloseFilter);
                self.has_prev = false;
                return false;
            }
            // Anything extending past the content budget `end` is zone
            // material: discarded on a confirmed cut, flushed on unwind.
            let to_zone = self.ellipsis_end_budget > 0
                && !self.end_unbounded
                && self.position + w > self.end;
            if to_zone {
                self.in_spec_zone = true;
                self.spec_zone
                    .extend_from_slice(&self.input[self.cluster_from..self.cluster_to]);
            } else {
                self.out
                    .extend_from_slice(&self.input[self.cluster_from..self.cluster_to]);
            }
        }
        self.position += w;
        self.has_prev = false;
        true
    }

    /// First column at or past `start`: replay context so the output renders
    /// like the original region. Order: style opens, start ellipsis, then
    /// the active hyperlink's full open sequence.
    fn enter_window(&mut self) {
        self.include = true;
        self.styles.emit_opens(&mut self.out);
        if self.need_start_ellipsis {
            self.out.extend_from_slice(self.ellipsis);
        }
        if let Some(h) = self.hyperlink {
            self.out.extend_from_slice(&self.input[h.from..h.to]);
        }
    }

    fn take_token(&mut self, tok: Token) {
        if !self.include {
            // Before the window, sequences update context immediately;
            // opaque controls are dropped.
            match tok.kind {
                TokenKind::Sgr => self.styles.apply(self.input, self.p, tok.end),
                TokenKind::Hyperlink(h) => {
                    self.hyperlink = h.is_open.then_some(ActiveHyperlink {
                        from: self.p,
                        to: tok.end,
                        link: h,
                    });
                }
                TokenKind::Control => {}
            }
        } else {
            self.pending.push(Pending {
                from: self.p,
                to: tok.end,
                kind: tok.kind,
            });
        }
        self.p = tok.end;
    }

    fn flush_pending(&mut self, mode: FlushMode) {
        if self.pending.is_empty() {
            return;
        }
        let pending = core::mem::take(&mut self.pending);
        for pa in pending {
            match pa.kind {
                TokenKind::Sgr => {
                    if mode == FlushMode::CloseFilter {
                        let c1 = self.input[pa.from].value() == 0x9B;
                        let pfrom = if c1 { pa.from + 1 } else { pa.from + 2 };
                        let params = parse_params(self.input, pfrom, pa.to - 1);
                        // Opaque sequences have no locally-decidable close
                        // effect; they never cross the cut.
                        if params.is_opaque() || !self.styles.close_only(&params) {
                            continue;
                        }
                    }
                    self.styles.apply(self.input, pa.from, pa.to);
                    if mode != FlushMode::Absorb {
                        self.out.extend_from_slice(&self.input[pa.from..pa.to]);
                    }
                }
                TokenKind::Hyperlink(h) => {
                    if mode == FlushMode::CloseFilter && (h.is_open || self.hyperlink.is_none()) {
                        continue;
                    }
                    self.hyperlink = h.is_open.then_some(ActiveHyperlink {
                        from: pa.from,
                        to: pa.to,
                        link: h,
                    });
                    if mode != FlushMode::Absorb {
                        self.out.extend_from_slice(&self.input[pa.from..pa.to]);
                    }
                }
                TokenKind::Control => {
                    if mode == FlushMode::Emit {
                        self.out.extend_from_slice(&self.input[pa.from..pa.to]);
                    }
                }
            }
        }
    }

    fn finish(mut self) -> Sliced<U> {
        if !self.saw_cut_end {
            if self.has_prev {
                // May detect an overflow cut at EOF; flushes filtered then.
                let _ = self.finalize_cluster();
            }
            if !self.saw_cut_end && self.include {
                let trailing_past_end = !self.end_unbounded && self.position >= self.spec_end;
                self.flush_pending(if trailing_past_end {
                    FlushMode::CloseFilter
                } else {
                    FlushMode::Emit
                });
            }
        }

        if !self.include {
            return Sliced::Text(Vec::new());
        }

        // Resolve the speculative zone: a confirmed cut discards it and
        // keeps the ellipsis; EOF without one flushes it verbatim.
        if self.ellipsis_end_budget > 0 && !self.saw_cut_end {
            let zone = core::mem::take(&mut self.spec_zone);
            self.out.extend_from_slice(&zone);
            self.need_end_ellipsis = false;
        }

        if let Some(h) = self.hyperlink.take() {
            push_bytes(&mut self.out, h.link.close_prefix());
            push_bytes(&mut self.out, h.link.terminator.bytes());
        }
        if self.need_end_ellipsis {
            self.out.extend_from_slice(self.ellipsis);
        }
        let styles = core::mem::take(&mut self.styles);
        styles.emit_closes(&mut self.out);
        Sliced::Text(self.out)
    }
}
