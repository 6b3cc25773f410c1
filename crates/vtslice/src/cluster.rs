#![forbid(unsafe_code)]

//! Grapheme-cluster width accumulation.
//!
//! Codepoints are fed one at a time as the walk decodes them; once the next
//! boundary is known, [`GraphemeState::width`] reports how many terminal
//! columns the finished cluster occupies. The rules mirror how terminals
//! actually render compound emoji: paired regional indicators and keycap
//! sequences are two columns, an emoji base extended by a skin tone or ZWJ
//! joiner is two, variation selectors force the presentation they select, and
//! everything else falls back to the summed per-codepoint width.

use bitflags::bitflags;
use vtslice_unicode::{codepoint_width, is_emoji_presentation};

/// Accumulated non-emoji width saturates here; clusters cannot panic no
/// matter how many codepoints join.
const MAX_NON_EMOJI_WIDTH: u16 = 1023;

/// Codepoint count saturates here.
const MAX_COUNT: u8 = 255;

bitflags! {
    /// Cluster composition facts that decide the width rules.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct ClusterFlags: u8 {
        /// First codepoint has default emoji presentation.
        const EMOJI_BASE         = 1 << 0;
        /// Contains U+20E3 COMBINING ENCLOSING KEYCAP.
        const KEYCAP             = 1 << 1;
        /// Contains a regional indicator (U+1F1E6..=U+1F1FF).
        const REGIONAL_INDICATOR = 1 << 2;
        /// Contains a skin-tone modifier (U+1F3FB..=U+1F3FF).
        const SKIN_TONE          = 1 << 3;
        /// Contains U+200D ZERO WIDTH JOINER.
        const ZWJ                = 1 << 4;
        /// Contains U+FE0E VARIATION SELECTOR-15 (text presentation).
        const VS15               = 1 << 5;
        /// Contains U+FE0F VARIATION SELECTOR-16 (emoji presentation).
        const VS16               = 1 << 6;
    }
}

fn flags_for(cp: u32) -> ClusterFlags {
    let mut f = ClusterFlags::empty();
    if cp == 0x20E3 {
        f |= ClusterFlags::KEYCAP;
    }
    if (0x1F1E6..=0x1F1FF).contains(&cp) {
        f |= ClusterFlags::REGIONAL_INDICATOR;
    }
    if (0x1F3FB..=0x1F3FF).contains(&cp) {
        f |= ClusterFlags::SKIN_TONE;
    }
    if cp == 0x200D {
        f |= ClusterFlags::ZWJ;
    }
    f
}

/// Width accumulator for the cluster currently being decoded.
#[derive(Debug, Default)]
pub(crate) struct GraphemeState {
    first_cp: u32,
    last_cp: u32,
    non_emoji_width: u16,
    base_width: u8,
    count: u8,
    flags: ClusterFlags,
}

impl GraphemeState {
    /// Begin a new cluster at `cp`.
    pub fn reset(&mut self, cp: u32, ambiguous_is_narrow: bool) {
        self.first_cp = cp;
        self.last_cp = cp;
        self.count = 1;
        self.flags = flags_for(cp);
        if is_emoji_presentation(cp) {
            self.flags |= ClusterFlags::EMOJI_BASE;
        }
        let w = codepoint_width(cp, ambiguous_is_narrow);
        self.base_width = w;
        self.non_emoji_width = u16::from(w);
    }

    /// Extend the cluster with a joining codepoint.
    pub fn add(&mut self, cp: u32, ambiguous_is_narrow: bool) {
        self.last_cp = cp;
        if self.count < MAX_COUNT {
            self.count += 1;
        }
        self.flags |= flags_for(cp);
        if cp == 0xFE0E {
            self.flags |= ClusterFlags::VS15;
        }
        if cp == 0xFE0F {
            self.flags |= ClusterFlags::VS16;
        }
        let w = codepoint_width(cp, ambiguous_is_narrow);
        if w > 0 {
            self.non_emoji_width = (self.non_emoji_width + u16::from(w)).min(MAX_NON_EMOJI_WIDTH);
        }
    }

    /// Columns the finished cluster occupies.
    pub fn width(&self) -> usize {
        if self.count == 0 {
            return 0;
        }
        let f = self.flags;
        if f.contains(ClusterFlags::REGIONAL_INDICATOR) && self.count >= 2 {
            return 2;
        }
        if f.contains(ClusterFlags::KEYCAP) {
            return 2;
        }
        if f.contains(ClusterFlags::REGIONAL_INDICATOR) {
            // Unpaired regional indicator.
            return 1;
        }
        if f.contains(ClusterFlags::EMOJI_BASE)
            && f.intersects(ClusterFlags::SKIN_TONE | ClusterFlags::ZWJ)
        {
            return 2;
        }
        if f.intersects(ClusterFlags::VS15 | ClusterFlags::VS16) {
            if self.base_width == 2 {
                return 2;
            }
            if f.contains(ClusterFlags::VS16) {
                // Digits, '#', '*' (keycap bases) and all other ASCII keep a
                // single column even under emoji presentation.
                if self.first_cp < 0x80 {
                    return 1;
                }
                return 2;
            }
            return 1;
        }
        // May legitimately be 0 (zero-width-only clusters such as U+200B).
        usize::from(self.non_emoji_width)
    }

    /// Last codepoint fed in (the break decision needs it).
    pub fn last_cp(&self) -> u32 {
        self.last_cp
    }
}
