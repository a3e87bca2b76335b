//! # Bar Timing Validation
//!
//! Checks that the notes of one bar add up to the bar length of the time
//! signature, and optionally pads short bars.
//!
//! ## Duration Rules
//! - Durations are measured in whole notes: `c4` is 0.25, `c8` is 0.125
//! - A token without a duration reuses the last explicit one in the bar
//!   (a quarter note before any is seen)
//! - Dots, tuplets and ties are not interpreted
//!
//! ## Partial Bars
//! A bar carrying `\partial N` (or `\partial N/M`) is a pickup. [`check_bar`]
//! trusts the declaration: the bar is always reported valid and never
//! modified. [`check_partial`] is the strict check that compares the declared
//! length against the notes.
//!
//! ## Fixing
//! Only short bars can be fixed, by appending one filler token whose
//! duration is `1 / missing` truncated to an integer. See [`FixMode`].
//!
//! ## Known Deviations
//! - Tokens with no letter or digit (`|`, `~`) take no time. A plain
//!   token-counting checker would charge them the carried duration, so
//!   `c4 d4 e4 |` is a full 3/4 bar here and not a full 4/4 one.
//! - A gap longer than a whole note truncates to a zero duration. Such a bar
//!   is left unchanged and reported invalid rather than padded with `s0`.
//!
//! ## Example
//! ```rust
//! use fourbar::{check_bar, FixMode};
//!
//! let result = check_bar("c4 d8 e8", 1.0, true, FixMode::Skip);
//! assert!(result.is_valid);
//! assert_eq!(result.bar, "c4 d8 e8 s4");
//! ```

use crate::error::FourbarError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::str::FromStr;

/// Duration assumed before any explicit duration is seen (quarter note).
pub const DEFAULT_DURATION: u32 = 4;

/// Two bar lengths closer than this are equal.
pub const BEAT_TOLERANCE: f64 = 1e-6;

static PARTIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\partial\s*(\d+/\d+|\d+)").unwrap());

/// How [`check_bar`] repairs a bar that is too short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixMode {
    /// Append an invisible skip (`s8`).
    #[default]
    Skip,
    /// Append a rest (`r8`).
    Rest,
    /// Not implemented: the bar is returned unchanged.
    Cut,
    /// Not implemented: the bar is returned unchanged.
    Split,
}

impl FromStr for FixMode {
    type Err = FourbarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(FixMode::Skip),
            "rest" => Ok(FixMode::Rest),
            "cut" => Ok(FixMode::Cut),
            "split" => Ok(FixMode::Split),
            other => Err(FourbarError::Config(format!("unknown fix mode: {}", other))),
        }
    }
}

/// Outcome of a bar check.
#[derive(Debug, Clone, PartialEq)]
pub struct BarCheck {
    pub is_valid: bool,
    /// Length of the bar in whole notes (after fixing, if a fix was applied).
    pub total_beats: f64,
    /// The bar text, with a filler token appended if it was fixed.
    pub bar: String,
}

/// First run of digits in a token, as a non-zero duration.
fn explicit_duration(token: &str) -> Option<u32> {
    let digits: String = token
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u32>().ok().filter(|d| *d > 0)
}

/// Sum the durations of whitespace-separated tokens, in whole notes.
///
/// Tokens with no letters or digits (`|`, `~`) take no time.
pub fn total_beats(bar: &str) -> f64 {
    bar.split_whitespace()
        .filter(|token| token.chars().any(|c| c.is_ascii_alphanumeric()))
        .fold((0.0, DEFAULT_DURATION), |(beats, current), token| {
            let duration = explicit_duration(token).unwrap_or(current);
            (beats + 1.0 / duration as f64, duration)
        })
        .0
}

fn beats_match(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < BEAT_TOLERANCE
}

/// Parse `N` (a 1/N note) or `N/M` into whole notes.
fn partial_length(text: &str) -> Option<f64> {
    match text.split_once('/') {
        Some((num, den)) => {
            let num: u32 = num.parse().ok()?;
            let den: u32 = den.parse().ok().filter(|d| *d > 0)?;
            Some(num as f64 / den as f64)
        }
        None => {
            let den: u32 = text.parse().ok().filter(|d| *d > 0)?;
            Some(1.0 / den as f64)
        }
    }
}

/// Split a partial bar into its declared length and the text of its notes.
fn split_partial(bar: &str) -> Option<(Option<f64>, String)> {
    let caps = PARTIAL.captures(bar)?;
    let marker = caps.get(0)?;
    let notes = format!("{} {}", &bar[..marker.start()], &bar[marker.end()..]);
    Some((partial_length(&caps[1]), notes))
}

/// Check one bar against `target_beats` (whole notes, e.g. 0.75 for 3/4).
///
/// Partial bars are always valid and returned unchanged. When `fix` is set,
/// a short bar gets a filler appended according to `mode`; a long bar is
/// never changed.
pub fn check_bar(bar: &str, target_beats: f64, fix: bool, mode: FixMode) -> BarCheck {
    if let Some((_, notes)) = split_partial(bar) {
        return BarCheck {
            is_valid: true,
            total_beats: total_beats(&notes),
            bar: bar.to_string(),
        };
    }

    let total = total_beats(bar);
    let unchanged = BarCheck {
        is_valid: beats_match(total, target_beats),
        total_beats: total,
        bar: bar.to_string(),
    };
    if unchanged.is_valid || !fix {
        return unchanged;
    }

    let filler = match mode {
        FixMode::Skip => 's',
        FixMode::Rest => 'r',
        FixMode::Cut | FixMode::Split => {
            log::debug!("{:?} fixing is not implemented, leaving bar: {}", mode, bar);
            return unchanged;
        }
    };

    let difference = target_beats - total;
    if difference <= 0.0 {
        return unchanged;
    }

    // Truncated, not rounded: a gap of 3/16 becomes a 5th-note filler.
    let duration = (1.0 / difference) as u32;
    if duration == 0 {
        log::warn!("bar is short by {} whole notes, too much for one filler: {}", difference, bar);
        return unchanged;
    }

    let fixed = if bar.trim().is_empty() {
        format!("{}{}", filler, duration)
    } else {
        format!("{} {}{}", bar.trim_end(), filler, duration)
    };
    log::debug!("padded bar: {} -> {}", bar, fixed);
    BarCheck {
        is_valid: true,
        total_beats: total + difference,
        bar: fixed,
    }
}

/// Strictly check a partial bar: declared length against the notes.
///
/// A bar without a `\partial` marker (or with a zero length) is reported
/// invalid with a total of zero.
pub fn check_partial(bar: &str) -> BarCheck {
    let (declared, notes) = match split_partial(bar) {
        Some((Some(declared), notes)) => (declared, notes),
        _ => {
            return BarCheck {
                is_valid: false,
                total_beats: 0.0,
                bar: bar.to_string(),
            }
        }
    };
    let total = total_beats(&notes);
    BarCheck {
        is_valid: beats_match(total, declared),
        total_beats: total,
        bar: bar.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_FOUR: f64 = 3.0 / 4.0;

    #[test]
    fn test_full_bar_is_valid() {
        let result = check_bar("c4 d4 e4 f4", 1.0, true, FixMode::Skip);
        assert_eq!(
            result,
            BarCheck {
                is_valid: true,
                total_beats: 1.0,
                bar: "c4 d4 e4 f4".to_string()
            }
        );
    }

    #[test]
    fn test_short_bar_gets_skip() {
        let result = check_bar("c4 d8 e8", 1.0, true, FixMode::Skip);
        assert!(result.is_valid);
        assert_eq!(result.total_beats, 1.0);
        assert_eq!(result.bar, "c4 d8 e8 s4");
    }

    #[test]
    fn test_short_bar_gets_rest() {
        let result = check_bar("ef4 c'8 b8 a", THREE_FOUR, true, FixMode::Rest);
        assert!(result.is_valid);
        assert_eq!(result.bar, "ef4 c'8 b8 a r8");
    }

    #[test]
    fn test_short_bar_without_fix() {
        let result = check_bar("c4 d8 e8", 1.0, false, FixMode::Skip);
        assert!(!result.is_valid);
        assert_eq!(result.total_beats, 0.75);
        assert_eq!(result.bar, "c4 d8 e8");
    }

    #[test]
    fn test_filler_duration_is_truncated() {
        // missing 3/16: 1 / 0.1875 = 5.33 -> 5
        let result = check_bar("c2 d8 e8 f16", 1.0, true, FixMode::Skip);
        assert!(result.is_valid);
        assert_eq!(result.bar, "c2 d8 e8 f16 s5");
    }

    #[test]
    fn test_inherited_durations() {
        // b4 c8 d e4 = 0.25 + 0.125 + 0.125 + 0.25
        let result = check_bar("b4 c8 d e4", THREE_FOUR, false, FixMode::Skip);
        assert!(result.is_valid);
        assert_eq!(total_beats("c d e f"), 1.0);
        assert_eq!(total_beats("c8 d e f"), 0.5);
    }

    #[test]
    fn test_barline_tokens_take_no_time() {
        assert_eq!(total_beats("c4 d4 | e4 f4"), 1.0);
        assert_eq!(total_beats("c2 ~ c2"), 1.0);
    }

    #[test]
    fn test_long_bar_is_never_fixed() {
        for mode in [FixMode::Skip, FixMode::Rest, FixMode::Cut, FixMode::Split] {
            let result = check_bar("c4 e4 g4 c'4", THREE_FOUR, true, mode);
            assert!(!result.is_valid);
            assert_eq!(result.total_beats, 1.0);
            assert_eq!(result.bar, "c4 e4 g4 c'4");
        }
    }

    #[test]
    fn test_cut_and_split_leave_short_bar() {
        for mode in [FixMode::Cut, FixMode::Split] {
            let result = check_bar("c4 d4", 1.0, true, mode);
            assert!(!result.is_valid);
            assert_eq!(result.bar, "c4 d4");
        }
    }

    #[test]
    fn test_gap_longer_than_whole_note_is_left() {
        let result = check_bar("c4", 1.5, true, FixMode::Skip);
        assert!(!result.is_valid);
        assert_eq!(result.bar, "c4");
    }

    #[test]
    fn test_tolerance_boundary() {
        assert!(check_bar("c4 d4 e4 f4", 1.0 + 1e-7, false, FixMode::Skip).is_valid);
        assert!(check_bar("c4 d4 e4 f4", 1.0 - 1e-7, false, FixMode::Skip).is_valid);
        assert!(!check_bar("c4 d4 e4 f4", 1.0 + 1e-5, false, FixMode::Skip).is_valid);
        assert!(!check_bar("c4 d4 e4 f4", 1.0 - 1e-5, false, FixMode::Skip).is_valid);
    }

    #[test]
    fn test_check_is_idempotent_on_valid_bar() {
        let first = check_bar("c8 d8 e4 f2", 1.0, true, FixMode::Skip);
        let second = check_bar(&first.bar, 1.0, true, FixMode::Skip);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fixed_bar_checks_valid_again() {
        let fixed = check_bar("c4 d8 e8", 1.0, true, FixMode::Skip);
        let again = check_bar(&fixed.bar, 1.0, true, FixMode::Skip);
        assert!(again.is_valid);
        assert_eq!(again.bar, fixed.bar);
    }

    #[test]
    fn test_partial_bar_is_trusted() {
        let bar = r"\partial 4 c8 d8 e8";
        let result = check_bar(bar, 1.0, true, FixMode::Skip);
        assert!(result.is_valid);
        assert_eq!(result.total_beats, 0.375);
        assert_eq!(result.bar, bar);

        let strict = check_partial(bar);
        assert!(!strict.is_valid);
        assert_eq!(strict.total_beats, 0.375);
    }

    #[test]
    fn test_check_partial() {
        assert!(check_partial(r"\partial 3/8 c8 d8 e8").is_valid);
        assert!(!check_partial(r"\partial 3/8 c8 d8").is_valid);
        assert!(check_partial(r"\partial 4 c16 d16 e16 f16").is_valid);
        assert!(check_partial(r"\partial 3/8 c8 d16 e16 f16").is_valid);
        assert!(!check_partial(r"\partial 4 c d e f").is_valid);
        assert!(check_partial(r"\partial 4/4 c4 d4 e4 f4").is_valid);
        assert!(check_partial(r"\partial 8 c16 d").is_valid);
    }

    #[test]
    fn test_check_partial_without_marker() {
        let result = check_partial(r"\partial c8 d8");
        assert!(!result.is_valid);
        assert_eq!(result.total_beats, 0.0);
        assert!(!check_partial("4/4 c4 d4 e4 f4").is_valid);
        // check_bar trusts any declared pickup, even a mismatched one
        let pickup = check_bar(r"\partial 4/4 c4", 1.0, true, FixMode::Skip);
        assert!(pickup.is_valid);
        assert_eq!(pickup.bar, r"\partial 4/4 c4");
    }

    #[test]
    fn test_fix_mode_from_str() {
        assert_eq!("Rest".parse::<FixMode>().unwrap(), FixMode::Rest);
        assert_eq!("skip".parse::<FixMode>().unwrap(), FixMode::Skip);
        assert!("trim".parse::<FixMode>().is_err());
    }
}
