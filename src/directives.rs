//! # Header Directives
//!
//! Reads the declarations found at the top of a LilyPond melody file, before
//! the line that opens the melody (`melody = \relative c' {`).
//!
//! ## Collected Directives
//! - `\clef ...`, `\key ...`, `\time ...` lines, stored verbatim (trimmed)
//! - the relative octave pitch from the melody line itself (`c'`)
//!
//! Each directive is stored at most once; the first occurrence wins and the
//! insertion order is kept, since rendering follows it. When no `\time` line
//! was seen, `\time 4/4` is added.
//!
//! ## Transpose Directives
//! `\transpose <from> <to>` may appear anywhere in a file outside comments.
//! [`read_transpose_directive`] finds the line, [`parse_transpose_directive`]
//! pulls out the two pitches.

use crate::error::FourbarError;
use crate::transpose::{normalize_pitch, Transposer};
use once_cell::sync::Lazy;
use regex::Regex;

static RELATIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\relative\s+([a-g][',]*)\s*\{").unwrap());
static TRANSPOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\transpose\s+([a-g][#bsf]?[',]*)\s+([a-g][#bsf]?[',]*)").unwrap());
static TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\time\s*(\d+)/(\d+)").unwrap());
static KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\key\s+([a-gA-G][#bsf]?)(?:\s+(\\[a-zA-Z]+)|\s|$)").unwrap());

/// Marks the line that opens the melody body.
pub const MELODY_START: &str = "melody =";
/// Lines starting with this are comments.
pub const COMMENT: char = '%';
pub const TRANSPOSE_MARKER: &str = r"\transpose";
/// Octave used by `\resetRelativeOctave` when the melody line gave none.
pub const DEFAULT_OCTAVE: &str = "c'";
pub const DEFAULT_TIME: &str = r"\time 4/4";

/// Kind of header directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Clef,
    Key,
    Time,
    Octave,
}

impl DirectiveKind {
    /// The directive kinds read from header lines, in matching priority.
    pub const HEADER: [DirectiveKind; 3] = [DirectiveKind::Clef, DirectiveKind::Key, DirectiveKind::Time];

    /// Command word identifying the directive in a line (none for octave).
    pub fn marker(self) -> Option<&'static str> {
        match self {
            DirectiveKind::Clef => Some(r"\clef"),
            DirectiveKind::Key => Some(r"\key"),
            DirectiveKind::Time => Some(r"\time"),
            DirectiveKind::Octave => None,
        }
    }
}

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    /// Parse the `N/M` of a `\time N/M` line.
    pub fn from_directive(text: &str) -> Option<Self> {
        let caps = TIME.captures(text)?;
        let beats: u8 = caps[1].parse().ok()?;
        let beat_type: u8 = caps[2].parse().ok().filter(|d| *d > 0)?;
        Some(TimeSignature { beats, beat_type })
    }

    /// Bar length as a fraction of a whole note (3/4 -> 0.75, 6/8 -> 0.75).
    pub fn as_fraction(&self) -> f64 {
        self.beats as f64 / self.beat_type as f64
    }
}

/// Header directives of one melody, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    entries: Vec<(DirectiveKind, String)>,
}

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, kind: DirectiveKind) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, kind: DirectiveKind) -> bool {
        self.get(kind).is_some()
    }

    /// Store `value` unless `kind` is already set. Returns whether it was stored.
    pub fn insert(&mut self, kind: DirectiveKind, value: impl Into<String>) -> bool {
        if self.contains(kind) {
            return false;
        }
        self.entries.push((kind, value.into()));
        true
    }

    /// Store `value`, replacing an existing entry in place.
    pub fn set(&mut self, kind: DirectiveKind, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((kind, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DirectiveKind, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn octave(&self) -> Option<&str> {
        self.get(DirectiveKind::Octave)
    }

    /// Time signature from the `\time` directive; 4/4 when absent or unreadable.
    pub fn time_signature(&self) -> TimeSignature {
        self.get(DirectiveKind::Time)
            .and_then(TimeSignature::from_directive)
            .unwrap_or_default()
    }

    /// Add `\time 4/4` when no time directive was found.
    pub fn ensure_time(&mut self) {
        self.insert(DirectiveKind::Time, DEFAULT_TIME);
    }

    /// Store the first clef/key/time directive found in a header line.
    ///
    /// Only one directive is taken per line. Returns whether one was stored.
    pub fn collect_header_line(&mut self, line: &str) -> bool {
        for kind in DirectiveKind::HEADER {
            let Some(marker) = kind.marker() else { continue };
            if line.contains(marker) && !self.contains(kind) {
                return self.insert(kind, line.trim());
            }
        }
        false
    }

    /// Shift the tonic of the key directive by the transposer's interval,
    /// keeping the mode (`\major` when none is given).
    ///
    /// `\key g \major` under `\transpose c d` becomes `\key a \major`. The key
    /// is left alone when there is none or its tonic cannot be read. Returns
    /// whether the key changed.
    pub fn retarget_key(&mut self, transposer: &Transposer) -> bool {
        let Some(current) = self.get(DirectiveKind::Key) else {
            return false;
        };
        let Some(caps) = KEY.captures(current) else {
            log::warn!("cannot read the tonic of {}, key left as is", current);
            return false;
        };
        let Ok(tonic) = transposer.transpose(&normalize_pitch(&caps[1])) else {
            log::warn!("unknown tonic in {}, key left as is", current);
            return false;
        };
        let mode = caps.get(2).map_or(r"\major", |m| m.as_str());
        let key = format!(r"\key {} {}", tonic, mode);
        self.set(DirectiveKind::Key, key);
        true
    }
}

pub fn is_melody_start(line: &str) -> bool {
    line.contains(MELODY_START)
}

pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with(COMMENT)
}

/// Relative octave pitch of a `melody = \relative c' {` line.
pub fn parse_octave(line: &str) -> Result<String, FourbarError> {
    RELATIVE
        .captures(line)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| FourbarError::InvalidFormat {
            directive: "relative",
            text: line.trim().to_string(),
        })
}

/// Collect the header directives of a melody file.
///
/// Stops at the melody line, whose relative octave becomes the `Octave`
/// directive. Directives after that line are never read.
pub fn read_directives<'a, I>(lines: I) -> Result<Directives, FourbarError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut directives = Directives::new();
    for line in lines {
        if is_melody_start(line) {
            directives.insert(DirectiveKind::Octave, parse_octave(line)?);
            break;
        }
        directives.collect_header_line(line);
    }
    directives.ensure_time();
    Ok(directives)
}

/// First non-comment line holding a `\transpose` directive, trimmed.
pub fn read_transpose_directive<'a, I>(lines: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.starts_with(COMMENT))
        .find(|line| line.contains(TRANSPOSE_MARKER))
        .map(str::to_string)
}

/// The two pitches following `\transpose`, as written (octave marks included).
pub fn parse_transpose_directive(text: &str) -> Result<(String, String), FourbarError> {
    TRANSPOSE
        .captures(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .ok_or_else(|| FourbarError::InvalidFormat {
            directive: "transpose",
            text: text.trim().to_string(),
        })
}
