//! # Pitch Transposition
//!
//! Maps LilyPond English pitch names (`c`, `cs`, `ef`, ...) to pitch classes,
//! shifts them by a fixed interval and spells the result from a fixed table.
//!
//! ## Spelling Table
//! Output spelling never depends on key context. Each pitch class has exactly
//! one spelling:
//!
//! ```text
//! 0=c  1=cs  2=d  3=ef  4=e  5=f  6=fs  7=g  8=gs  9=a  10=bf  11=b
//! ```
//!
//! Input accepts naturals, `s` sharps and `f` flats. `cf` is read as class 10
//! (same as `bf`) and is never produced.
//!
//! ## Accidentals
//! `#` and `b` accidentals in written notes are translated to `s` and `f` by
//! [`normalize_pitch`]. Only [`Transposer::new`] and the lenient bar
//! transposition normalize; strict lookups take table names as given.
//!
//! ## Entry Points
//! - [`Transposer::new`] / [`Transposer::from_directive_text`]
//! - [`Transposer::transpose`] - one table name, strict
//! - [`Transposer::transpose_all`] - a list of table names, fails on the first unknown name

use crate::directives::parse_transpose_directive;
use crate::error::FourbarError;
use std::fmt;
use std::ops::Add;

/// Pitch modulo octave, always in `0..12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PitchClass(u8);

impl PitchClass {
    pub fn new(value: i32) -> Self {
        PitchClass(value.rem_euclid(12) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Look up an English pitch name (already normalized).
    pub fn from_name(name: &str) -> Option<Self> {
        let value = match name {
            "c" => 0,
            "d" => 2,
            "e" => 4,
            "f" => 5,
            "g" => 7,
            "a" => 9,
            "b" => 11,
            "cs" => 1,
            "ds" => 3,
            "fs" => 6,
            "gs" => 8,
            "as" => 10,
            "df" => 1,
            "ef" => 3,
            "gf" => 6,
            "af" => 8,
            "bf" => 10,
            "cf" => 10,
            _ => return None,
        };
        Some(PitchClass(value))
    }

    /// Canonical spelling for this class.
    pub fn spelling(self) -> &'static str {
        match self.0 {
            0 => "c",
            1 => "cs",
            2 => "d",
            3 => "ef",
            4 => "e",
            5 => "f",
            6 => "fs",
            7 => "g",
            8 => "gs",
            9 => "a",
            10 => "bf",
            11 => "b",
            _ => unreachable!(),
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

/// Upward distance in semitones between two pitch classes, in `0..12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransposeInterval(u8);

impl TransposeInterval {
    pub fn between(source: PitchClass, target: PitchClass) -> Self {
        TransposeInterval(PitchClass::new(target.0 as i32 - source.0 as i32).0)
    }

    pub fn semitones(self) -> u8 {
        self.0
    }
}

impl Add<TransposeInterval> for PitchClass {
    type Output = PitchClass;

    fn add(self, interval: TransposeInterval) -> PitchClass {
        PitchClass::new(self.0 as i32 + interval.0 as i32)
    }
}

/// Normalize a raw pitch token to the English spelling used for lookup.
///
/// Lowercases, drops octave marks (`'` and `,`) and turns a `#`/`b`
/// accidental into `s`/`f`.
pub fn normalize_pitch(raw: &str) -> String {
    let mut name: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '\'' && *c != ',')
        .flat_map(char::to_lowercase)
        .collect();
    let accidental = match name.get(1..) {
        Some("#") => Some("s"),
        Some("b") => Some("f"),
        _ => None,
    };
    if let Some(acc) = accidental {
        name.replace_range(1.., acc);
    }
    name
}

fn lookup(name: &str) -> Result<PitchClass, FourbarError> {
    PitchClass::from_name(name).ok_or_else(|| FourbarError::UnknownPitch(name.to_string()))
}

/// Transposes pitch names by the interval between a source and a target pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transposer {
    interval: TransposeInterval,
}

impl Transposer {
    /// Build a transposer taking `source` to `target`.
    ///
    /// Both pitches are normalized first, so `C'` and `eb,` are accepted.
    ///
    /// # Example
    /// ```
    /// use fourbar::Transposer;
    ///
    /// let t = Transposer::new("c", "d")?;
    /// assert_eq!(t.transpose("f")?, "g");
    /// assert_eq!(t.transpose("b")?, "cs");
    /// # Ok::<(), fourbar::FourbarError>(())
    /// ```
    pub fn new(source: &str, target: &str) -> Result<Self, FourbarError> {
        let source = lookup(&normalize_pitch(source))?;
        let target = lookup(&normalize_pitch(target))?;
        let interval = TransposeInterval::between(source, target);
        Ok(Transposer { interval })
    }

    /// Build a transposer from a line holding a `\transpose <from> <to>` directive.
    pub fn from_directive_text(text: &str) -> Result<Self, FourbarError> {
        let (source, target) = parse_transpose_directive(text)?;
        Transposer::new(&source, &target)
    }

    pub fn interval(&self) -> TransposeInterval {
        self.interval
    }

    /// Transpose one pitch name. Only exact table names (`c`, `cs`, `ef`, ...)
    /// are accepted.
    pub fn transpose(&self, pitch: &str) -> Result<&'static str, FourbarError> {
        Ok((lookup(pitch)? + self.interval).spelling())
    }

    /// Transpose every name in order. The first unknown name fails the whole list.
    pub fn transpose_all<S: AsRef<str>>(&self, pitches: &[S]) -> Result<Vec<String>, FourbarError> {
        pitches
            .iter()
            .map(|p| self.transpose(p.as_ref()).map(str::to_string))
            .collect()
    }
}
