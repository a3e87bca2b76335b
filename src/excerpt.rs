//! # Excerpt Extraction
//!
//! Pulls the opening bars of a melody out of a LilyPond file and formats
//! them for a songbook of incipits.
//!
//! ## Pipeline
//! 1. Header directives (`\clef`, `\key`, `\time`) before the melody line,
//!    unless the caller already supplied directives
//! 2. Relative octave from the `melody = \relative c' {` line
//! 3. One bar per content line, up to the closing `}` or the bar limit. Lines
//!    holding only commands (`\key d \major`, `\bar "||"`) are skipped;
//!    `\partial 4 g4` and `\mark \default e2.` are bars
//! 4. Each bar is checked against the time signature and padded when short
//! 5. Optional transposition of every note
//! 6. Rendering: directive lines, `\resetRelativeOctave`, then the bars, with
//!    the title attached above the first note
//!
//! ## Transposition Policy
//! Bars are transposed leniently: a token that does not parse as a pitch, or
//! whose pitch is not in the table, is kept as written. Use
//! [`Transposer::transpose_all`] for strict list transposition.

use crate::barcheck::{check_bar, FixMode};
use crate::directives::{is_comment, is_melody_start, parse_octave, DirectiveKind, Directives, DEFAULT_OCTAVE};
use crate::error::FourbarError;
use crate::transpose::{normalize_pitch, Transposer};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Bars taken from each melody by default.
pub const DEFAULT_MEASURES: usize = 4;
/// A line containing this ends the melody body.
pub const MELODY_END: char = '}';

static DIRECTIVE_WITH_ARGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\\(?:key\s+[a-g][#bsf]?\s*(?:\\\w+)?|time\s+\d+/\d+|clef\s+"?[\w^_-]+"?|bar\s+"[^"]*"|tempo\s+(?:"[^"]*"\s*)?(?:\d+\.?\s*=\s*\d+)?|repeat\s+\w+\s+\d+\s*\{?)\s*"#,
    )
    .unwrap()
});
static DIRECTIVE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\(\w+)\s*").unwrap());
static NOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-gA-G])([#bsf]?)([',]*)(\d*\.*)(.*)$").unwrap());

/// Settings for [`extract_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Maximum number of bars to keep.
    pub measures: usize,
    pub fix_mode: FixMode,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            measures: DEFAULT_MEASURES,
            fix_mode: FixMode::Skip,
        }
    }
}

/// The opening bars of one melody.
#[derive(Debug, Clone, PartialEq)]
pub struct Excerpt {
    pub title: String,
    pub measures: Vec<String>,
    pub directives: Directives,
}

impl Excerpt {
    /// Format the excerpt as LilyPond source to paste inside a melody block.
    pub fn render(&self) -> String {
        let mut output: Vec<String> = self
            .directives
            .iter()
            .filter(|(kind, _)| *kind != DirectiveKind::Octave)
            .map(|(_, directive)| format!("  {}", directive))
            .collect();

        output.push(format!(
            "  \\resetRelativeOctave {}",
            self.directives.octave().unwrap_or(DEFAULT_OCTAVE)
        ));

        if let Some((first, rest)) = self.measures.split_first() {
            let mut lines = vec![annotate_first_note(first, &self.title)];
            lines.extend(rest.iter().cloned());
            output.push(lines.join("\n"));
        }

        output.join("\n")
    }

    /// Split into `(title, rendered text, directives)`.
    pub fn into_parts(self) -> (String, String, Directives) {
        let text = self.render();
        (self.title, text, self.directives)
    }
}

/// Title from a file name or path, without directory or extension.
pub fn title_from_identifier(identifier: &str) -> String {
    Path::new(identifier)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| identifier.to_string())
}

/// `^title` markup, quoted unless the title is a single plain word.
fn title_markup(title: &str) -> String {
    if !title.is_empty() && title.chars().all(|c| c.is_ascii_alphabetic()) {
        format!("^{}", title)
    } else {
        format!("^\"{}\"", title.replace('"', "\\\""))
    }
}

fn annotate_first_note(measure: &str, title: &str) -> String {
    match measure.split_once(' ') {
        Some((first, rest)) => format!("{} {} {}", first, title_markup(title), rest),
        None => format!("{} {}", measure, title_markup(title)),
    }
}

/// Drop embedded commands (except a `\partial` pickup) and one trailing
/// tie or bar line. `\key`, `\time`, `\clef`, `\bar`, `\tempo` and
/// `\repeat` lose their arguments too.
pub fn clean_measure(measure: &str) -> String {
    let measure = DIRECTIVE_WITH_ARGS.replace_all(measure, "");
    let notes = DIRECTIVE_WORD.replace_all(&measure, |caps: &regex::Captures| {
        if &caps[1] == "partial" {
            caps[0].to_string()
        } else {
            String::new()
        }
    });
    let notes = notes.trim();
    notes
        .strip_suffix('~')
        .or_else(|| notes.strip_suffix('|'))
        .unwrap_or(notes)
        .trim_end()
        .to_string()
}

/// A line with no notes once its commands are removed.
fn is_pure_directive(line: &str) -> bool {
    !clean_measure(line).chars().any(|c| c.is_ascii_alphanumeric())
}

/// Check one bar against the time signature and pad it if needed.
fn fit_measure(measure: &str, target_beats: f64, fix_mode: FixMode) -> String {
    let result = check_bar(&clean_measure(measure), target_beats, true, fix_mode);
    if !result.is_valid {
        log::warn!(
            "bar has {} whole notes, expected {}: {}",
            result.total_beats,
            target_beats,
            result.bar
        );
    }
    result.bar
}

/// Transpose one note token, keeping octave marks, duration and articulations.
///
/// Returns `None` when the token is not a pitch the transposer knows.
fn transpose_token(token: &str, transposer: &Transposer) -> Option<String> {
    let caps = NOTE.captures(token)?;
    let pitch = normalize_pitch(&format!("{}{}", &caps[1], &caps[2]));
    let name = transposer.transpose(&pitch).ok()?;
    Some(format!("{}{}{}{}", name, &caps[3], &caps[4], &caps[5]))
}

/// Transpose every note of a bar, keeping anything that is not a known pitch.
pub fn transpose_measure(measure: &str, transposer: &Transposer) -> String {
    let mut transposed = clean_measure(measure)
        .split_whitespace()
        .map(|token| transpose_token(token, transposer).unwrap_or_else(|| token.to_string()))
        .collect::<Vec<_>>()
        .join(" ");
    if measure.trim_end().ends_with('|') {
        transposed.push_str(" |");
    }
    log::debug!("transposed bar: {} -> {}", measure, transposed);
    transposed
}

/// Transpose each bar in order.
pub fn transpose_measures<S: AsRef<str>>(measures: &[S], transposer: &Transposer) -> Vec<String> {
    measures
        .iter()
        .map(|m| transpose_measure(m.as_ref(), transposer))
        .collect()
}

/// Extract the first four bars of a melody, padding short bars with skips.
///
/// Supplied non-empty `directives` replace the header scan entirely; the
/// relative octave is read from the melody line either way.
///
/// # Example
/// ```rust
/// use fourbar::extract;
///
/// let source = "\\time 3/4\nmelody = \\relative c' {\n  c4 d e\n  f2\n}\n";
/// let excerpt = extract(source, "waltz.ly", None, None)?;
/// assert_eq!(excerpt.title, "waltz");
/// assert_eq!(excerpt.measures, vec!["c4 d e", "f2 s4"]);
/// # Ok::<(), fourbar::FourbarError>(())
/// ```
pub fn extract(
    source: &str,
    identifier: &str,
    directives: Option<Directives>,
    transposer: Option<&Transposer>,
) -> Result<Excerpt, FourbarError> {
    extract_with(source, identifier, directives, transposer, &ExtractOptions::default())
}

/// [`extract`] with a custom bar count and fix mode.
pub fn extract_with(
    source: &str,
    identifier: &str,
    directives: Option<Directives>,
    transposer: Option<&Transposer>,
    options: &ExtractOptions,
) -> Result<Excerpt, FourbarError> {
    let title = title_from_identifier(identifier);
    let mut directives = directives.unwrap_or_default();
    let scan_header = directives.is_empty();

    let mut melody_started = false;
    let mut raw_measures: Vec<&str> = Vec::new();
    for line in source.lines() {
        if !melody_started {
            if is_melody_start(line) {
                directives.set(DirectiveKind::Octave, parse_octave(line)?);
                melody_started = true;
            } else if scan_header {
                directives.collect_header_line(line);
            }
            continue;
        }

        if line.contains(MELODY_END) {
            break;
        }
        let stripped = line.trim();
        if !stripped.is_empty() && !is_comment(stripped) && !is_pure_directive(stripped) {
            raw_measures.push(stripped);
        }
        if raw_measures.len() >= options.measures {
            break;
        }
    }

    directives.ensure_time();
    let target_beats = directives.time_signature().as_fraction();

    let mut measures: Vec<String> = raw_measures
        .iter()
        .map(|m| fit_measure(m, target_beats, options.fix_mode))
        .collect();

    if let Some(transposer) = transposer {
        measures = transpose_measures(&measures, transposer);
    }

    Ok(Excerpt {
        title,
        measures,
        directives,
    })
}

/// Read a whole source file; a missing file is [`FourbarError::NotFound`].
pub fn read_source(path: &Path) -> Result<String, FourbarError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FourbarError::NotFound {
            path: path.to_path_buf(),
        },
        _ => FourbarError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALTZ: &str = r#"\version "2.24.3"
\include "english.ly"
\clef treble
\key g \major
\time 3/4
melody = \relative c'' {
  % opening
  g4 a b
  c2
  \bar "||"
  d4 e8 fs g4 |
  a4 b c d
  e2.
}
"#;

    #[test]
    fn test_extract_three_four() {
        let excerpt = extract(WALTZ, "Waltz.ly", None, None).unwrap();
        assert_eq!(excerpt.title, "Waltz");
        assert_eq!(
            excerpt.measures,
            vec!["g4 a b", "c2 s4", "d4 e8 fs g4", "a4 b c d"]
        );
        assert_eq!(excerpt.directives.octave(), Some("c''"));
        assert_eq!(excerpt.directives.time_signature().as_fraction(), 0.75);
    }

    #[test]
    fn test_render() {
        let (title, text, _) = extract(WALTZ, "tunes/Waltz.ly", None, None).unwrap().into_parts();
        assert_eq!(title, "Waltz");
        let expected = "  \\clef treble\n  \\key g \\major\n  \\time 3/4\n  \\resetRelativeOctave c''\ng4 ^Waltz a b\nc2 s4\nd4 e8 fs g4\na4 b c d";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_title_markup_quotes_non_words() {
        assert_eq!(annotate_first_note("c4", "Blue Bossa"), "c4 ^\"Blue Bossa\"");
        assert_eq!(annotate_first_note("c4 d", "Solar"), "c4 ^Solar d");
    }

    #[test]
    fn test_default_time_pads_to_whole_note() {
        let source = "melody = \\relative c' {\nc4 d e\n}";
        let excerpt = extract(source, "x.ly", None, None).unwrap();
        assert_eq!(excerpt.measures, vec!["c4 d e s4"]);
        assert_eq!(excerpt.directives.get(DirectiveKind::Time), Some("\\time 4/4"));
    }

    #[test]
    fn test_supplied_directives_suppress_scan() {
        let mut supplied = Directives::new();
        supplied.insert(DirectiveKind::Time, "\\time 2/4");
        let excerpt = extract(WALTZ, "Waltz.ly", Some(supplied), None).unwrap();
        assert!(!excerpt.directives.contains(DirectiveKind::Clef));
        assert_eq!(excerpt.directives.octave(), Some("c''"));
        assert_eq!(excerpt.measures[0], "g4 a b");
        // 2/4 target: c2 is already full
        assert_eq!(excerpt.measures[1], "c2");
    }

    #[test]
    fn test_bad_relative_line_is_fatal() {
        let source = "melody = \\relative {\nc4 d e f\n}";
        assert!(matches!(
            extract(source, "x.ly", None, None),
            Err(FourbarError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_clean_measure() {
        assert_eq!(clean_measure("\\mark \\default c4 d e f |"), "c4 d e f");
        assert_eq!(clean_measure("c2 d2~"), "c2 d2");
        assert_eq!(clean_measure("\\partial 8 c8"), "\\partial 8 c8");
        assert_eq!(clean_measure("\\key d \\major"), "");
        assert_eq!(clean_measure("\\bar \"||\""), "");
        assert_eq!(clean_measure("\\time 2/4 c4 d"), "c4 d");
        assert_eq!(clean_measure("\\repeat volta 2 {"), "");
    }

    #[test]
    fn test_command_lines_inside_melody() {
        let source = "\\time 3/4\nmelody = \\relative c' {\n  \\partial 4 g4\n  c2 d4\n  \\key d \\major\n  \\mark \\default e2.\n  f2.\n  g2.\n}\n";
        let excerpt = extract(source, "pickup.ly", None, None).unwrap();
        assert_eq!(
            excerpt.measures,
            vec!["\\partial 4 g4", "c2 d4", "e2. s4", "f2. s4"]
        );
    }

    #[test]
    fn test_partial_bar_is_kept() {
        let source = "\\time 3/4\nmelody = \\relative c' {\ng8 \\partial 8\nc4 d e\n}";
        let excerpt = extract(source, "pickup.ly", None, None).unwrap();
        assert_eq!(excerpt.measures[0], "g8 \\partial 8");
    }

    #[test]
    fn test_transpose_measure() {
        let t = Transposer::new("c", "d").unwrap();
        assert_eq!(transpose_measure("c4 e8 g'8-. b,4 r4", &t), "d4 fs8 a'8-. cs,4 r4");
        assert_eq!(transpose_measure("ef4 bf2 a4 |", &t), "f4 c2 b4 |");
        assert_eq!(transpose_measure("eb4 c#8", &t), "f4 ef8");
    }

    #[test]
    fn test_transpose_measure_is_lenient() {
        let t = Transposer::new("c", "d").unwrap();
        assert_eq!(transpose_measure("es4 c4 s2", &t), "es4 d4 s2");
    }

    #[test]
    fn test_extract_with_transposer() {
        let t = Transposer::from_directive_text("\\transpose g c").unwrap();
        let excerpt = extract(WALTZ, "Waltz.ly", None, Some(&t)).unwrap();
        assert_eq!(
            excerpt.measures,
            vec!["c4 d e", "f2 s4", "g4 a8 b c4", "d4 e f g"]
        );
    }

    #[test]
    fn test_extract_with_options() {
        let options = ExtractOptions {
            measures: 2,
            fix_mode: FixMode::Rest,
        };
        let excerpt = extract_with(WALTZ, "Waltz.ly", None, None, &options).unwrap();
        assert_eq!(excerpt.measures, vec!["g4 a b", "c2 r4"]);
    }

    #[test]
    fn test_read_source_missing() {
        let result = read_source(Path::new("/no/such/tune.ly"));
        assert!(matches!(result, Err(FourbarError::NotFound { .. })));
    }
}
