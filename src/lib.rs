pub mod barcheck;
pub mod config;
pub mod directives;
pub mod error;
pub mod excerpt;
pub mod songbook;
pub mod transpose;

pub use barcheck::{check_bar, check_partial, BarCheck, FixMode};
pub use config::Config;
pub use directives::{
    parse_transpose_directive, read_directives, read_transpose_directive, DirectiveKind, Directives,
    TimeSignature,
};
pub use error::*;
pub use excerpt::{extract, extract_with, Excerpt, ExtractOptions};
pub use songbook::Songbook;
pub use transpose::{PitchClass, TransposeInterval, Transposer};

use std::path::Path;

/// Extract the excerpt of a single file, transposing it when the file holds a
/// `\transpose` directive.
pub fn excerpt_file(path: &Path) -> Result<Excerpt, FourbarError> {
    songbook::process_file(path, &Config::default())
}

/// Build the songbook document for every melody file in `dir`.
pub fn songbook_for_dir(dir: &Path) -> Result<String, FourbarError> {
    Ok(Songbook::build(Config::default(), dir)?.render())
}
