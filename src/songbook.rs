//! # Songbook
//!
//! Builds one LilyPond document holding the opening bars of every melody
//! file in a directory, in file-name order.
//!
//! Each file is processed on its own: when a file has a `\transpose`
//! directive its excerpt is transposed, and any error is logged and recorded
//! in [`Songbook::failures`] without stopping the batch.

use crate::config::Config;
use crate::directives::read_transpose_directive;
use crate::error::FourbarError;
use crate::excerpt::{extract_with, read_source, Excerpt};
use crate::transpose::Transposer;
use std::fs;
use std::path::{Path, PathBuf};

/// A file that could not be turned into an excerpt.
#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    pub error: FourbarError,
}

#[derive(Debug)]
pub struct Songbook {
    pub config: Config,
    pub excerpts: Vec<Excerpt>,
    pub failures: Vec<Failure>,
}

/// Files in `dir` with the given extension, sorted by name.
pub fn list_sources(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, FourbarError> {
    if !dir.is_dir() {
        return Err(FourbarError::NotFound {
            path: dir.to_path_buf(),
        });
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == extension) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Extract the excerpt of one file, transposing it if the file asks for it.
pub fn process_file(path: &Path, config: &Config) -> Result<Excerpt, FourbarError> {
    let source = read_source(path)?;
    let transpose_line = read_transpose_directive(source.lines());
    let transposer = transpose_line
        .as_deref()
        .map(Transposer::from_directive_text)
        .transpose()?;

    let mut excerpt = extract_with(
        &source,
        &path.to_string_lossy(),
        None,
        transposer.as_ref(),
        &config.extract_options(),
    )?;

    if let (Some(transposer), true) = (&transposer, config.retarget_key) {
        excerpt.directives.retarget_key(transposer);
    }
    Ok(excerpt)
}

impl Songbook {
    /// Build from the directory named in the configuration.
    pub fn from_config(config: Config) -> Result<Self, FourbarError> {
        let dir = config
            .directory
            .clone()
            .ok_or_else(|| FourbarError::Config("no directory given".to_string()))?;
        Songbook::build(config, &dir)
    }

    /// Process every melody file of `dir`. Only a missing or unreadable
    /// directory is an error; per-file errors go to `failures`.
    pub fn build(config: Config, dir: &Path) -> Result<Self, FourbarError> {
        let mut excerpts = Vec::new();
        let mut failures = Vec::new();

        for path in list_sources(dir, &config.extension)? {
            match process_file(&path, &config) {
                Ok(excerpt) => {
                    log::info!("extracted {} bars from {}", excerpt.measures.len(), path.display());
                    excerpts.push(excerpt);
                }
                Err(error) => {
                    log::error!("skipping {}: {}", path.display(), error);
                    failures.push(Failure { path, error });
                }
            }
        }

        Ok(Songbook {
            config,
            excerpts,
            failures,
        })
    }

    /// Render the full LilyPond document.
    pub fn render(&self) -> String {
        let mut ly = self.render_header();
        for excerpt in &self.excerpts {
            ly.push('\n');
            ly.push_str(&format!("% {}\n", excerpt.title));
            ly.push_str(&excerpt.render());
            ly.push('\n');
        }
        ly.push_str(&self.render_footer());
        ly
    }

    fn render_header(&self) -> String {
        let mut ly = String::new();
        ly.push_str("\\include \"english.ly\"\n");
        ly.push_str(&format!("\\version \"{}\"\n", self.config.version));
        ly.push_str("\\paper {\n");
        ly.push_str(&format!("  right-margin = {}\n", self.config.right_margin));
        ly.push_str("  tagline = ##f\n");
        ly.push_str("  print-all-headers = ##t\n");
        ly.push_str(&format!("  #(set-paper-size \"{}\")\n", self.config.paper_size));
        ly.push_str("}\n");
        ly.push_str("melody = \\relative c' {\n");
        ly
    }

    fn render_footer(&self) -> String {
        let mut ly = String::new();
        ly.push_str("}\n\n");
        ly.push_str("\\score {\n");
        ly.push_str("  <<\n");
        ly.push_str("    \\new Staff \\melody\n");
        ly.push_str("  >>\n");
        ly.push_str("  \\header {\n");
        ly.push_str(&format!("    title = \"{}\"\n", self.config.title.replace('"', "\\\"")));
        ly.push_str("  }\n");
        ly.push_str("  \\layout {\n");
        ly.push_str("    indent = 0\\cm\n");
        ly.push_str("    \\context {\n");
        ly.push_str("      \\Score\n");
        ly.push_str("      \\omit BarNumber\n");
        ly.push_str("    }\n");
        ly.push_str("  }\n");
        ly.push_str("}\n");
        ly
    }
}
