//! # Configuration
//!
//! Songbook settings, read from YAML with kebab-case keys. Every key is
//! optional:
//!
//! ```yaml
//! directory: ~/Music/charts/ly
//! extension: ly
//! measures: 4
//! fix-mode: skip
//! title: Alltunes
//! version: 2.24.3
//! paper-size: letter
//! right-margin: 2\in
//! retarget-key: true
//! ```

use crate::barcheck::FixMode;
use crate::error::FourbarError;
use crate::excerpt::{read_source, ExtractOptions, DEFAULT_MEASURES};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Directory holding the melody files.
    pub directory: Option<PathBuf>,
    /// Extension of melody files, without the dot.
    pub extension: String,
    /// Bars per excerpt.
    pub measures: usize,
    pub fix_mode: FixMode,
    /// Songbook title.
    pub title: String,
    /// LilyPond `\version` of the generated document.
    pub version: String,
    pub paper_size: String,
    pub right_margin: String,
    /// Rewrite the key directive of transposed excerpts to the new tonic.
    pub retarget_key: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory: None,
            extension: "ly".to_string(),
            measures: DEFAULT_MEASURES,
            fix_mode: FixMode::default(),
            title: "Alltunes".to_string(),
            version: "2.24.3".to_string(),
            paper_size: "letter".to_string(),
            right_margin: r"2\in".to_string(),
            retarget_key: true,
        }
    }
}

impl Config {
    pub fn from_yaml_str(content: &str) -> Result<Self, FourbarError> {
        // serde_yaml reads an empty document as null, not an empty map
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| FourbarError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, FourbarError> {
        Config::from_yaml_str(&read_source(path)?)
    }

    fn validate(&self) -> Result<(), FourbarError> {
        if self.measures == 0 {
            return Err(FourbarError::Config("measures must be at least 1".to_string()));
        }
        if self.extension.trim().is_empty() {
            return Err(FourbarError::Config("extension must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            measures: self.measures,
            fix_mode: self.fix_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
        assert_eq!(Config::from_yaml_str("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_parse_config() {
        let config = Config::from_yaml_str(
            "directory: /srv/charts\nmeasures: 2\nfix-mode: rest\ntitle: Gig\nretarget-key: false\n",
        )
        .unwrap();
        assert_eq!(config.directory, Some(PathBuf::from("/srv/charts")));
        assert_eq!(config.measures, 2);
        assert_eq!(config.fix_mode, FixMode::Rest);
        assert_eq!(config.title, "Gig");
        assert!(!config.retarget_key);
        assert_eq!(config.version, "2.24.3");
        assert_eq!(
            config.extract_options(),
            ExtractOptions {
                measures: 2,
                fix_mode: FixMode::Rest
            }
        );
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            Config::from_yaml_str("measures: 0"),
            Err(FourbarError::Config(_))
        ));
        assert!(matches!(
            Config::from_yaml_str("fix-mode: trim"),
            Err(FourbarError::Config(_))
        ));
        assert!(matches!(
            Config::from_yaml_str("measures: [1, 2"),
            Err(FourbarError::Config(_))
        ));
    }

    #[test]
    fn test_missing_config_file() {
        assert!(matches!(
            Config::load(Path::new("/no/such/fourbar.yaml")),
            Err(FourbarError::NotFound { .. })
        ));
    }
}
