use crate::matcher::MatchConfig;
use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings read from `.kakomon.toml`. Every field has a default, so an
/// absent file or a partial one is fine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project root; `exam_dir` is resolved against it
    pub root: PathBuf,
    pub exam_dir: PathBuf,
    /// Symbol-answer frequency table, relative to `exam_dir`
    pub frequency_file: PathBuf,
    /// Theme frequency document regrouped by `restructure`
    pub choice_frequency_file: PathBuf,
    /// Output of `figures`
    pub figure_list_file: PathBuf,
    /// Only files whose name contains this are read as explanations
    pub explanation_marker: String,
    /// File-name globs never read as corpus documents
    pub exclude: Vec<String>,
    /// File-name globs skipped when listing figure questions
    pub figure_exclude: Vec<String>,
    pub matching: MatchConfig,
    pub restructure: RestructureConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RestructureConfig {
    /// Leading lines copied verbatim ahead of the regrouped themes
    pub intro_lines: usize,
}

impl Default for RestructureConfig {
    fn default() -> Self {
        Self { intro_lines: 17 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            exam_dir: PathBuf::from("試験問題"),
            frequency_file: PathBuf::from("記号問題頻度順.md"),
            choice_frequency_file: PathBuf::from("選択問題頻出順.md"),
            figure_list_file: PathBuf::from("図を含む問題一覧.md"),
            explanation_marker: "問題解説".to_string(),
            exclude: vec![
                "README.md".to_string(),
                "図を含む問題一覧.md".to_string(),
                "記号問題頻度順.md".to_string(),
            ],
            figure_exclude: vec!["README.md".to_string(), "図を含む問題一覧.md".to_string()],
            matching: MatchConfig::default(),
            restructure: RestructureConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("in config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let ratio = self.matching.min_containment_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            bail!("matching.min_containment_ratio must be within 0.0..=1.0, got {}", ratio);
        }
        if self.matching.min_token_chars == 0 {
            bail!("matching.min_token_chars must be at least 1");
        }
        Ok(())
    }

    pub fn exam_dir(&self) -> PathBuf {
        self.root.join(&self.exam_dir)
    }

    pub fn frequency_path(&self) -> PathBuf {
        self.exam_dir().join(&self.frequency_file)
    }

    pub fn choice_frequency_path(&self) -> PathBuf {
        self.exam_dir().join(&self.choice_frequency_file)
    }

    pub fn figure_list_path(&self) -> PathBuf {
        self.exam_dir().join(&self.figure_list_file)
    }

    pub fn exclude_set(&self) -> Result<GlobSet> {
        glob_set(&self.exclude)
    }

    pub fn figure_exclude_set(&self) -> Result<GlobSet> {
        glob_set(&self.figure_exclude)
    }
}

fn glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("bad exclude pattern {:?}", pattern))?);
    }
    Ok(builder.build()?)
}
