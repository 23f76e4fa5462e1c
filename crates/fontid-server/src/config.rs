use std::path::PathBuf;

use anyhow::{Context, bail};
use fontid_model::{GrayscaleNormalize, ModelPaths, Preprocessor, ResizeToTensor};

/// Which input transform the deployed artifact was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessMode {
    /// Grayscale, mean 0.5 / std 0.5.
    Normalized,
    /// Resize and scale to `[0, 1]` only. Fallback for artifacts trained
    /// without normalization.
    Plain,
}

impl PreprocessMode {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normalized" => Ok(PreprocessMode::Normalized),
            "plain" => Ok(PreprocessMode::Plain),
            other => bail!("FONTID_PREPROCESS must be `normalized` or `plain`, got `{}`", other),
        }
    }

    pub fn build(self) -> Box<dyn Preprocessor> {
        match self {
            PreprocessMode::Normalized => Box::new(GrayscaleNormalize::default()),
            PreprocessMode::Plain => Box::new(ResizeToTensor),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub model: ModelPaths,
    pub recordings_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub secret_key: String,
    pub preprocess: PreprocessMode,
    pub payment_provider_key: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("FONTID_PORT", "8501")
            .parse()
            .context("FONTID_PORT is not a valid port")?;

        Ok(Self {
            db_path: var("FONTID_DB_PATH", "app_users.db").into(),
            model: ModelPaths {
                model: var("FONTID_MODEL_PATH", "model.pth").into(),
                labels: var("FONTID_LABELS_PATH", "data/fontlist.txt").into(),
            },
            recordings_dir: var("FONTID_RECORDINGS_DIR", "recordings").into(),
            host: var("FONTID_HOST", "0.0.0.0"),
            port,
            secret_key: var("FONTID_SECRET_KEY", "change-me-in-production"),
            preprocess: PreprocessMode::parse(&var("FONTID_PREPROCESS", "normalized"))?,
            payment_provider_key: lookup("FONTID_PAYMENT_PROVIDER_KEY").filter(|k| !k.is_empty()),
        })
    }
}
