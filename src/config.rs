use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::app::ThemePreset;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:50051/v1/generate";
const DEFAULT_MAX_TOKENS: u32 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_INPUT_LIMIT: usize = 280;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub(crate) endpoint: String,
    pub(crate) max_tokens: u32,
    pub(crate) timeout: Duration,
    pub(crate) theme: ThemePreset,
    pub(crate) input_limit: usize,
    pub(crate) log_filter: String,
    pub(crate) log_file: PathBuf,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let endpoint = var("BRICK_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            bail!("BRICK_ENDPOINT must be an http(s) URL, got {endpoint:?}");
        }

        let max_tokens = match var("BRICK_MAX_TOKENS") {
            Some(raw) => parse_positive::<u32>("BRICK_MAX_TOKENS", &raw)?,
            None => DEFAULT_MAX_TOKENS,
        };
        let timeout_secs = match var("BRICK_TIMEOUT_SECS") {
            Some(raw) => parse_positive::<u64>("BRICK_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let input_limit = match var("BRICK_INPUT_LIMIT") {
            Some(raw) => parse_positive::<usize>("BRICK_INPUT_LIMIT", &raw)?,
            None => DEFAULT_INPUT_LIMIT,
        };
        let theme = match var("BRICK_THEME") {
            Some(raw) => ThemePreset::parse(&raw)
                .with_context(|| format!("unknown BRICK_THEME {raw:?}"))?,
            None => ThemePreset::default(),
        };

        Ok(Self {
            endpoint,
            max_tokens,
            timeout: Duration::from_secs(timeout_secs),
            theme,
            input_limit,
            log_filter: var("BRICK_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_file: var("BRICK_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("brick.log")),
        })
    }
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = raw
        .parse::<T>()
        .with_context(|| format!("{key} must be a positive integer, got {raw:?}"))?;
    if value <= T::default() {
        bail!("{key} must be greater than zero");
    }
    Ok(value)
}
