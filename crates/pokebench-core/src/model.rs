//! Model identifiers: filesystem slugs, image transport mode, and the batch roster.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

static NON_ALNUM_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug pattern"));

/// Models run by `run-all`, in display order.
pub const DEFAULT_ROSTER: &[&str] = &[
    "openai/gpt-5-chat",
    "openai/gpt-4o-2024-11-20",
    "openai/gpt-4o-mini",
    "anthropic/claude-opus-4.1",
    "anthropic/claude-sonnet-4",
    "anthropic/claude-3.5-sonnet",
    "anthropic/claude-3.7-sonnet",
    "anthropic/claude-3.7-sonnet:beta",
    "anthropic/claude-3.7-sonnet:thinking",
    "google/gemini-2.5-flash",
    "google/gemini-2.0-flash-001",
    "google/gemini-2.5-flash-lite",
    "mistralai/mistral-small-3.2-24b-instruct",
    "mistralai/pixtral-12b",
    "mistralai/pixtral-large-2411",
    "qwen/qwen2.5-vl-32b-instruct",
    "qwen/qwen-vl-max",
    "x-ai/grok-2-vision-1212",
    "meta-llama/llama-3.2-11b-vision-instruct",
    "meta-llama/llama-3.2-90b-vision-instruct",
    "z-ai/glm-4.5v",
];

/// Vision models suggested when a run produces nothing usable.
pub const SUGGESTED_VISION_MODELS: &[&str] = &[
    "openai/gpt-4o-mini",
    "google/gemini-2.5-flash",
    "google/gemini-2.0-flash-001",
];

/// Filesystem-safe slug for a model identifier.
///
/// Lowercases, collapses every run of non-alphanumeric characters into a
/// single `-`, and trims leading/trailing separators. The same slug names the
/// per-model prediction and score files and is the model key on the web side.
pub fn model_slug(model: &str) -> String {
    let lower = model.to_lowercase();
    NON_ALNUM_RUN
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Roster as owned strings.
pub fn default_roster() -> Vec<String> {
    DEFAULT_ROSTER.iter().map(|m| m.to_string()).collect()
}

/// How images are handed to the model provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    /// Pass the public image URL through.
    Url,
    /// Download and inline the image as base64.
    #[default]
    Base64,
}

impl ImageMode {
    /// Value passed to `--image-mode`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMode::Url => "url",
            ImageMode::Base64 => "base64",
        }
    }
}

impl fmt::Display for ImageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(ImageMode::Url),
            "base64" => Ok(ImageMode::Base64),
            other => Err(ConfigError::InvalidImageMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_slug_collapses_and_trims() {
        assert_eq!(
            model_slug("Google/Gemini-2.0 Flash_001"),
            "google-gemini-2-0-flash-001"
        );
        assert_eq!(model_slug("acme/vision-1"), "acme-vision-1");
        assert_eq!(
            model_slug("anthropic/claude-3.7-sonnet:thinking"),
            "anthropic-claude-3-7-sonnet-thinking"
        );
        assert_eq!(model_slug("--weird//name--"), "weird-name");
        assert_eq!(model_slug("///"), "");
    }

    #[test]
    fn test_roster_slugs_are_unique() {
        let slugs: std::collections::HashSet<String> =
            DEFAULT_ROSTER.iter().map(|m| model_slug(m)).collect();
        assert_eq!(slugs.len(), DEFAULT_ROSTER.len());
        assert_eq!(default_roster().len(), 21);
    }

    #[test]
    fn test_image_mode_parse_and_default() {
        assert_eq!(ImageMode::default(), ImageMode::Base64);
        assert_eq!("url".parse::<ImageMode>().unwrap(), ImageMode::Url);
        assert_eq!("base64".parse::<ImageMode>().unwrap(), ImageMode::Base64);
        assert!("png".parse::<ImageMode>().is_err());
        assert_eq!(ImageMode::Url.to_string(), "url");
    }
}
