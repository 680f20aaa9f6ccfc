use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
const MIN_REQUEST_TIMEOUT_S: f64 = 5.0;
const MAX_REQUEST_TIMEOUT_S: f64 = 600.0;

/// Process-wide settings resolved from the environment.
///
/// | variable | meaning |
/// |---|---|
/// | `GEMINI_API_KEY`, `GOOGLE_API_KEY`, `API_KEY` | API key, first non-empty wins |
/// | `GEMINI_API_BASE` | REST base URL |
/// | `STUDIO_HOME` | directory for history and events (default `$HOME/.studio`) |
/// | `STUDIO_PROVIDER` | force a provider (`imagen`, `gemini`, `dryrun`) |
/// | `STUDIO_IMAGE_MODEL`, `STUDIO_EDIT_MODEL` | preferred models |
/// | `STUDIO_REQUEST_TIMEOUT` | HTTP timeout in seconds |
#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub data_dir: PathBuf,
    pub provider: Option<String>,
    pub image_model: Option<String>,
    pub edit_model: Option<String>,
    pub request_timeout: Duration,
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("GOOGLE_API_KEY"))
            .or_else(|| non_empty("API_KEY"));
        let api_base = non_empty("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let data_dir = non_empty("STUDIO_HOME")
            .map(PathBuf::from)
            .or_else(|| non_empty("HOME").map(|home| Path::new(&home).join(".studio")))
            .unwrap_or_else(|| PathBuf::from(".studio"));
        let request_timeout_s = non_empty("STUDIO_REQUEST_TIMEOUT")
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
            .clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S);

        Self {
            api_key,
            api_base,
            data_dir,
            provider: non_empty("STUDIO_PROVIDER").map(|value| value.to_ascii_lowercase()),
            image_model: non_empty("STUDIO_IMAGE_MODEL"),
            edit_model: non_empty("STUDIO_EDIT_MODEL"),
            request_timeout: Duration::from_secs_f64(request_timeout_s),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        if let Some(provider) = provider
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
        {
            self.provider = Some(provider);
        }
        self
    }

    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{StudioConfig, DEFAULT_API_BASE};

    fn config_from(pairs: &[(&str, &str)]) -> StudioConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        StudioConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.api_key, None);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.data_dir, PathBuf::from(".studio"));
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(config.provider, None);
    }

    #[test]
    fn api_key_precedence_skips_blank_values() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "  "),
            ("GOOGLE_API_KEY", "google"),
            ("API_KEY", "plain"),
        ]);
        assert_eq!(config.api_key.as_deref(), Some("google"));

        let config = config_from(&[("API_KEY", "plain")]);
        assert_eq!(config.api_key.as_deref(), Some("plain"));
    }

    #[test]
    fn data_dir_prefers_studio_home_then_home() {
        let config = config_from(&[("STUDIO_HOME", "/srv/studio"), ("HOME", "/home/u")]);
        assert_eq!(config.data_dir, PathBuf::from("/srv/studio"));
        assert_eq!(config.storage_path(), PathBuf::from("/srv/studio/history.json"));

        let config = config_from(&[("HOME", "/home/u")]);
        assert_eq!(config.data_dir, PathBuf::from("/home/u/.studio"));
        assert_eq!(config.events_path(), PathBuf::from("/home/u/.studio/events.jsonl"));
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let config = config_from(&[("GEMINI_API_BASE", "http://localhost:8080/v1beta/")]);
        assert_eq!(config.api_base, "http://localhost:8080/v1beta");
    }

    #[test]
    fn timeout_is_parsed_and_clamped() {
        let config = config_from(&[("STUDIO_REQUEST_TIMEOUT", "30")]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        let config = config_from(&[("STUDIO_REQUEST_TIMEOUT", "1")]);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        let config = config_from(&[("STUDIO_REQUEST_TIMEOUT", "soon")]);
        assert_eq!(config.request_timeout, Duration::from_secs(90));
    }

    #[test]
    fn provider_override_is_normalized() {
        let config = config_from(&[("STUDIO_PROVIDER", "Gemini")]);
        assert_eq!(config.provider.as_deref(), Some("gemini"));
        let config = config.with_provider(Some(" DRYRUN ".to_string()));
        assert_eq!(config.provider.as_deref(), Some("dryrun"));
        let config = config.with_provider(None);
        assert_eq!(config.provider.as_deref(), Some("dryrun"));
    }
}
