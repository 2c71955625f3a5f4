use crate::schedule::Phase;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use url::Url;

pub const DEFAULT_DURATION_MINUTES: u32 = 10;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TTS_MODEL: &str = "tts-1";
pub const DEFAULT_TTS_VOICE: &str = "nova";
pub const DEFAULT_TICK_MS: u64 = 1000;
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";

const OPENAI_KEY_PREFIX: &str = "sk-";

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    Korean,
    English,
}

impl Locale {
    pub fn lang_tag(self) -> &'static str {
        match self {
            Locale::Korean => "ko-KR",
            Locale::English => "en-US",
        }
    }

    /// Short label shown next to the progress bar.
    pub fn phase_label(self, phase: Phase) -> &'static str {
        match (self, phase) {
            (Locale::Korean, Phase::Intro) => "시작",
            (Locale::Korean, Phase::Core) => "명상",
            (Locale::Korean, Phase::Outro) => "마무리",
            (Locale::English, Phase::Intro) => "Opening",
            (Locale::English, Phase::Core) => "Meditation",
            (Locale::English, Phase::Outro) => "Closing",
        }
    }

    /// Section name as it appears in script headers.
    pub fn section_name(self, phase: Phase) -> &'static str {
        match (self, phase) {
            (Locale::Korean, Phase::Intro) => "도입부",
            (Locale::Korean, Phase::Core) => "본 명상",
            (Locale::Korean, Phase::Outro) => "마무리",
            (Locale::English, Phase::Intro) => "Intro",
            (Locale::English, Phase::Core) => "Core",
            (Locale::English, Phase::Outro) => "Outro",
        }
    }

    pub fn empty_section_placeholder(self, phase: Phase) -> String {
        let section = self.section_name(phase);
        match self {
            Locale::Korean => format!("{section}에는 내용이 없습니다."),
            Locale::English => format!("The {section} section has no content."),
        }
    }
}

impl FromStr for Locale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ko" | "ko-kr" | "korean" => Ok(Locale::Korean),
            "en" | "en-us" | "en-gb" | "english" => Ok(Locale::English),
            other => Err(ConfigError::UnknownLocale(other.to_owned())),
        }
    }
}

/// Which synthesizer narrates the session.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TtsMode {
    /// Remote OpenAI speech, falling back to the live marker on quota exhaustion.
    #[default]
    OpenAi,
    Piper,
    Live,
    Off,
}

impl FromStr for TtsMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "remote" => Ok(TtsMode::OpenAi),
            "piper" | "local" => Ok(TtsMode::Piper),
            "live" | "browser" => Ok(TtsMode::Live),
            "off" | "none" => Ok(TtsMode::Off),
            other => Err(ConfigError::UnknownTtsMode(other.to_owned())),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into().trim().to_owned();
        if v.is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        if !v.starts_with(OPENAI_KEY_PREFIX) {
            return Err(ConfigError::MalformedApiKey);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub api_key: ApiKey,
    base_url: String,
    pub chat_model: String,
    pub tts_model: String,
    pub voice: String,
}

impl OpenAiConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_OPENAI_BASE_URL.to_owned(),
            chat_model: DEFAULT_CHAT_MODEL.to_owned(),
            tts_model: DEFAULT_TTS_MODEL.to_owned(),
            voice: DEFAULT_TTS_VOICE.to_owned(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        let url = parse_base_url(base_url)?;
        self.base_url = url.as_str().trim_end_matches('/').to_owned();
        Ok(self)
    }

    /// Base URL without a trailing slash, ready for `format!("{}/path")`.
    pub fn endpoint_root(&self) -> &str {
        &self.base_url
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidBaseUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::InvalidBaseUrl(format!(
            "{raw}: unsupported scheme {scheme}"
        ))),
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("api key must start with \"sk-\"")]
    MalformedApiKey,
    #[error("invalid base url {0}")]
    InvalidBaseUrl(String),
    #[error("name must not be empty")]
    EmptyName,
    #[error("duration must be > 0 minutes")]
    ZeroDuration,
    #[error("{phase} weight must be within (0, 1), got {value}")]
    InvalidWeight { phase: Phase, value: f64 },
    #[error("phase weights must sum to 1.0, got {sum}")]
    WeightSum { sum: f64 },
    #[error("a {seconds}s session is too short to hold three phases")]
    DurationTooShort { seconds: u32 },
    #[error("unknown weight policy {0:?}")]
    UnknownWeightPolicy(String),
    #[error("unknown locale {0:?}")]
    UnknownLocale(String),
    #[error("unknown tts mode {0:?}")]
    UnknownTtsMode(String),
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// CLI value wins over the environment. Blank values count as absent.
pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match resolve_optional_string(cli_value, env_key, env) {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => Ok(None),
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    resolve_optional_string(cli_value, env_key, env).unwrap_or_else(|| default.to_owned())
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    cli_value
        .filter(|v| !v.trim().is_empty())
        .or_else(|| env.var(env_key).filter(|v| !v.trim().is_empty()))
}
