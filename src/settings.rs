use std::path::PathBuf;

use anyhow::{Context, Result};
use config::Config;

const BASE_URL: &str = "https://www.dhammadownload.com";
const DEFAULT_DB_PATH: &str = "data/dhamma_dataset.sqlite";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; DhammaCatalog/1.0; Educational Purpose)";

/// Which kind of media an index page lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Audio,
    Video,
    Ebook,
    /// Mixed pages: every media type is kept.
    Abhidhamma,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Audio => "audio",
            Section::Video => "video",
            Section::Ebook => "ebook",
            Section::Abhidhamma => "abhidhamma",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Section::Audio => "Audio",
            Section::Video => "Video",
            Section::Ebook => "EBook",
            Section::Abhidhamma => "Abhidhamma",
        }
    }

    pub fn parse(s: &str) -> Option<Section> {
        match s {
            "audio" => Some(Section::Audio),
            "video" => Some(Section::Video),
            "ebook" => Some(Section::Ebook),
            "abhidhamma" => Some(Section::Abhidhamma),
            _ => None,
        }
    }
}

/// One category index page to crawl.
#[derive(Debug, Clone)]
pub struct CategoryTarget {
    pub key: String,
    pub url: String,
    pub section: Section,
    pub language: String,
}

impl CategoryTarget {
    fn new(key: &str, path: &str, section: Section, language: &str) -> Self {
        CategoryTarget {
            key: key.to_string(),
            url: format!("{}/{}", BASE_URL, path),
            section,
            language: language.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub targets: Vec<CategoryTarget>,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Pause between consecutive requests.
    pub request_delay_ms: u64,
    pub max_retries: u32,
    pub db_path: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig {
            targets: vec![
                CategoryTarget::new("audioEnglish", "AudioInEnglish.htm", Section::Audio, "english"),
                CategoryTarget::new("audioMyanmar", "AudioInMyanmar.htm", Section::Audio, "myanmar"),
                CategoryTarget::new("videoEnglish", "VideoInEnglish.htm", Section::Video, "english"),
                CategoryTarget::new("videoMyanmar", "VideoInMyanmar.htm", Section::Video, "myanmar"),
                CategoryTarget::new("ebookEnglish", "eBook-English.htm", Section::Ebook, "english"),
                CategoryTarget::new("ebookMyanmar", "eBook-Myanmar.htm", Section::Ebook, "myanmar"),
                CategoryTarget::new(
                    "abhidhammaEnglish",
                    "AbhidhammaInEnglish.htm",
                    Section::Abhidhamma,
                    "english",
                ),
                CategoryTarget::new(
                    "abhidhammaMyanmar",
                    "AbhidhammaInMyanmar.htm",
                    Section::Abhidhamma,
                    "myanmar",
                ),
            ],
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            request_delay_ms: 500,
            max_retries: 3,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl ScrapeConfig {
    /// Defaults overlaid with `DHAMMA_*` environment variables
    /// (`DHAMMA_USER_AGENT`, `DHAMMA_TIMEOUT_SECS`, `DHAMMA_REQUEST_DELAY_MS`,
    /// `DHAMMA_MAX_RETRIES`, `DHAMMA_DB_PATH`).
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(config::Environment::with_prefix("DHAMMA"))
            .build()
            .context("Failed to read DHAMMA_* settings")?;
        Self::from_settings(&settings)
    }

    fn from_settings(settings: &Config) -> Result<Self> {
        let mut cfg = ScrapeConfig::default();
        if let Ok(ua) = settings.get_string("user_agent") {
            cfg.user_agent = ua;
        }
        if let Ok(p) = settings.get_string("db_path") {
            cfg.db_path = PathBuf::from(p);
        }
        if let Some(v) = get_u64(settings, "timeout_secs")? {
            cfg.timeout_secs = v;
        }
        if let Some(v) = get_u64(settings, "request_delay_ms")? {
            cfg.request_delay_ms = v;
        }
        if let Some(v) = get_u64(settings, "max_retries")? {
            cfg.max_retries = u32::try_from(v).context("max_retries out of range")?;
        }
        Ok(cfg)
    }
}

fn get_u64(settings: &Config, key: &str) -> Result<Option<u64>> {
    match settings.get_int(key) {
        Ok(v) => Ok(Some(
            u64::try_from(v).with_context(|| format!("{} must not be negative", key))?,
        )),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Invalid value for {}", key)),
    }
}
