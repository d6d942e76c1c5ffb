//! Settings at ~/.config/schoolcal/config.toml
//!
//! Layers, later wins: built-in defaults, the config file, then environment
//! variables prefixed `SCHOOLCAL__` (`SCHOOLCAL__PUBLISH__BRANCH=gh-pages`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{
    BASELINE_FILE, DEFAULT_MAX_INPUT_CHARS, EVENTS_FILE, LEDGER_FILE, LOCK_FILE, NOTICES_FILE,
    ROSTER_FILE, SNAPSHOT_FILE,
};
use crate::error::{SchoolCalError, SchoolCalResult};
use crate::retry::RetryConfig;
use crate::snapshot::UiDefaults;

static DEFAULT_DATA_DIR: &str = "~/schoolcal";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Drop directory for PDF attachments; `<data_dir>/inbox` when unset
    pub inbox_dir: Option<PathBuf>,

    /// Run log written alongside stderr
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub files: FileNames,
    #[serde(default)]
    pub school: SchoolSettings,
    #[serde(default)]
    pub publish: PublishSettings,
    #[serde(default)]
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub retention: RetentionSettings,
    #[serde(default)]
    pub ui: UiDefaults,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

/// File names inside `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNames {
    pub events: String,
    pub notices: String,
    pub roster: String,
    pub snapshot: String,
    pub ledger: String,
    pub baseline: String,
}

impl Default for FileNames {
    fn default() -> Self {
        FileNames {
            events: EVENTS_FILE.into(),
            notices: NOTICES_FILE.into(),
            roster: ROSTER_FILE.into(),
            snapshot: SNAPSHOT_FILE.into(),
            ledger: LEDGER_FILE.into(),
            baseline: BASELINE_FILE.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchoolSettings {
    /// IANA zone that decides which date is "today"
    pub timezone: String,
    /// Year assumed for extracted dates that omit one; the run year when unset
    pub default_year: Option<i32>,
}

impl Default for SchoolSettings {
    fn default() -> Self {
        SchoolSettings {
            timezone: "Europe/London".into(),
            default_year: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub enabled: bool,
    /// Git checkout the snapshot is published from; `data_dir` when unset
    pub repo_dir: Option<PathBuf>,
    pub remote: String,
    pub branch: String,
    /// Path of the snapshot inside the checkout
    pub file_name: String,
    /// Where the published copy can be read back over HTTP. When unset it
    /// is read from the remote branch with git.
    pub raw_url: Option<String>,
    pub commit_prefix: String,
    pub timeout: String,
}

impl Default for PublishSettings {
    fn default() -> Self {
        PublishSettings {
            enabled: true,
            repo_dir: None,
            remote: "origin".into(),
            branch: "main".into(),
            file_name: SNAPSHOT_FILE.into(),
            raw_url: None,
            commit_prefix: "Update calendar data".into(),
            timeout: "30s".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// OpenAI-compatible chat-completions URL
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_input_chars: usize,
    pub timeout: String,
    /// Bound on `pdftotext` runs
    pub tool_timeout: String,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        ExtractionSettings {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4.1-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            temperature: 0.1,
            max_tokens: 4000,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            timeout: "60s".into(),
            tool_timeout: "30s".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    /// Events dated before this are dropped at update time
    pub keep_from: Option<NaiveDate>,
}

impl Settings {
    pub fn default_config_path() -> SchoolCalResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SchoolCalError::Config("Could not determine config directory".into()))?
            .join("schoolcal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load settings from `path`, or from the default location. The default
    /// file is created with commented-out options when it doesn't exist yet.
    pub fn load(path: Option<&Path>) -> SchoolCalResult<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(SchoolCalError::Config(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => {
                let default = Self::default_config_path()?;
                if !default.exists() {
                    Self::create_default_config(&default)?;
                }
                default
            }
        };

        let settings: Settings = Config::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(
                Environment::with_prefix("SCHOOLCAL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SchoolCalError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SchoolCalError::Config(e.to_string()))?;

        settings.check()?;
        Ok(settings)
    }

    /// Settings rooted at `data_dir` with everything else defaulted.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Settings {
            data_dir: data_dir.into(),
            inbox_dir: None,
            log_file: None,
            files: FileNames::default(),
            school: SchoolSettings::default(),
            publish: PublishSettings::default(),
            extraction: ExtractionSettings::default(),
            retry: RetryConfig::default(),
            retention: RetentionSettings::default(),
            ui: UiDefaults::default(),
        }
    }

    fn check(&self) -> SchoolCalResult<()> {
        self.timezone()?;
        self.publish_timeout()?;
        self.extraction_timeout()?;
        self.tool_timeout()?;
        if self.extraction.max_input_chars == 0 {
            return Err(SchoolCalError::Config(
                "extraction.max_input_chars must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        expand(&self.data_dir)
    }

    pub fn inbox_dir(&self) -> PathBuf {
        match &self.inbox_dir {
            Some(dir) => expand(dir),
            None => self.data_dir().join("inbox"),
        }
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.log_file.as_deref().map(expand)
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir().join(&self.files.events)
    }

    pub fn notices_path(&self) -> PathBuf {
        self.data_dir().join(&self.files.notices)
    }

    pub fn roster_path(&self) -> PathBuf {
        self.data_dir().join(&self.files.roster)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir().join(&self.files.snapshot)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir().join(&self.files.ledger)
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.data_dir().join(&self.files.baseline)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir().join(LOCK_FILE)
    }

    pub fn repo_dir(&self) -> PathBuf {
        match &self.publish.repo_dir {
            Some(dir) => expand(dir),
            None => self.data_dir(),
        }
    }

    pub fn timezone(&self) -> SchoolCalResult<Tz> {
        self.school.timezone.parse::<Tz>().map_err(|_| {
            SchoolCalError::Config(format!("Unknown time zone '{}'", self.school.timezone))
        })
    }

    pub fn publish_timeout(&self) -> SchoolCalResult<Duration> {
        parse_duration("publish.timeout", &self.publish.timeout)
    }

    pub fn extraction_timeout(&self) -> SchoolCalResult<Duration> {
        parse_duration("extraction.timeout", &self.extraction.timeout)
    }

    pub fn tool_timeout(&self) -> SchoolCalResult<Duration> {
        parse_duration("extraction.tool_timeout", &self.extraction.tool_timeout)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> SchoolCalResult<()> {
        let contents = format!(
            "\
# schoolcal configuration

# Where events.json, notices.json, roster.toml and the snapshot live:
# data_dir = \"{DEFAULT_DATA_DIR}\"

# Drop directory for PDF attachments (defaults to <data_dir>/inbox):
# inbox_dir = \"~/schoolcal/inbox\"

# Also write the run log to this file:
# log_file = \"~/schoolcal/update.log\"

[school]
# timezone = \"Europe/London\"
# default_year = 2025

[publish]
# enabled = true
# repo_dir = \"~/src/schoolcalendar\"
# branch = \"main\"
# raw_url = \"https://raw.githubusercontent.com/<user>/<repo>/refs/heads/main/school_calendar_data.json\"
# timeout = \"30s\"

[extraction]
# model = \"gpt-4.1-mini\"
# api_key_env = \"OPENAI_API_KEY\"
# timeout = \"60s\"

[retry]
# max_retries = 3
# base_delay_ms = 1000

[retention]
# keep_from = \"2025-09-01\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SchoolCalError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| SchoolCalError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn parse_duration(key: &str, value: &str) -> SchoolCalResult<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| SchoolCalError::Config(format!("Invalid duration for {key} '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/srv/schoolcal"

[school]
timezone = "Europe/Paris"
default_year = 2025

[publish]
branch = "gh-pages"
timeout = "2m"

[retry]
max_retries = 5

[retention]
keep_from = "2025-09-01"
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.data_dir(), PathBuf::from("/srv/schoolcal"));
        assert_eq!(settings.events_path(), PathBuf::from("/srv/schoolcal/events.json"));
        assert_eq!(settings.inbox_dir(), PathBuf::from("/srv/schoolcal/inbox"));
        assert_eq!(settings.timezone().unwrap(), chrono_tz::Europe::Paris);
        assert_eq!(settings.publish.branch, "gh-pages");
        assert_eq!(settings.publish.remote, "origin");
        assert_eq!(settings.publish_timeout().unwrap(), Duration::from_secs(120));
        assert_eq!(settings.retry.max_retries, 5);
        assert_eq!(settings.retry.base_delay_ms, 1000);
        assert_eq!(
            settings.retention.keep_from,
            NaiveDate::from_ymd_opt(2025, 9, 1)
        );
        assert_eq!(settings.extraction.model, "gpt-4.1-mini");
        assert_eq!(settings.ui.current_tab, "Today");
    }

    #[test]
    fn test_missing_explicit_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_bad_timezone_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[school]\ntimezone = \"Mars/Olympus\"\n").unwrap();
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(SchoolCalError::Config(_))
        ));
    }

    #[test]
    fn test_default_config_is_all_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schoolcal").join("config.toml");
        Settings::create_default_config(&path).unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert!(settings.publish.enabled);
        assert_eq!(settings.extraction.max_input_chars, 8000);
    }

    #[test]
    fn test_log_file_is_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_file = \"~/schoolcal/update.log\"\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        let log_file = settings.log_file().unwrap();
        assert!(log_file.ends_with("schoolcal/update.log"));
        assert!(!log_file.starts_with("~"));

        assert_eq!(Settings::with_data_dir("/tmp/sc").log_file(), None);
    }

    #[test]
    fn test_repo_dir_defaults_to_data_dir() {
        let settings = Settings::with_data_dir("/tmp/sc");
        assert_eq!(settings.repo_dir(), PathBuf::from("/tmp/sc"));
        assert_eq!(settings.lock_path(), PathBuf::from("/tmp/sc/.schoolcal.lock"));
    }
}
