//! Herald configuration system.
//!
//! TOML file with serde defaults, overridable by the environment variables
//! the deployment surface injects (Cloud Run style). Precedence:
//! environment > file > defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HeraldError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HeraldConfig {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub sending: SendingConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl HeraldConfig {
    /// Load config from the default path, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("HERALD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HeraldError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| HeraldError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path (~/.herald/config.toml).
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Herald home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".herald")
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (testable seam).
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("SHEET_ID") {
            self.tracker.sheet_id = v;
        }
        if let Some(v) = get("SHEET_RANGE_IDENTITY") {
            self.tracker.identity_range = v;
        }
        if let Some(v) = get("SHEET_RANGE_STATE") {
            self.tracker.state_range = v;
        }
        if let Some(v) = get("GOOGLE_APPLICATION_CREDENTIALS") {
            self.tracker.credentials_path = v;
        }
        if let Some(v) = get("ENABLE_SENDING") {
            self.sending.enabled = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Some(v) = get("SENDER_EMAIL") {
            self.sending.sender = v;
        }
        if let Some(v) = get("SMTP_HOST") {
            self.smtp.host = v;
        }
        if let Some(v) = get("SMTP_PORT")
            && let Ok(port) = v.parse()
        {
            self.smtp.port = port;
        }
        if let Some(v) = get("SENDER_APP_PASSWORD") {
            self.smtp.password = v;
        }
        if let Some(v) = get("TEMPLATE_BASE_URL") {
            self.templates.base_url = v;
        }
        if let Some(v) = get("PORT")
            && let Ok(port) = v.parse()
        {
            self.gateway.port = port;
        }
    }
}

/// Tracker spreadsheet configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Spreadsheet identifier.
    #[serde(default)]
    pub sheet_id: String,
    /// A1 range for the identity columns (external owner).
    #[serde(default = "default_identity_range")]
    pub identity_range: String,
    /// A1 range for the four scheduling columns (owned by the engine).
    #[serde(default = "default_state_range")]
    pub state_range: String,
    /// Path to the service-account key file for the spreadsheet store.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
}

fn default_identity_range() -> String {
    "Sheet1!A:P".into()
}
fn default_state_range() -> String {
    "Sheet1!Q:T".into()
}
fn default_credentials_path() -> String {
    "service-account-key.json".into()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sheet_id: String::new(),
            identity_range: default_identity_range(),
            state_range: default_state_range(),
            credentials_path: default_credentials_path(),
        }
    }
}

/// Sending configuration. Absence of `enabled` means dry run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Sender address.
    #[serde(default)]
    pub sender: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

fn default_sender_name() -> String {
    "Onboarding Team".into()
}

impl Default for SendingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sender: String::new(),
            sender_name: default_sender_name(),
        }
    }
}

/// SMTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Bounded transport-level retry attempts per send.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_max_retries() -> u32 {
    3
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            max_retries: default_max_retries(),
        }
    }
}

/// Template store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Remote store base URL; templates fetched as `<base_url>/<name>`.
    /// Empty means local-only.
    #[serde(default)]
    pub base_url: String,
    /// Disk cache for downloaded templates.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Bundled fallback directory.
    #[serde(default = "default_local_dir")]
    pub local_dir: String,
}

fn default_cache_dir() -> String {
    "~/.herald/templates_cache".into()
}
fn default_local_dir() -> String {
    "templates".into()
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            cache_dir: default_cache_dir(),
            local_dir: default_local_dir(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Scheduling policy knobs: transition delays, retry backoff, display leads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Built-in poller interval; 0 = external trigger only.
    #[serde(default)]
    pub poll_interval_secs: u64,
    /// welcome -> compliance_reminder delay.
    #[serde(default = "default_compliance_delay")]
    pub compliance_delay_hours: i64,
    /// compliance_reminder -> password_setup_reminder delay.
    #[serde(default = "default_password_setup_delay")]
    pub password_setup_delay_hours: i64,
    /// password_setup_reminder -> hardware_followup delay.
    #[serde(default = "default_hardware_delay")]
    pub hardware_delay_hours: i64,
    /// Retry-in-place backoff after a failed send.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_minutes: i64,
    /// Compliance deadline shown in reminder mails, days from send time.
    #[serde(default = "default_compliance_deadline")]
    pub compliance_deadline_days: i64,
    /// Password-setup appointment lead shown in reminder mails.
    #[serde(default = "default_appointment_lead")]
    pub appointment_lead_hours: i64,
}

fn default_compliance_delay() -> i64 {
    72
}
fn default_password_setup_delay() -> i64 {
    24
}
fn default_hardware_delay() -> i64 {
    48
}
fn default_retry_backoff() -> i64 {
    30
}
fn default_compliance_deadline() -> i64 {
    7
}
fn default_appointment_lead() -> i64 {
    1
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 0,
            compliance_delay_hours: default_compliance_delay(),
            password_setup_delay_hours: default_password_setup_delay(),
            hardware_delay_hours: default_hardware_delay(),
            retry_backoff_minutes: default_retry_backoff(),
            compliance_deadline_days: default_compliance_deadline(),
            appointment_lead_hours: default_appointment_lead(),
        }
    }
}
