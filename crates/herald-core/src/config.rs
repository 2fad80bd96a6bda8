//! Herald configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HeraldError, Result};
use crate::types::NotificationKind;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default = "default_status_table")]
    pub status_table: Vec<StatusMapping>,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub orders: OrdersConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            scheduler: SchedulerConfig::default(),
            ledger: LedgerConfig::default(),
            status_table: default_status_table(),
            email: EmailConfig::default(),
            orders: OrdersConfig::default(),
            reminders: RemindersConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl HeraldConfig {
    /// Load config from the default path (~/.herald/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HeraldError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| HeraldError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Replace credentials from `HERALD_EMAIL` / `HERALD_EMAIL_PASSWORD` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(email) = std::env::var("HERALD_EMAIL")
            && !email.is_empty()
        {
            self.email.account = email;
        }
        if let Ok(password) = std::env::var("HERALD_EMAIL_PASSWORD")
            && !password.is_empty()
        {
            self.email.password = password;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.dispatch.rate_limit_batch_size == 0 {
            return Err(HeraldError::Config(
                "dispatch.rate_limit_batch_size must be at least 1".into(),
            ));
        }
        if !(0.0..=MAX_PAUSE_SECS).contains(&self.dispatch.rate_limit_pause_secs) {
            return Err(HeraldError::Config(format!(
                "dispatch.rate_limit_pause_secs must be between 0 and {MAX_PAUSE_SECS}"
            )));
        }
        if !(0.0..=MAX_TRAILING_OFFSET_MINUTES).contains(&self.scheduler.trailing_offset_minutes) {
            return Err(HeraldError::Config(format!(
                "scheduler.trailing_offset_minutes must be between 0 and {MAX_TRAILING_OFFSET_MINUTES}"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for mapping in &self.status_table {
            if !seen.insert(mapping.status.trim().to_lowercase()) {
                return Err(HeraldError::Config(format!(
                    "status '{}' is mapped more than once",
                    mapping.status
                )));
            }
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Herald home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".herald")
    }
}

/// One day.
const MAX_PAUSE_SECS: f64 = 86_400.0;
/// One week.
const MAX_TRAILING_OFFSET_MINUTES: f64 = 10_080.0;

/// Dispatcher throughput limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Pause after this many consecutive successful sends.
    #[serde(default = "default_batch_size")]
    pub rate_limit_batch_size: usize,
    #[serde(default = "default_pause_secs")]
    pub rate_limit_pause_secs: f64,
}

fn default_batch_size() -> usize { 5 }
fn default_pause_secs() -> f64 { 2.0 }

impl DispatchConfig {
    pub fn pause(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.rate_limit_pause_secs.max(0.0))
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rate_limit_batch_size: default_batch_size(),
            rate_limit_pause_secs: default_pause_secs(),
        }
    }
}

/// Deferred scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Gap between the last reminder and the "batch complete" message.
    #[serde(default = "default_trailing_offset")]
    pub trailing_offset_minutes: f64,
}

fn default_trailing_offset() -> f64 { 5.0 }

impl SchedulerConfig {
    pub fn trailing_offset(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.trailing_offset_minutes.max(0.0) * 60_000.0) as i64)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { trailing_offset_minutes: default_trailing_offset() }
    }
}

/// Which ledger backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    File,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_backend")]
    pub backend: LedgerBackend,
    /// Backing file; `~` is expanded.
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

fn default_ledger_backend() -> LedgerBackend { LedgerBackend::File }
fn default_ledger_path() -> String { "~/.herald/sent_notifications.jsonl".into() }

impl LedgerConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: default_ledger_backend(),
            path: default_ledger_path(),
        }
    }
}

/// Logging outputs beyond stdout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Also append log lines to this file (`~` is expanded).
    #[serde(default)]
    pub file: Option<String>,
}

impl LogConfig {
    pub fn resolved_file(&self) -> Option<PathBuf> {
        self.file
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| PathBuf::from(shellexpand::tilde(f).to_string()))
    }
}

/// One row of the status→kind table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMapping {
    pub status: String,
    pub kind: NotificationKind,
}

impl StatusMapping {
    pub fn new(status: &str, kind: NotificationKind) -> Self {
        Self { status: status.to_string(), kind }
    }
}

pub fn default_status_table() -> Vec<StatusMapping> {
    vec![
        StatusMapping::new("new", NotificationKind::Confirmation),
        StatusMapping::new("shipped", NotificationKind::Shipping),
        StatusMapping::new("delivered", NotificationKind::Delivery),
    ]
}

/// Outgoing SMTP account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Sender address, also the SMTP login.
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

fn default_smtp_host() -> String { "smtp.gmail.com".into() }
fn default_smtp_port() -> u16 { 587 }
fn default_display_name() -> String { "Amazing Store".into() }
fn default_smtp_timeout() -> u64 { 30 }

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            account: String::new(),
            password: String::new(),
            display_name: default_display_name(),
            timeout_secs: default_smtp_timeout(),
        }
    }
}

/// Where order rows come from and which columns matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersConfig {
    /// `http(s)://` URL or local path of the orders CSV.
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_status_column")]
    pub status_column: String,
    #[serde(default = "default_recipient_column")]
    pub recipient_column: String,
}

fn default_id_column() -> String { "order_id".into() }
fn default_status_column() -> String { "status".into() }
fn default_recipient_column() -> String { "customer_email".into() }

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            id_column: default_id_column(),
            status_column: default_status_column(),
            recipient_column: default_recipient_column(),
        }
    }
}

/// Where events come from and who gets the reminders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default)]
    pub source: String,
    /// Reminder recipient; empty means the sending account itself.
    #[serde(default)]
    pub receiver: String,
    #[serde(default = "default_receiver_name")]
    pub receiver_name: String,
    #[serde(default = "default_reminder_sender_name")]
    pub sender_name: String,
}

fn default_receiver_name() -> String { "Event Participant".into() }
fn default_reminder_sender_name() -> String { "Event Reminder".into() }

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            receiver: String::new(),
            receiver_name: default_receiver_name(),
            sender_name: default_reminder_sender_name(),
        }
    }
}
