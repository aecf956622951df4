use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ReportError, Result};
use crate::retry::RetryPolicy;

/// Document key of the spreadsheet receiving the report.
pub const DEFAULT_SHEET_KEY: &str = "16KUtHe-6R6Sd1HarFgS6Y2rEZGmUcM3ohAzPLy7Kxkg";
/// Worksheet receiving the raw report rows.
pub const DEFAULT_WORKSHEET: &str = "Git_Raw";
/// Company whose shipments are exported.
pub const DEFAULT_COMPANY_ID: i64 = 3;
pub const DEFAULT_COMPANY_NAME: &str = "Metal Trims";
/// Key file used when no base64 credentials are present in the environment.
pub const DEFAULT_CREDENTIALS_FILE: &str = "service_account.json";

/// Connection parameters for the business-application server.
#[derive(Clone)]
pub struct ServerConfig {
    pub url: String,
    pub db: String,
    pub username: String,
    pub password: String,
}

impl ServerConfig {
    /// Loads the connection parameters from the environment, reading a `.env`
    /// file from the working directory first when one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ReportError::MissingEnv(name))
        };

        Ok(Self {
            url: required("ODOO_URL")?.trim_end_matches('/').to_string(),
            db: required("ODOO_DB")?,
            username: required("ODOO_USERNAME")?,
            password: required("ODOO_PASSWORD")?,
        })
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the service-account key for the cloud export comes from.
#[derive(Clone)]
pub enum CredentialSource {
    /// Base64-encoded JSON key, as found in `GOOGLE_CREDS_BASE64`.
    Base64(String),
    /// Path to a JSON key file.
    File(PathBuf),
}

impl CredentialSource {
    /// Prefers `GOOGLE_CREDS_BASE64` and falls back to the given key file.
    pub fn from_env_or(file: PathBuf) -> Self {
        match env::var("GOOGLE_CREDS_BASE64") {
            Ok(encoded) if !encoded.trim().is_empty() => Self::Base64(encoded),
            _ => Self::File(file),
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64(_) => f.write_str("Base64(<redacted>)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Cloud worksheet the report is pushed to.
#[derive(Debug, Clone)]
pub struct SheetTarget {
    pub sheet_key: String,
    pub worksheet: String,
    pub credentials: CredentialSource,
}

/// Everything a single export run needs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub company_id: i64,
    pub company_name: String,
    pub output_dir: PathBuf,
    pub retry: RetryPolicy,
    /// `None` disables the cloud export.
    pub sheet: Option<SheetTarget>,
}

impl Settings {
    pub fn new(server: ServerConfig) -> Self {
        Self {
            server,
            company_id: DEFAULT_COMPANY_ID,
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            output_dir: PathBuf::from("."),
            retry: RetryPolicy::default(),
            sheet: None,
        }
    }

    pub fn with_retry(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.retry = RetryPolicy::new(max_retries, backoff);
        self
    }
}
