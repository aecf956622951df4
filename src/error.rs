use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Error type covering the different failure cases that can occur while the
/// report is fetched from the server, transformed, or exported.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Wrapper for IO failures such as reading credentials or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport failures and non-success HTTP statuses.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Raised when base64-encoded credentials cannot be decoded.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Raised when the service-account token cannot be obtained.
    #[error("OAuth error: {0}")]
    OAuth(#[from] yup_oauth2::Error),

    /// Raised when a required environment variable is unset or empty.
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    /// Raised when the server does not hand back a user id on login.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// Raised when a session-scoped call is made before logging in.
    #[error("user not logged in yet")]
    NotLoggedIn,

    /// Raised when a response does not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Raised when the service-account key is unusable.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Raised when the target spreadsheet has no worksheet with the given title.
    #[error("worksheet '{0}' not found")]
    WorksheetNotFound(String),

    /// Raised when the Sheets API answers with an error status.
    #[error("Sheets API error ({status}): {message}")]
    SheetsApi { status: u16, message: String },

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
