//! Error types for the receipt relay.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Google auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Media fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Service-account credentials could not be loaded: {0}")]
    Credentials(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Google OAuth2 (service-account) errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid service-account key: {0}")]
    InvalidKey(String),

    #[error("Signing the JWT assertion failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
}

/// Image download errors.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Fetch of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// OCR service errors.
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("Vision request failed: {0}")]
    Request(String),

    #[error("Vision rejected the image: {message}")]
    Api { message: String },
}

/// Spreadsheet append errors.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Sheets request failed: {0}")]
    Request(String),

    #[error("Sheets append returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
}

/// Messaging-channel errors (Slack Web API, Twilio Messages API).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Request to {name} failed: {reason}")]
    Request { name: String, reason: String },

    #[error("{name} API refused the call: {reason}")]
    Api { name: String, reason: String },

    #[error("Failed to send reply on {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
