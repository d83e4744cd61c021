//! Google Cloud clients: service-account auth, Vision OCR, Sheets append.

pub mod auth;
pub mod sheets;
pub mod vision;

pub use auth::GoogleAuthenticator;
pub use sheets::SheetsClient;
pub use vision::VisionClient;
