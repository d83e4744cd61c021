//! Messaging channel clients.

pub mod slack;
pub mod twilio;

pub use slack::{SignatureVerifier, SlackClient};
pub use twilio::TwilioClient;
