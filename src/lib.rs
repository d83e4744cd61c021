//! Reembolso Bot — receipt ingestion over Slack and WhatsApp.

pub mod channels;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod google;
pub mod pipeline;
pub mod server;
pub mod worker;
