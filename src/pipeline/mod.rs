//! Receipt processing pipeline: fetch → OCR → extract → ledger → reply.

pub mod processor;
pub mod types;

pub use processor::{ProcessorDeps, ReceiptProcessor};
pub use types::{ExpenseRecord, ReceiptJob};
