//! Amount/date extraction from OCR text.
//!
//! Pure heuristics — no I/O, no state. Receipts are noisy, so unmatched
//! fields degrade to `None` (rendered as sentinels downstream) instead of
//! erroring.

use std::sync::LazyLock;

use regex::Regex;

/// Sentinel cell for a field that could not be extracted.
pub const NOT_FOUND: &str = "Não encontrado";
/// Date uses the feminine form in the sheet and replies.
pub const DATE_NOT_FOUND: &str = "Não encontrada";

/// `R$ 1.234,56` — Brazilian grouping, comma decimal, mandatory prefix.
static AMOUNT_BRL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)R\$\s*(\d{1,3}(?:\.\d{3})*,\d{2})").unwrap());

/// `1,234.56` — comma grouping, dot decimal, no currency prefix.
static AMOUNT_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}(?:,\d{3})*\.\d{2}").unwrap());

/// `DD/MM/YYYY`, `DD-MM-YYYY` or `YYYY-MM-DD` (`/` and `-` accepted in both).
/// Day/month ranges are deliberately not validated.
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}[-/]\d{2}[-/]\d{4}|\d{4}[-/]\d{2}[-/]\d{2}").unwrap());

/// Fields extracted from a receipt's OCR text.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseFields {
    /// First recognizable date substring, as written on the receipt.
    pub date: Option<String>,
    /// Monetary amount, normalized to a plain float.
    pub amount: Option<f64>,
    /// Merchant extraction is not implemented; always `None`.
    pub merchant: Option<String>,
    /// The trimmed OCR text, kept whole as the row description.
    pub description: String,
}

impl ExpenseFields {
    /// Date for display/ledger, sentinel when absent.
    pub fn date_label(&self) -> &str {
        self.date.as_deref().unwrap_or(DATE_NOT_FOUND)
    }

    /// Merchant for display/ledger, sentinel when absent (always, today).
    pub fn merchant_label(&self) -> &str {
        self.merchant.as_deref().unwrap_or(NOT_FOUND)
    }

    /// Amount for display, sentinel when absent.
    pub fn amount_label(&self) -> String {
        match self.amount {
            Some(v) => format!("{v:.2}"),
            None => NOT_FOUND.to_string(),
        }
    }
}

/// Extract best-effort expense fields from OCR text.
///
/// Amount precedence: the two amount patterns are matched independently and
/// the earlier match in the text wins; when both match at the same offset the
/// `R$` pattern wins. The `R$` form normalizes `1.234,56` → `1234.56`; the
/// bare form strips comma grouping from `1,234.56`.
pub fn parse_expense_text(text: &str) -> ExpenseFields {
    ExpenseFields {
        date: DATE.find(text).map(|m| m.as_str().to_string()),
        amount: parse_amount(text),
        merchant: None,
        description: text.trim().to_string(),
    }
}

fn parse_amount(text: &str) -> Option<f64> {
    let brl = AMOUNT_BRL.captures(text);
    let plain = AMOUNT_PLAIN.find(text);

    let normalized = match (&brl, &plain) {
        (Some(b), Some(p)) => {
            // Ties go to the R$ pattern.
            if b.get(0).unwrap().start() <= p.start() {
                normalize_brl(&b[1])
            } else {
                normalize_plain(p.as_str())
            }
        }
        (Some(b), None) => normalize_brl(&b[1]),
        (None, Some(p)) => normalize_plain(p.as_str()),
        (None, None) => return None,
    };

    normalized.parse().ok()
}

fn normalize_brl(raw: &str) -> String {
    raw.replace('.', "").replace(',', ".")
}

fn normalize_plain(raw: &str) -> String {
    raw.replace(',', "")
}
