//! End-to-end webhook tests.
//!
//! Each test spins up the real Axum server on a random port with stub
//! vendor collaborators behind the pipeline seams, then exercises the
//! webhook contract over HTTP.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use reembolso_bot::channels::SignatureVerifier;
use reembolso_bot::error::{ChannelError, FetchError, OcrError, SheetError};
use reembolso_bot::pipeline::processor::{ProcessorDeps, ReceiptProcessor};
use reembolso_bot::pipeline::types::{
    LedgerAppender, MediaFetcher, SlackGateway, TextRecognizer, WhatsAppGateway,
};
use reembolso_bot::server::{AppState, router};
use reembolso_bot::worker::WorkerPool;

const SIGNING_SECRET: &str = "it-signing-secret";

/// Maximum time to wait for background pipeline effects.
const PIPELINE_WAIT: Duration = Duration::from_secs(2);

// ── Stub collaborators ──────────────────────────────────────────────

struct StubFetcher {
    fail: bool,
}

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn fetch(&self, url: &str, _bearer: Option<&str>) -> Result<Vec<u8>, FetchError> {
        if self.fail {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 500,
            });
        }
        Ok(vec![1, 2, 3])
    }
}

struct StubOcr {
    text: &'static str,
}

#[async_trait]
impl TextRecognizer for StubOcr {
    async fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.to_string())
    }
}

#[derive(Default)]
struct StubLedger {
    rows: Mutex<Vec<Vec<Value>>>,
}

#[async_trait]
impl LedgerAppender for StubLedger {
    async fn append_row(&self, row: Vec<Value>) -> Result<(), SheetError> {
        self.rows.lock().unwrap().push(row);
        Ok(())
    }
}

#[derive(Default)]
struct StubSlack {
    file_requests: Mutex<Vec<String>>,
    messages: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SlackGateway for StubSlack {
    async fn file_url(&self, file_id: &str) -> Result<String, ChannelError> {
        self.file_requests.lock().unwrap().push(file_id.to_string());
        Ok(format!("https://files.slack.test/{file_id}"))
    }
    async fn user_real_name(&self, _user_id: &str) -> Option<String> {
        Some("Maria Silva".to_string())
    }
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), ChannelError> {
        self.messages
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
    fn download_token(&self) -> String {
        "xoxb-test".to_string()
    }
}

#[derive(Default)]
struct StubWhatsApp {
    messages: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl WhatsAppGateway for StubWhatsApp {
    async fn send_message(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        self.messages
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    base_url: String,
    verifier: SignatureVerifier,
    ledger: Arc<StubLedger>,
    slack: Arc<StubSlack>,
    whatsapp: Arc<StubWhatsApp>,
    http: reqwest::Client,
}

impl Harness {
    async fn start(ocr_text: &'static str, fetch_fails: bool) -> Self {
        let ledger = Arc::new(StubLedger::default());
        let slack = Arc::new(StubSlack::default());
        let whatsapp = Arc::new(StubWhatsApp::default());

        let processor = Arc::new(ReceiptProcessor::new(ProcessorDeps {
            fetcher: Arc::new(StubFetcher { fail: fetch_fails }),
            ocr: Arc::new(StubOcr { text: ocr_text }),
            ledger: Arc::clone(&ledger) as Arc<dyn LedgerAppender>,
            slack: Arc::clone(&slack) as Arc<dyn SlackGateway>,
            whatsapp: Arc::clone(&whatsapp) as Arc<dyn WhatsAppGateway>,
        }));
        let pool = WorkerPool::spawn(processor, 2, 16);

        let verifier = SignatureVerifier::new(SecretString::from(SIGNING_SECRET));
        let app = router(AppState {
            pool,
            slack_verifier: verifier.clone(),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting connections.
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            verifier,
            ledger,
            slack,
            whatsapp,
            http: reqwest::Client::new(),
        }
    }

    /// POST a signed Slack event.
    async fn post_slack(&self, body: &str) -> reqwest::Response {
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = self.verifier.sign(&ts, body);
        self.post_slack_raw(body, &ts, &sig).await
    }

    async fn post_slack_raw(&self, body: &str, ts: &str, sig: &str) -> reqwest::Response {
        self.http
            .post(format!("{}/slack/events", self.base_url))
            .header("content-type", "application/json")
            .header("x-slack-request-timestamp", ts)
            .header("x-slack-signature", sig)
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }

    async fn post_whatsapp(&self, form: &[(&str, &str)]) -> reqwest::Response {
        self.http
            .post(format!("{}/whatsapp/webhook", self.base_url))
            .form(form)
            .send()
            .await
            .unwrap()
    }

    /// Wait until `check` observes the background pipeline's effect.
    async fn wait_for(&self, mut check: impl FnMut() -> bool) {
        timeout(PIPELINE_WAIT, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("pipeline effect did not appear in time");
    }
}

fn file_shared_event(file_id: &str) -> String {
    json!({
        "type": "event_callback",
        "event": {
            "type": "file_shared",
            "file_id": file_id,
            "channel_id": "C456",
            "user_id": "U789"
        }
    })
    .to_string()
}

// ── Liveness ────────────────────────────────────────────────────────

#[tokio::test]
async fn liveness_answers_without_auth() {
    let h = Harness::start("", false).await;
    let resp = h.http.get(&h.base_url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Bot de Reembolso está online!");
}

// ── Slack webhook ───────────────────────────────────────────────────

#[tokio::test]
async fn signed_file_shared_event_lands_a_ledger_row() {
    let h = Harness::start("Total R$ 45,90 Data 01/04/2024", false).await;

    let resp = h.post_slack(&file_shared_event("F123")).await;
    assert_eq!(resp.status(), 200);

    h.wait_for(|| !h.ledger.rows.lock().unwrap().is_empty()).await;

    let rows = h.ledger.rows.lock().unwrap();
    assert_eq!(
        rows[0],
        vec![
            Value::from("01/04/2024"),
            Value::from("Maria Silva"),
            Value::from(45.90),
            Value::from("Não encontrado"),
            Value::from("Total R$ 45,90 Data 01/04/2024"),
            Value::from("Aguardando"),
            Value::from("https://files.slack.test/F123"),
        ]
    );
    drop(rows);

    h.wait_for(|| !h.slack.messages.lock().unwrap().is_empty()).await;
    let messages = h.slack.messages.lock().unwrap();
    assert_eq!(messages[0].0, "C456");
    assert!(messages[0].1.contains("Processado!"));
}

#[tokio::test]
async fn invalid_signature_is_rejected_with_403_and_no_work() {
    let h = Harness::start("Total R$ 45,90", false).await;

    let body = file_shared_event("F123");
    let ts = chrono::Utc::now().timestamp().to_string();
    let resp = h.post_slack_raw(&body, &ts, "v0=deadbeef").await;
    assert_eq!(resp.status(), 403);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.ledger.rows.lock().unwrap().is_empty());
    assert!(h.slack.file_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn url_verification_challenge_is_echoed() {
    let h = Harness::start("", false).await;

    let body = json!({ "type": "url_verification", "challenge": "ch4ll" }).to_string();
    let resp = h.post_slack(&body).await;
    assert_eq!(resp.status(), 200);
    let echoed: Value = resp.json().await.unwrap();
    assert_eq!(echoed["challenge"], "ch4ll");
}

#[tokio::test]
async fn unrelated_event_types_are_acknowledged_without_action() {
    let h = Harness::start("", false).await;

    let body = json!({
        "type": "event_callback",
        "event": { "type": "message", "channel_id": "C1", "user_id": "U1" }
    })
    .to_string();
    let resp = h.post_slack(&body).await;
    assert_eq!(resp.status(), 200);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.ledger.rows.lock().unwrap().is_empty());
}

// ── WhatsApp webhook ────────────────────────────────────────────────

#[tokio::test]
async fn whatsapp_media_lands_a_ledger_row() {
    let h = Harness::start("Total R$ 45,90 Data 01/04/2024", false).await;

    let resp = h
        .post_whatsapp(&[
            ("Body", ""),
            ("From", "whatsapp:+5511987654321"),
            ("MediaUrl0", "https://api.twilio.test/media/1"),
        ])
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/xml"
    );
    let xml = resp.text().await.unwrap();
    assert!(xml.contains("<Response></Response>"));

    h.wait_for(|| !h.ledger.rows.lock().unwrap().is_empty()).await;
    let rows = h.ledger.rows.lock().unwrap();
    assert_eq!(rows[0][1], "+5511987654321");
    drop(rows);

    h.wait_for(|| !h.whatsapp.messages.lock().unwrap().is_empty()).await;
    let messages = h.whatsapp.messages.lock().unwrap();
    assert_eq!(messages[0].0, "whatsapp:+5511987654321");
    assert!(messages[0].1.contains("Processado!"));
}

#[tokio::test]
async fn whatsapp_without_media_gets_instructions_and_no_work() {
    let h = Harness::start("", false).await;

    let resp = h
        .post_whatsapp(&[("Body", "oi"), ("From", "whatsapp:+5511987654321")])
        .await;
    assert_eq!(resp.status(), 200);
    let xml = resp.text().await.unwrap();
    assert!(xml.contains("envie a foto do seu comprovante"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.ledger.rows.lock().unwrap().is_empty());
    assert!(h.whatsapp.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_download_reports_error_to_sender_without_ledger_write() {
    let h = Harness::start("irrelevant", true).await;

    let resp = h
        .post_whatsapp(&[
            ("Body", ""),
            ("From", "whatsapp:+5511987654321"),
            ("MediaUrl0", "https://api.twilio.test/media/broken"),
        ])
        .await;
    assert_eq!(resp.status(), 200);

    h.wait_for(|| !h.whatsapp.messages.lock().unwrap().is_empty()).await;
    let messages = h.whatsapp.messages.lock().unwrap();
    assert!(messages[0].1.contains("Ops! Houve um erro"));
    assert!(messages[0].1.contains("500"));
    drop(messages);

    assert!(h.ledger.rows.lock().unwrap().is_empty());
}
