use std::sync::Arc;

use anyhow::Context;
use reembolso_bot::config::Config;
use reembolso_bot::context::AppContext;
use reembolso_bot::pipeline::ReceiptProcessor;
use reembolso_bot::server::{AppState, router};
use reembolso_bot::worker::WorkerPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Required: GOOGLE_SHEET_ID, SLACK_BOT_TOKEN, SLACK_SIGNING_SECRET,");
        eprintln!("            TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, TWILIO_WHATSAPP_NUMBER,");
        eprintln!("            GOOGLE_CREDENTIALS (or GOOGLE_APPLICATION_CREDENTIALS)");
        std::process::exit(1);
    });

    eprintln!("🧾 Reembolso Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Sheet: {}", config.spreadsheet_id);
    eprintln!("   Slack events: http://0.0.0.0:{}/slack/events", config.port);
    eprintln!("   WhatsApp webhook: http://0.0.0.0:{}/whatsapp/webhook", config.port);
    eprintln!(
        "   Workers: {} (queue capacity {})\n",
        config.worker_count, config.queue_capacity
    );

    let port = config.port;
    let worker_count = config.worker_count;
    let queue_capacity = config.queue_capacity;

    let ctx = AppContext::from_config(config);

    let processor = Arc::new(ReceiptProcessor::new(ctx.deps.clone()));
    let pool = WorkerPool::spawn(processor, worker_count, queue_capacity);

    let app = router(AppState {
        pool,
        slack_verifier: ctx.slack_verifier.clone(),
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    tracing::info!(port, "Webhook server started");
    axum::serve(listener, app).await.context("webhook server exited")?;

    Ok(())
}
