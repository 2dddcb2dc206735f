// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use lms_backend::config::{self, Config};
use lms_backend::consumers::{CertificateIssuer, Notifier};
use lms_backend::email::HttpEmailSender;
use lms_backend::events::{EventBus, InProcessEventBus};
use lms_backend::models::notification::{TYPE_ATTEMPT, TYPE_COMPLETION};
use lms_backend::objects::ObjectStoreBlobs;
use lms_backend::pdf::PdfCertificateRenderer;
use lms_backend::routes;
use lms_backend::state::AppState;
use lms_backend::store::{PgRecordStore, RecordStore, StoreError, collections};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool));

    // Seed default email templates
    if let Err(e) = seed_email_templates(store.as_ref()).await {
        tracing::error!("Failed to seed email templates: {:?}", e);
    }

    // Wire the collaborators the consumers depend on
    std::fs::create_dir_all(&config.object_store_root)
        .expect("Failed to create object store root directory");
    let blobs = Arc::new(
        ObjectStoreBlobs::local(&config.object_store_root, config.public_base_url.clone())
            .expect("Failed to open object store root"),
    );
    let mailer = Arc::new(
        HttpEmailSender::new(config.email_api_url.clone(), config.email_from.clone())
            .expect("Failed to build email sender"),
    );
    let renderer = Arc::new(PdfCertificateRenderer::new());

    // Subscribe both consumers independently; one crashing must never
    // block the other.
    let bus = Arc::new(InProcessEventBus::default());
    bus.subscribe(
        config::COURSE_COMPLETED_TOPIC,
        Arc::new(CertificateIssuer::new(store.clone(), blobs, renderer)),
    );
    bus.subscribe(
        config::COURSE_COMPLETED_TOPIC,
        Arc::new(Notifier::new(store.clone(), mailer)),
    );

    // Create AppState
    let state = AppState {
        store,
        bus,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

/// Makes sure both notification templates exist so the notifier has
/// something to render on a fresh database.
async fn seed_email_templates(store: &dyn RecordStore) -> Result<(), StoreError> {
    let defaults = [
        (
            TYPE_COMPLETION,
            "Congratulations {{name}}, you completed {{course}}!",
            "<h1>Congratulations {{name}}!</h1>\
             <p>You completed <b>{{course}}</b> with a score of {{score}}% on {{date}}.</p>\
             <p>Your certificate is on its way.</p>",
        ),
        (
            TYPE_ATTEMPT,
            "Your {{course}} exam results",
            "<h1>Keep going, {{name}}!</h1>\
             <p>You scored {{score}}% on the {{course}} exam on {{date}}. \
             You can try again whenever you are ready.</p>",
        ),
    ];

    for (template_type, subject, content) in defaults {
        let existing = store
            .find(collections::EMAIL_TEMPLATES, &json!({ "type": template_type }))
            .await?;
        if existing.is_empty() {
            tracing::info!(template_type, "seeding default email template");
            store
                .create(
                    collections::EMAIL_TEMPLATES,
                    json!({
                        "type": template_type,
                        "subject": subject,
                        "content": content,
                    }),
                )
                .await?;
        }
    }
    Ok(())
}
