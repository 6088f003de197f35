use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use taskdraft::bot::{schema, Collaborators, Command, RecognitionQueue, SubmissionController, TelegramGateway};
use taskdraft::config::{BotConfig, ExtractorKind};
use taskdraft::google_auth::{ServiceAccountAuth, TokenSource};
use taskdraft::ocr::{GoogleVisionExtractor, TextExtractor};
use taskdraft::sheets::GoogleSheetsTaskSink;
use taskdraft::speech::GoogleSpeechTranscriber;

const DEFAULT_LOG_FILTER: &str = "taskdraft=info,teloxide=warn";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_extractor(
    config: &BotConfig,
    http: reqwest::Client,
    auth: Arc<dyn TokenSource>,
) -> Result<Arc<dyn TextExtractor>> {
    match config.extractor {
        ExtractorKind::Vision => Ok(Arc::new(GoogleVisionExtractor::new(
            http,
            auth,
            config.recovery.clone(),
            config.media_limits.clone(),
        ))),
        #[cfg(feature = "tesseract")]
        ExtractorKind::Tesseract => Ok(Arc::new(taskdraft::ocr::TesseractExtractor::new(
            taskdraft::ocr::TESSERACT_LANGUAGES,
            config.media_limits.clone(),
        ))),
        #[cfg(not(feature = "tesseract"))]
        ExtractorKind::Tesseract => Err(anyhow::anyhow!(
            "TEXT_EXTRACTOR=tesseract requires building with the `tesseract` feature"
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting task draft Telegram bot");

    let config = BotConfig::from_env()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()?;
    let auth: Arc<dyn TokenSource> = Arc::new(ServiceAccountAuth::from_json(
        &config.google_credentials_json,
        http.clone(),
    )?);

    let transcriber = Arc::new(GoogleSpeechTranscriber::new(
        http.clone(),
        Arc::clone(&auth),
        config.recovery.clone(),
        config.media_limits.clone(),
    ));
    let extractor = build_extractor(&config, http.clone(), Arc::clone(&auth))?;
    let tasks = Arc::new(GoogleSheetsTaskSink::new(
        http,
        auth,
        config.spreadsheet_id.clone(),
        config.sheet_range.clone(),
        &config.recovery,
    ));

    let bot = Bot::new(&config.bot_token);
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    let controller = Arc::new(SubmissionController::new(
        config.draft.clone(),
        Collaborators {
            gateway: Arc::new(TelegramGateway::new(bot.clone())),
            transcriber,
            extractor,
            tasks,
        },
    ));
    let queue = Arc::new(RecognitionQueue::start(
        Arc::clone(&controller),
        config.recognition_workers,
        config.recognition_queue_size,
    ));

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![controller, queue])
        .enable_ctrlc_handler()
        .build();

    match &config.webhook_url {
        Some(base_url) => {
            let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
            let url: reqwest::Url = format!("{base_url}/webhook").parse()?;
            info!(%addr, %url, "Starting in webhook mode");

            let listener = webhooks::axum(bot, webhooks::Options::new(addr, url)).await?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            info!("Starting in long polling mode");
            dispatcher.dispatch().await;
        }
    }

    Ok(())
}
