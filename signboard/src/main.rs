use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use signboard::api::{create_router, AppState};
use signboard::batch::BatchScanner;
use signboard::config::Config;
use signboard::error::SignboardError;
use signboard::language::{resolve_source, resolve_target, SUPPORTED_LANGUAGES};
use signboard::ocr::{OcrEngine, OcrProvider};
use signboard::pipeline::{Pipeline, PipelineRequest};
use signboard::speech::{play_in_background, SystemAudioPlayer};

#[derive(Parser)]
#[command(name = "signboard")]
#[command(about = "Read a sign from a photo, translate it, and speak the translation")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// OCR and translate a single image from disk
    Read {
        image: PathBuf,
        /// Target language name or code
        #[arg(short, long = "lang")]
        target: Option<String>,
        /// Source language hint; detected when omitted
        #[arg(short, long)]
        source: Option<String>,
        /// Synthesize the translation and play it
        #[arg(long)]
        speak: bool,
    },
    /// OCR every image in a directory and pull out the configured field
    Scan {
        dir: PathBuf,
        /// Skip writing searchable PDFs next to the images
        #[arg(long)]
        no_pdf: bool,
    },
    /// Verify the OCR engine and list supported languages
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env();

    tracing::info!("Initializing OCR provider: {}...", config.ocr.model);
    let ocr = OcrProvider::new(&config.ocr)?;
    if !ocr.is_available() {
        tracing::warn!("OCR unavailable - image requests will fail until Tesseract is installed");
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, ocr).await,
        Command::Read {
            image,
            target,
            source,
            speak,
        } => read(config, ocr, image, target, source, speak).await,
        Command::Scan { dir, no_pdf } => scan(config, ocr, dir, !no_pdf).await,
        Command::Check => check(&ocr),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "signboard=info,tower_http=debug".into());

    let fmt_layer = if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn serve(config: Config, ocr: OcrProvider) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, ocr)?;
    tracing::info!(
        "Translation provider: {}, speech provider: {}",
        state.pipeline.translator_name(),
        state.pipeline.synthesizer_name()
    );

    let app = create_router(state);

    tracing::info!("Signboard starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/health", addr);
    tracing::info!("  API docs:     http://{}/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn read(
    config: Config,
    ocr: OcrProvider,
    image: PathBuf,
    target: Option<String>,
    source: Option<String>,
    speak: bool,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&image).await?;
    let target = resolve_target(
        target
            .as_deref()
            .unwrap_or(&config.translation.default_target),
    )?;
    let request = PipelineRequest {
        source: resolve_source(source.as_deref()),
        target,
        synthesize: speak,
    };

    let pipeline = Pipeline::from_config(&config, Arc::new(ocr))?;
    let output = match pipeline.run(bytes, &request).await {
        Ok(output) => output,
        Err(failure) => {
            if matches!(failure.error, SignboardError::NoTextDetected) {
                print_ocr_hints(&config);
            }
            if let Some(text) = &failure.partial.original_text {
                println!("Original text:\n{text}\n");
            }
            return Err(failure.into());
        }
    };

    if let Some(extraction) = &output.extraction {
        println!("Original text ({}):\n{}\n", extraction.profile, extraction.text);
    }
    println!(
        "Translation ({} -> {}):\n{}",
        output.translation.source_language,
        output.translation.target_language,
        output.translation.translated_text
    );

    if let Some(audio) = output.audio {
        let suffix = format!(".{}", audio.extension());
        let mut file = tempfile::Builder::new()
            .prefix("signboard_")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&audio.bytes)?;
        // The system player opens the file after we exit, so it must outlive the handle.
        let (_, path) = file.keep()?;
        tracing::info!("Playing {}", path.display());
        play_in_background(SystemAudioPlayer, path).await?;
    }

    Ok(())
}

fn print_ocr_hints(config: &Config) {
    eprintln!("No text detected. Things to try:");
    eprintln!("  - Photograph the sign straight on, filling most of the frame");
    eprintln!("  - Avoid glare and motion blur");
    eprintln!(
        "  - Install the Tesseract language data for the sign's script (OCR_LANGUAGES={})",
        config.ocr.languages
    );
    eprintln!("  - Set OCR_DEBUG_IMAGE_PATH to inspect the preprocessed image");
}

async fn scan(config: Config, ocr: OcrProvider, dir: PathBuf, write_pdf: bool) -> anyhow::Result<()> {
    let scanner = BatchScanner::new(Arc::new(ocr), &config)?.with_pdf_output(write_pdf);
    let summary = tokio::task::spawn_blocking(move || scanner.scan(&dir)).await??;

    for report in &summary.reports {
        println!("== {}", report.path.display());
        println!("{}", report.text);
        match &report.field {
            Some(field) => println!("-> field: {field}"),
            None => println!("-> field: not found"),
        }
        if let Some(pdf) = &report.pdf_path {
            println!("-> pdf: {}", pdf.display());
        }
        println!();
    }
    for failure in &summary.failures {
        eprintln!("!! {}: {}", failure.path.display(), failure.error);
    }

    println!(
        "Scanned {} file(s), found the field in {}, {} failed",
        summary.scanned(),
        summary.fields_found(),
        summary.failures.len()
    );

    Ok(())
}

fn check(ocr: &OcrProvider) -> anyhow::Result<()> {
    if !ocr.is_available() {
        let reason = ocr.unavailable_reason().unwrap_or("unknown reason");
        eprintln!("OCR engine unavailable: {reason}");
        anyhow::bail!("Tesseract is not usable");
    }

    println!("OCR engine: {}", ocr.name());
    if let Some(version) = ocr.version() {
        println!("{}", version.lines().next().unwrap_or(version));
    }

    println!("\nSupported target languages:");
    for language in SUPPORTED_LANGUAGES {
        println!(
            "  {:<12} translate={:<6} speech={}",
            language.name, language.translation_code, language.speech_code
        );
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
