use anyhow::{Context, Result};
use callwaiting_voice::{
    create_router, AppState, CallSessionController, Config, FileMicrophone, NatsTransport,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "callwaiting-voice", about = "Voice call session controller")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/callwaiting-voice")]
    config: String,

    /// WAV file replayed as the caller's microphone (overrides audio.input_file)
    #[arg(short, long)]
    input: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config_path = shellexpand::tilde(&args.config).into_owned();
    let cfg = Config::load(&config_path)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let input = match args.input.as_deref() {
        Some(path) => Some(PathBuf::from(shellexpand::tilde(path).into_owned())),
        None => cfg.input_path()?,
    }
    .context("No microphone input: pass --input or set audio.input_file")?;
    info!("Microphone input: {}", input.display());

    let transport =
        NatsTransport::connect(&cfg.transport.nats_url, cfg.transport.session_id.clone()).await?;
    let microphone = FileMicrophone::new(input);

    let controller = Arc::new(CallSessionController::new(
        Arc::new(transport),
        Arc::new(microphone),
        cfg.controller_options(),
    ));

    let app = create_router(AppState::new(Arc::clone(&controller), cfg.call_config()));

    let addr = cfg.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    controller.dispose().await;
    info!("Call controller disposed");

    Ok(())
}
