use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use oid4vp_session::{
    config::{BaseUrl, Config, BASE_URL_ENV, DEFAULT_BASE_URL},
    core::{util::ReqwestClient, visual_code::QrCodeService},
    verifier::{
        medication::{MedicationDirectory, DEFAULT_MEDICATION_SEARCH_URL},
        result::PresentationResult,
        session::SessionEvent,
        websocket::WebSocketTransport,
        Orchestrator,
    },
};
use qrcode::{render::unicode, QrCode};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "present")]
#[command(about = "Request a health credential presentation from a wallet")]
struct Args {
    /// Credential type to request
    #[arg(short, long, default_value = "SmartHealthCard")]
    credential: String,

    /// Verifier service location
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Medication directory used to resolve prescribed GTINs
    #[arg(long, default_value = DEFAULT_MEDICATION_SEARCH_URL)]
    medication_search_url: String,

    /// Seconds to wait for the wallet before giving up
    #[arg(long, default_value = "300")]
    timeout: u64,

    /// Disable QR code display (just show the URI)
    #[arg(long, default_value = "false")]
    no_qr: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("present=info".parse()?))
        .init();

    let args = Args::parse();

    let base = BaseUrl::try_from(args.base_url.as_str()).context("invalid --base-url")?;
    let medication_search_url = BaseUrl::try_from(args.medication_search_url.as_str())
        .context("invalid --medication-search-url")?;
    let config = Config::new(base);
    let http_client = Arc::new(ReqwestClient::new()?);

    let mut builder = Orchestrator::builder()
        .with_config(config.clone())
        .with_http_client(http_client.clone())
        .with_transport(Arc::new(WebSocketTransport))
        .with_medication_lookup(Arc::new(MedicationDirectory::new(
            medication_search_url,
            http_client.clone(),
        )));
    if !args.no_qr {
        builder = builder.with_visual_encoder(Arc::new(QrCodeService::new(
            config.qr_code_endpoint()?,
            http_client,
        )));
    }
    let mut orchestrator = builder.build().context("failed to build the orchestrator")?;

    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Requested { credential_type } => {
                    info!("requested a {credential_type} presentation")
                }
                SessionEvent::AwaitingResult { session_id, .. } => {
                    info!("waiting for the wallet (session {session_id})")
                }
                SessionEvent::Completed(_) => info!("presentation verified"),
                SessionEvent::Failed(e) => warn!("presentation failed: {e}"),
                SessionEvent::Reset => info!("session abandoned"),
            }
        }
    });

    let session = orchestrator
        .start(Some(args.credential.as_str()))
        .await
        .context("failed to start the presentation")?;

    let uri = session
        .authorization_uri()
        .map(ToString::to_string)
        .unwrap_or_default();
    if !args.no_qr {
        display_qr_code(&uri);
    }
    println!("{uri}");
    println!();

    let outcome = tokio::select! {
        outcome = tokio::time::timeout(
            Duration::from_secs(args.timeout),
            orchestrator.wait_for_result(),
        ) => outcome,
        _ = signal::ctrl_c() => {
            orchestrator.reset();
            return Ok(());
        }
    };

    let result = match outcome {
        Ok(result) => result?,
        Err(_) => {
            warn!("no presentation within {} seconds", args.timeout);
            orchestrator.reset();
            return Ok(());
        }
    };
    match result.as_ref() {
        PresentationResult::HealthRecords(records) => {
            println!("{}", serde_json::to_string_pretty(records)?)
        }
        PresentationResult::Prescription(prescription) => {
            println!("{}", serde_json::to_string_pretty(prescription)?)
        }
    }

    Ok(())
}

fn display_qr_code(uri: &str) {
    let code = match QrCode::new(uri) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to generate QR code: {}", e);
            return;
        }
    };

    let image = code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build();

    println!("{}", image);
}
