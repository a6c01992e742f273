use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use client_core::{
    ControllerEvent, DiskFileSaver, HttpEncodeBackend, QrController, SystemClipboard,
};
use shared::style::QrStyle;

/// Encode a piece of text as a QR code via the encoding service and save
/// the resulting PNG.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[arg(long)]
    text: String,
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let backend = HttpEncodeBackend::new(&args.server_url)?;
    let controller = QrController::new(
        backend,
        &QrStyle::default(),
        Box::new(SystemClipboard),
        Box::new(DiskFileSaver::new(args.out_dir.clone())),
    );

    let mut events = controller.subscribe_events();
    controller.set_text(args.text).await;

    loop {
        match events.recv().await? {
            ControllerEvent::ImageUpdated { source_text } => {
                println!("Encoded {source_text:?}");
                let path = controller.download().await?;
                println!("Saved {}", path.display());
                return Ok(());
            }
            ControllerEvent::EncodeFailed { message } => {
                anyhow::bail!("encode failed: {message}");
            }
            _ => {}
        }
    }
}
