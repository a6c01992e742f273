//! Debounced input controller for the QR encoding service.
//!
//! The controller owns the raw text value and mediates between keystrokes
//! and the encoding backend: rapid edits collapse into a single request
//! (debounce), and every issued request carries a sequence number so a slow
//! response for an older edit can never overwrite a newer result
//! (supersession). File download and clipboard writes are the only
//! process-wide side effects and go through the [`FileSaver`] and
//! [`Clipboard`] seams.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use reqwest::Client;
use shared::{
    protocol::{ErrorBody, QrRequest, QrResponse},
    style::QrStyle,
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::sleep,
};
use tracing::warn;
use url::Url;

/// Encoding requests that outlive this window are treated as failed, so the
/// generating flag can never be stuck indefinitely on a hung server.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const DATA_URL_PNG_PREFIX: &str = "data:image/png;base64,";

/// A successfully encoded image together with the text that produced it.
/// Derived state: overwritten on every newer encode, cleared on reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data_url: String,
    pub source_text: String,
}

impl EncodedImage {
    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        let payload = self
            .data_url
            .strip_prefix(DATA_URL_PNG_PREFIX)
            .context("image is not a base64 PNG data URL")?;
        STANDARD
            .decode(payload)
            .context("image payload is not valid base64")
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// The service classified the input as invalid (HTTP 400).
    #[error("server rejected the input: {0}")]
    Rejected(String),
    /// The service failed to encode (HTTP 500).
    #[error("encoding failed: {0}")]
    Failed(String),
    /// The request never completed: connection failure or timeout.
    #[error("transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait EncodeBackend: Send + Sync + 'static {
    async fn encode(&self, text: &str) -> Result<EncodedImage, BackendError>;
}

#[async_trait]
impl<B> EncodeBackend for Arc<B>
where
    B: EncodeBackend + ?Sized,
{
    async fn encode(&self, text: &str) -> Result<EncodedImage, BackendError> {
        (**self).encode(text).await
    }
}

/// Backend speaking the `POST /api/qr` wire contract.
pub struct HttpEncodeBackend {
    http: Client,
    endpoint: Url,
}

impl HttpEncodeBackend {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_timeout(server_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(server_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(server_url).context("invalid server url")?;
        let endpoint = base.join("/api/qr").context("invalid server url")?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl EncodeBackend for HttpEncodeBackend {
    async fn encode(&self, text: &str) -> Result<EncodedImage, BackendError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&QrRequest {
                text: text.to_string(),
            })
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: QrResponse = response
                .json()
                .await
                .map_err(|err| BackendError::Transport(err.to_string()))?;
            return Ok(EncodedImage {
                data_url: body.qr_code,
                source_text: text.to_string(),
            });
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| format!("unexpected status {status}"));
        if status == reqwest::StatusCode::BAD_REQUEST {
            Err(BackendError::Rejected(message))
        } else {
            Err(BackendError::Failed(message))
        }
    }
}

/// Narrow seam for the system clipboard; `copy_text` is its only caller.
pub trait Clipboard: Send + Sync + 'static {
    fn write_text(&self, text: &str) -> Result<()>;
}

impl<C> Clipboard for Arc<C>
where
    C: Clipboard + ?Sized,
{
    fn write_text(&self, text: &str) -> Result<()> {
        (**self).write_text(text)
    }
}

pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().context("clipboard unavailable")?;
        clipboard
            .set_text(text.to_string())
            .context("clipboard write failed")?;
        Ok(())
    }
}

/// Narrow seam for the file-save action; `download` is its only caller.
pub trait FileSaver: Send + Sync + 'static {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf>;
}

impl<S> FileSaver for Arc<S>
where
    S: FileSaver + ?Sized,
{
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        (**self).save(filename, bytes)
    }
}

pub struct DiskFileSaver {
    dir: PathBuf,
}

impl DiskFileSaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FileSaver for DiskFileSaver {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create '{}'", self.dir.display()))?;
        let path = self.dir.join(filename);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        Ok(path)
    }
}

/// Transient notifications for the presentation layer. None of these are
/// fatal; the controller stays usable after every error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    ImageUpdated { source_text: String },
    ImageCleared,
    EncodeFailed { message: String },
    Downloaded { path: PathBuf },
    TextCopied,
    ClipboardFailed { message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ControllerSnapshot {
    pub text: String,
    pub image: Option<EncodedImage>,
    pub generating: bool,
}

struct ControllerState {
    text: String,
    image: Option<EncodedImage>,
    generating: bool,
    /// Monotonic sequence over issued encode requests and invalidations.
    /// A completing request applies its result only while its own number
    /// still matches; `reset` and empty-input clears bump it so stale
    /// responses are discarded.
    seq: u64,
    debounce: Option<JoinHandle<()>>,
}

struct Inner<B: EncodeBackend> {
    backend: B,
    debounce_interval: Duration,
    state: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
    clipboard: Box<dyn Clipboard>,
    saver: Box<dyn FileSaver>,
}

pub struct QrController<B: EncodeBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: EncodeBackend> Clone for QrController<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: EncodeBackend> QrController<B> {
    pub fn new(
        backend: B,
        style: &QrStyle,
        clipboard: Box<dyn Clipboard>,
        saver: Box<dyn FileSaver>,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                backend,
                debounce_interval: Duration::from_millis(style.debounce_ms),
                state: Mutex::new(ControllerState {
                    text: String::new(),
                    image: None,
                    generating: false,
                    seq: 0,
                    debounce: None,
                }),
                events,
                clipboard,
                saver,
            }),
        }
    }

    /// Updates the text immediately and (re)arms the debounce timer. The
    /// timer is a single-slot resource: a pending, not-yet-fired timer is
    /// aborted and replaced, so overlapping edits produce one encode call.
    pub async fn set_text(&self, value: impl Into<String>) {
        let mut state = self.inner.state.lock().await;
        state.text = value.into();
        if let Some(timer) = state.debounce.take() {
            timer.abort();
        }
        let inner = Arc::clone(&self.inner);
        let interval = self.inner.debounce_interval;
        state.debounce = Some(tokio::spawn(async move {
            sleep(interval).await;
            Inner::fire(inner).await;
        }));
    }

    /// Clears text and image unconditionally and cancels any armed timer.
    /// An already-in-flight request keeps running, but its sequence number
    /// is superseded here so its result cannot repopulate the state.
    pub async fn reset(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(timer) = state.debounce.take() {
            timer.abort();
        }
        state.text.clear();
        state.seq += 1;
        state.generating = false;
        let had_image = state.image.take().is_some();
        drop(state);
        if had_image {
            let _ = self.inner.events.send(ControllerEvent::ImageCleared);
        }
    }

    /// Writes the current image as `qr-code-<timestamp>.png` through the
    /// file-saver seam. Valid only while an image is present; leaves text
    /// and image untouched.
    pub async fn download(&self) -> Result<PathBuf> {
        let image = self.inner.state.lock().await.image.clone();
        let Some(image) = image else {
            bail!("no encoded image to download");
        };

        let bytes = image.png_bytes()?;
        let filename = format!("qr-code-{}.png", Utc::now().timestamp_millis());
        let path = self.inner.saver.save(&filename, &bytes)?;
        let _ = self.inner.events.send(ControllerEvent::Downloaded {
            path: path.clone(),
        });
        Ok(path)
    }

    /// Copies the raw text to the clipboard. Valid only for non-empty text;
    /// a clipboard failure is reported as a non-fatal event and leaves all
    /// state unchanged.
    pub async fn copy_text(&self) -> Result<()> {
        let text = self.inner.state.lock().await.text.clone();
        if text.is_empty() {
            bail!("no text to copy");
        }

        match self.inner.clipboard.write_text(&text) {
            Ok(()) => {
                let _ = self.inner.events.send(ControllerEvent::TextCopied);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "clipboard write failed");
                let _ = self.inner.events.send(ControllerEvent::ClipboardFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    pub async fn is_generating(&self) -> bool {
        self.inner.state.lock().await.generating
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        let state = self.inner.state.lock().await;
        ControllerSnapshot {
            text: state.text.clone(),
            image: state.image.clone(),
            generating: state.generating,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.events.subscribe()
    }
}

impl<B: EncodeBackend> Inner<B> {
    /// Debounce timer expiry. Empty or all-whitespace text clears the image
    /// without calling the backend; otherwise the encode request runs as a
    /// detached task tagged with a fresh sequence number.
    async fn fire(inner: Arc<Self>) {
        let (text, seq) = {
            let mut state = inner.state.lock().await;
            state.debounce = None;
            state.seq += 1;
            if state.text.trim().is_empty() {
                state.generating = false;
                let had_image = state.image.take().is_some();
                drop(state);
                if had_image {
                    let _ = inner.events.send(ControllerEvent::ImageCleared);
                }
                return;
            }
            state.generating = true;
            (state.text.clone(), state.seq)
        };

        tokio::spawn(async move {
            Inner::run_encode(inner, text, seq).await;
        });
    }

    async fn run_encode(inner: Arc<Self>, text: String, seq: u64) {
        let result = inner.backend.encode(&text).await;

        let mut state = inner.state.lock().await;
        if state.seq != seq {
            // Superseded by a newer request, a clear, or a reset.
            return;
        }
        state.generating = false;
        match result {
            Ok(image) => {
                state.image = Some(image);
                drop(state);
                let _ = inner.events.send(ControllerEvent::ImageUpdated {
                    source_text: text,
                });
            }
            Err(err) => {
                // Prior image stays visible on any failure.
                drop(state);
                warn!(%err, "encode request failed");
                let _ = inner.events.send(ControllerEvent::EncodeFailed {
                    message: err.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
