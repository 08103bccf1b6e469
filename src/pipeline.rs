use crate::capture::{CaptureError, FrameSource, ScreenCapturer};
use crate::delivery::notify::NOTIFICATION_TITLE;
use crate::delivery::{
    DeliveryError, MessageSink, NativeNotifier, Notifier, OverlayHandle, TelegramSink,
};
use crate::extract::{extract, truncate_with_marker, ExtractMode};
use crate::gateway::{GatewayError, GroqGateway, VisionBackend};
use crate::hotkey::ChordHandler;
use crate::retry::RetryPolicy;
use crate::settings::{OutputChannel, Settings};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Shown in place of an answer when the service returned no text.
pub const EMPTY_ANSWER_PLACEHOLDER: &str = "(No content returned.)";
const ERROR_POPUP_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("Screen capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Which sinks receive an answer and in which shorthand.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPlan {
    pub outputs: Vec<OutputChannel>,
    pub text_mode: ExtractMode,
    pub remote_text_mode: ExtractMode,
    pub popup_duration: Duration,
    pub error_duration: Duration,
}

impl DeliveryPlan {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            outputs: settings.outputs.clone(),
            text_mode: settings.text_mode,
            remote_text_mode: settings.remote_text_mode,
            popup_duration: settings.overlay.popup_duration(),
            error_duration: settings.overlay.error_duration(),
        }
    }
}

impl Default for DeliveryPlan {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Compact text for a remote chat. Falls back to the other shorthand when the
/// preferred one found no answer pattern.
pub fn remote_text(answer: &str, mode: ExtractMode) -> String {
    let compact = extract(answer, mode);
    if compact.trim() == answer.trim() {
        return extract(answer, mode.other());
    }
    compact
}

/// One capture → analyze → deliver run per activation. Shared read-only
/// between activations.
pub struct Pipeline {
    frames: Box<dyn FrameSource>,
    vision: Box<dyn VisionBackend>,
    retry: RetryPolicy,
    prompt: String,
    model: String,
    plan: DeliveryPlan,
    overlay: OverlayHandle,
    notifier: Box<dyn Notifier>,
    remote: Option<Box<dyn MessageSink>>,
}

impl Pipeline {
    pub fn new(
        frames: Box<dyn FrameSource>,
        vision: Box<dyn VisionBackend>,
        overlay: OverlayHandle,
        plan: DeliveryPlan,
    ) -> Self {
        let settings = Settings::default();
        Self {
            frames,
            vision,
            retry: RetryPolicy::default(),
            prompt: settings.prompt().to_string(),
            model: settings.vision.model,
            plan,
            overlay,
            notifier: Box::new(NativeNotifier::default()),
            remote: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>, model: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self.model = model.into();
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_remote(mut self, remote: Box<dyn MessageSink>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Wire the real capture, vision and delivery backends from settings.
    pub fn from_settings(
        settings: &Settings,
        overlay: OverlayHandle,
        session_chat_id: Option<String>,
    ) -> anyhow::Result<Self> {
        let mut pipeline = Self::new(
            Box::new(ScreenCapturer::new(settings.display_index)),
            Box::new(GroqGateway::new(&settings.vision)?),
            overlay,
            DeliveryPlan::from_settings(settings),
        )
        .with_retry(RetryPolicy::from_millis(&settings.retry_delays_ms))
        .with_prompt(settings.prompt(), settings.vision.model.clone())
        .with_notifier(Box::new(NativeNotifier::new(settings.notification_sound.clone())));

        if settings.wants(OutputChannel::Telegram) {
            match TelegramSink::new(&settings.telegram, session_chat_id) {
                Ok(sink) => pipeline = pipeline.with_remote(Box::new(sink)),
                Err(e) => tracing::warn!("telegram output unavailable: {e}"),
            }
        }
        Ok(pipeline)
    }

    /// Run one activation on the calling thread. Failures are shown as an
    /// error popup and also returned.
    pub fn run(&self) -> Result<(), ActivationError> {
        tracing::info!("=== activation started ===");
        self.execute().map_err(|err| {
            tracing::error!("activation failed: {err}");
            self.report_error(&err.to_string());
            err
        })
    }

    /// Run one activation on a new worker thread. The handle may be dropped;
    /// the thread is then abandoned at process exit.
    pub fn spawn(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        let pipeline = Arc::clone(self);
        thread::Builder::new()
            .name("activation".into())
            .spawn(move || {
                let _ = pipeline.run();
            })
    }

    fn execute(&self) -> Result<(), ActivationError> {
        let started = Instant::now();
        let capture = self.frames.capture()?;
        tracing::info!(
            bytes = capture.bytes().len(),
            dimensions = ?capture.dimensions(),
            "screenshot captured"
        );

        let answer = self.retry.run(|attempt| {
            tracing::debug!(attempt = attempt + 1, model = %self.model, "calling vision endpoint");
            self.vision.analyze(capture.bytes(), &self.prompt, &self.model)
        })?;
        drop(capture);

        let answer = if answer.trim().is_empty() {
            tracing::info!("vision endpoint returned no content");
            EMPTY_ANSWER_PLACEHOLDER.to_string()
        } else {
            answer
        };
        tracing::info!(
            elapsed = ?started.elapsed(),
            "answer received: {}",
            truncate_with_marker(&answer, 100)
        );

        self.deliver(&answer);
        Ok(())
    }

    /// Hand `answer` to every configured sink. A failing sink never stops the
    /// others; remote failures are additionally shown as an error popup.
    pub fn deliver(&self, answer: &str) {
        for channel in &self.plan.outputs {
            let result = match channel {
                OutputChannel::Popup => self.overlay.show(
                    extract(answer, self.plan.text_mode),
                    self.plan.popup_duration,
                    false,
                ),
                OutputChannel::Notification => self.notify(answer),
                OutputChannel::Telegram => self.send_remote(answer),
            };
            if let Err(e) = result {
                tracing::warn!(?channel, "delivery failed: {e}");
                if *channel == OutputChannel::Telegram {
                    self.report_error(&format!("Telegram delivery failed: {e}"));
                }
            }
        }
    }

    fn notify(&self, answer: &str) -> Result<(), DeliveryError> {
        let text = extract(answer, self.plan.text_mode);
        match self.notifier.notify(NOTIFICATION_TITLE, &text) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::info!("native notification unavailable ({e}); showing popup");
                self.overlay.show(text, self.plan.popup_duration, false)
            }
        }
    }

    fn send_remote(&self, answer: &str) -> Result<(), DeliveryError> {
        let sink = self.remote.as_ref().ok_or(DeliveryError::NotConfigured(
            "TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID is missing",
        ))?;
        let text = remote_text(answer, self.plan.remote_text_mode);
        sink.send(&text)?;
        tracing::info!("telegram message sent: {text}");
        Ok(())
    }

    /// Show an error popup regardless of the configured outputs.
    pub fn report_error(&self, message: &str) {
        let text = truncate_with_marker(message, ERROR_POPUP_CHARS);
        if let Err(e) = self.overlay.show(text, self.plan.error_duration, true) {
            tracing::warn!("could not show error popup: {e}");
        }
    }

    /// Send a plain message to the remote chat, if one is configured.
    pub fn announce(&self, text: &str) {
        let Some(sink) = &self.remote else {
            tracing::debug!("no remote chat configured; skipping announcement");
            return;
        };
        match sink.send(text) {
            Ok(()) => tracing::info!("startup message sent"),
            Err(e) => tracing::warn!("startup message failed: {e}"),
        }
    }
}

impl ChordHandler for Arc<Pipeline> {
    fn on_chord(&self) {
        if let Err(e) = self.spawn() {
            tracing::error!("failed to start activation thread: {e}");
            self.report_error(&format!("Failed to start activation: {e}"));
        }
    }

    fn on_listener_error(&self, error: &str) {
        self.report_error(&format!(
            "Hotkey listener failed. Grant accessibility permissions. Details: {error}"
        ));
    }
}
