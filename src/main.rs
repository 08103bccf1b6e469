use quick_vision::delivery::{overlay, overlay_channel};
use quick_vision::hotkey::HotkeyListener;
use quick_vision::pipeline::Pipeline;
use quick_vision::session::SessionStore;
use quick_vision::settings::SETTINGS_FILE;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let settings = quick_vision::init_settings(SETTINGS_FILE)?;

    let (overlay, queue) = overlay_channel();
    let session = SessionStore::new(settings.session_path()).load();
    if let Some(name) = session.as_ref().and_then(|s| s.username.as_deref()) {
        tracing::info!("session found for {name}");
    }

    let pipeline = Arc::new(Pipeline::from_settings(
        &settings,
        overlay,
        session.as_ref().and_then(|s| s.chat_id()),
    )?);

    if settings.vision.api_key.is_none() {
        tracing::error!("GROQ_API_KEY is not set");
        pipeline.report_error("GROQ_API_KEY is not set. Set it and restart.");
    }
    if settings.telegram.startup_ping {
        pipeline.announce("QuickVision started.");
    }

    let hotkey = settings.hotkey();
    let listener = HotkeyListener::new(hotkey, settings.hotkey_retrigger);
    match listener.start(Arc::clone(&pipeline)) {
        Ok(_) => tracing::info!("listening for {:?}", hotkey),
        Err(e) => {
            tracing::error!("failed to start hotkey listener: {e}");
            pipeline.report_error(&format!("Hotkey listener failed to start: {e}"));
        }
    }

    overlay::run(queue, settings.overlay.clone())
}
