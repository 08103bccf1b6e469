pub mod capture;
pub mod delivery;
pub mod extract;
pub mod gateway;
pub mod hotkey;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod session;
pub mod settings;

/// Load `path`, start logging from the file's values, then apply the
/// environment so rejected overrides reach the log.
pub fn init_settings(path: &str) -> anyhow::Result<settings::Settings> {
    let mut settings = settings::Settings::load(path)?;
    logging::init(settings.debug_logging, settings.log_path());
    settings.apply_env();
    Ok(settings)
}
