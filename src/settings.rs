use crate::extract::ExtractMode;
use crate::gateway::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_PROMPT};
use crate::hotkey::{parse_hotkey, Hotkey, Retrigger};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const SETTINGS_FILE: &str = "settings.json";

/// Shortest time a popup stays on screen.
pub const MIN_POPUP_MS: u64 = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputChannel {
    Popup,
    Notification,
    Telegram,
}

impl FromStr for OutputChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "popup" | "overlay" => Ok(OutputChannel::Popup),
            "notification" | "notification-native" | "native" => Ok(OutputChannel::Notification),
            "telegram" | "remote-message" => Ok(OutputChannel::Telegram),
            other => Err(format!("unknown output channel '{other}'")),
        }
    }
}

/// Parse an output selection such as `popup`, `both` or `telegram,notification`.
pub fn parse_outputs(s: &str) -> Result<Vec<OutputChannel>, String> {
    if s.trim().eq_ignore_ascii_case("both") {
        return Ok(vec![OutputChannel::Telegram, OutputChannel::Popup]);
    }
    let mut out = Vec::new();
    for part in s.split(',').filter(|p| !p.trim().is_empty()) {
        let channel: OutputChannel = part.parse()?;
        if !out.contains(&channel) {
            out.push(channel);
        }
    }
    if out.is_empty() {
        return Err("no output channel given".into());
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopRight,
    #[default]
    BottomLeft,
    BottomRight,
    Center,
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top-left" => Ok(Anchor::TopLeft),
            "top-right" => Ok(Anchor::TopRight),
            "bottom-left" => Ok(Anchor::BottomLeft),
            "bottom-right" => Ok(Anchor::BottomRight),
            "center" => Ok(Anchor::Center),
            other => Err(format!("unknown position '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            left: 20.0,
            right: 20.0,
            top: 50.0,
            bottom: 50.0,
        }
    }
}

/// Parse `#rrggbb` (or `rrggbb`) into RGB components.
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub bg_color: String,
    pub fg_color: String,
    pub error_bg_color: String,
    pub error_fg_color: String,
    /// Popup opacity between 0 and 1.
    pub alpha: f32,
    pub font_size: f32,
    pub wrap_width: f32,
    pub padding: f32,
    pub anchor: Anchor,
    pub margins: Margins,
    pub duration_ms: u64,
    pub error_duration_ms: u64,
    /// How often the UI thread drains the display queue.
    pub poll_interval_ms: u64,
    /// Where the host window is parked; it never shows content itself.
    pub offscreen_pos: (f32, f32),
    /// Used for placement when the monitor size cannot be queried.
    pub fallback_screen_size: (f32, f32),
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            bg_color: "#1a1a1a".into(),
            fg_color: "#666666".into(),
            error_bg_color: "#8b0000".into(),
            error_fg_color: "#ffffff".into(),
            alpha: 0.3,
            font_size: 9.0,
            wrap_width: 120.0,
            padding: 2.0,
            anchor: Anchor::BottomLeft,
            margins: Margins::default(),
            duration_ms: 1500,
            error_duration_ms: 4000,
            poll_interval_ms: 100,
            offscreen_pos: (-10_000.0, -10_000.0),
            fallback_screen_size: (1920.0, 1080.0),
        }
    }
}

impl OverlaySettings {
    pub fn popup_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.duration_ms.max(MIN_POPUP_MS))
    }

    pub fn error_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.error_duration_ms.max(MIN_POPUP_MS))
    }

    /// Background and foreground for a popup, falling back to the defaults
    /// when a configured color does not parse.
    pub fn palette(&self, is_error: bool) -> ([u8; 3], [u8; 3]) {
        let defaults = Self::default();
        let (bg, fg, dbg, dfg) = if is_error {
            (
                &self.error_bg_color,
                &self.error_fg_color,
                defaults.error_bg_color,
                defaults.error_fg_color,
            )
        } else {
            (&self.bg_color, &self.fg_color, defaults.bg_color, defaults.fg_color)
        };
        let resolve = |value: &str, default: &str| {
            parse_hex_color(value)
                .or_else(|| parse_hex_color(default))
                .unwrap_or([0, 0, 0])
        };
        (resolve(bg.as_str(), dbg.as_str()), resolve(fg.as_str(), dfg.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Bearer token for the vision endpoint. Usually supplied via `GROQ_API_KEY`.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.into(),
            model: DEFAULT_MODEL.into(),
            connect_timeout_secs: 10,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
    /// Send a short test message when the agent starts.
    pub startup_ping: bool,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: crate::delivery::telegram::DEFAULT_API_BASE.into(),
            startup_ping: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub hotkey: Option<String>,
    /// Whether holding the chord and pressing its key again fires again.
    pub hotkey_retrigger: Retrigger,
    /// When enabled the application initialises the logger at debug level.
    pub debug_logging: bool,
    /// Optional file receiving a copy of the log output.
    pub log_file: Option<String>,
    /// Index of the display to capture; 0 is the primary display.
    pub display_index: usize,
    pub outputs: Vec<OutputChannel>,
    /// Shorthand used for the popup and native notification.
    pub text_mode: ExtractMode,
    /// Shorthand tried first for remote messages.
    pub remote_text_mode: ExtractMode,
    /// Instruction sent along with the capture. `None` uses the built-in prompt.
    pub prompt: Option<String>,
    pub retry_delays_ms: Vec<u64>,
    pub vision: VisionSettings,
    pub overlay: OverlaySettings,
    pub telegram: TelegramSettings,
    pub notification_sound: Option<String>,
    /// Activation record location. Defaults to `~/.quickvision_activation.json`.
    pub session_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hotkey: Some(DEFAULT_HOTKEY.into()),
            hotkey_retrigger: Retrigger::default(),
            debug_logging: false,
            log_file: None,
            display_index: 0,
            outputs: vec![OutputChannel::Popup],
            text_mode: ExtractMode::Minimal,
            remote_text_mode: ExtractMode::Letters,
            prompt: None,
            retry_delays_ms: vec![0, 1000, 2000],
            vision: VisionSettings::default(),
            overlay: OverlaySettings::default(),
            telegram: TelegramSettings::default(),
            notification_sound: None,
            session_file: None,
        }
    }
}

pub const DEFAULT_HOTKEY: &str = "Ctrl+Shift+X";

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from a flat key/value source. Empty values are treated
    /// as unset; values that do not parse are logged and ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("GROQ_API_KEY") {
            self.vision.api_key = Some(key);
        }
        if let Some(model) = get("GROQ_MODEL") {
            self.vision.model = model;
        }
        if let Some(prompt) = get("QUICKVISION_PROMPT") {
            self.prompt = Some(prompt);
        }
        if let Some(v) = get("QUICKVISION_OUTPUT_MODE") {
            match parse_outputs(&v) {
                Ok(outputs) => self.outputs = outputs,
                Err(e) => tracing::warn!("QUICKVISION_OUTPUT_MODE ignored: {e}"),
            }
        }
        if let Some(v) = get("QUICKVISION_TEXT_MODE").or_else(|| get("QUICKVISION_OUTPUT_FORMAT")) {
            set_parsed(&mut self.text_mode, "QUICKVISION_TEXT_MODE", &v);
        }
        if let Some(v) = get("QUICKVISION_ALPHA") {
            set_dimension(&mut self.overlay.alpha, "QUICKVISION_ALPHA", &v, Bound::AtLeastZero);
            self.overlay.alpha = self.overlay.alpha.clamp(0.0, 1.0);
        }
        if let Some(v) = get("QUICKVISION_FONT_SIZE") {
            set_dimension(&mut self.overlay.font_size, "QUICKVISION_FONT_SIZE", &v, Bound::Positive);
        }
        if let Some(v) = get("QUICKVISION_WRAP") {
            set_dimension(&mut self.overlay.wrap_width, "QUICKVISION_WRAP", &v, Bound::Positive);
        }
        if let Some(v) = get("QUICKVISION_PADDING") {
            set_dimension(&mut self.overlay.padding, "QUICKVISION_PADDING", &v, Bound::AtLeastZero);
        }
        if let Some(v) = get("QUICKVISION_BG_COLOR") {
            set_color(&mut self.overlay.bg_color, "QUICKVISION_BG_COLOR", v);
        }
        if let Some(v) = get("QUICKVISION_FG_COLOR") {
            set_color(&mut self.overlay.fg_color, "QUICKVISION_FG_COLOR", v);
        }
        if let Some(v) = get("QUICKVISION_POSITION") {
            set_parsed(&mut self.overlay.anchor, "QUICKVISION_POSITION", &v);
        }
        let margins = &mut self.overlay.margins;
        for (key, slot) in [
            ("QUICKVISION_MARGIN_LEFT", &mut margins.left),
            ("QUICKVISION_MARGIN_RIGHT", &mut margins.right),
            ("QUICKVISION_MARGIN_TOP", &mut margins.top),
            ("QUICKVISION_MARGIN_BOTTOM", &mut margins.bottom),
        ] {
            if let Some(v) = get(key) {
                set_dimension(slot, key, &v, Bound::AtLeastZero);
            }
        }
        if let Some(v) = get("QUICKVISION_DURATION_MS") {
            set_parsed(&mut self.overlay.duration_ms, "QUICKVISION_DURATION_MS", &v);
        }
        if let Some(v) = get("QUICKVISION_NOTIFICATION_SOUND") {
            self.notification_sound = Some(v);
        }
        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(v);
        }
        if let Some(v) = get("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(v);
        }
    }

    pub fn hotkey(&self) -> Hotkey {
        if let Some(hotkey) = &self.hotkey {
            match parse_hotkey(hotkey) {
                Some(k) => return k,
                None => {
                    tracing::warn!(
                        "provided hotkey string '{}' is invalid; using default {}",
                        hotkey,
                        DEFAULT_HOTKEY
                    );
                }
            }
        }
        Hotkey::default()
    }

    pub fn prompt(&self) -> &str {
        self.prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_PROMPT)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file.as_ref().map(PathBuf::from)
    }

    pub fn session_path(&self) -> PathBuf {
        self.session_file
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(crate::session::SessionStore::default_path)
    }

    pub fn wants(&self, channel: OutputChannel) -> bool {
        self.outputs.contains(&channel)
    }
}

fn set_parsed<T: FromStr>(slot: &mut T, key: &str, value: &str)
where
    T::Err: std::fmt::Display,
{
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(e) => tracing::warn!("{key}='{value}' ignored: {e}"),
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Positive,
    AtLeastZero,
}

/// Like [`set_parsed`] for layout values, which must also be finite and in range.
fn set_dimension(slot: &mut f32, key: &str, value: &str, bound: Bound) {
    match value.parse::<f32>() {
        Ok(v) if !v.is_finite() => tracing::warn!("{key}='{value}' is not finite; ignored"),
        Ok(v) if v < 0.0 => tracing::warn!("{key}='{value}' is negative; ignored"),
        Ok(v) if v == 0.0 && matches!(bound, Bound::Positive) => {
            tracing::warn!("{key}='{value}' must be greater than zero; ignored")
        }
        Ok(v) => *slot = v,
        Err(e) => tracing::warn!("{key}='{value}' ignored: {e}"),
    }
}

fn set_color(slot: &mut String, key: &str, value: String) {
    if parse_hex_color(&value).is_some() {
        *slot = value;
    } else {
        tracing::warn!("{key}='{value}' is not a #rrggbb color; ignored");
    }
}
