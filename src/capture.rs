use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use screenshots::Screen;
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;

/// An encoded PNG of one display taken at activation time.
#[derive(Clone)]
pub struct Capture {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl Capture {
    pub fn new(png: Vec<u8>, width: u32, height: u32) -> Self {
        Self { png, width, height }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("bytes", &self.png.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("display {index} not found ({available} available)")]
    NoDisplay { index: usize, available: usize },
    #[error("cannot access display: {0}")]
    Access(String),
    #[error("captured an empty image; screen recording permission may be missing")]
    Empty,
    #[error("png encoding failed: {0}")]
    Encode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Source of display frames for an activation.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Result<Capture, CaptureError>;
}

/// Captures a whole display. Index 0 is the primary display; other indices
/// follow enumeration order.
pub struct ScreenCapturer {
    display: usize,
}

impl ScreenCapturer {
    pub fn new(display: usize) -> Self {
        Self { display }
    }
}

impl FrameSource for ScreenCapturer {
    fn capture(&self) -> Result<Capture, CaptureError> {
        let screens = Screen::all().map_err(|e| CaptureError::Access(e.to_string()))?;
        let screen = select_display(&screens, self.display, |s| s.display_info.is_primary)
            .ok_or(CaptureError::NoDisplay {
                index: self.display,
                available: screens.len(),
            })?;
        tracing::debug!(
            display = self.display,
            width = screen.display_info.width,
            height = screen.display_info.height,
            "capturing display"
        );
        let image = screen
            .capture()
            .map_err(|e| CaptureError::Access(e.to_string()))?;
        encode_capture(image)
    }
}

/// Pick the display for `index`. The primary display answers index 0 wherever
/// the platform enumerates it.
pub fn select_display<T>(screens: &[T], index: usize, is_primary: impl Fn(&T) -> bool) -> Option<&T> {
    if index == 0 {
        if let Some(primary) = screens.iter().find(|s| is_primary(s)) {
            return Some(primary);
        }
    }
    screens.get(index)
}

/// Encode a raw frame, staging through a temporary file only when the
/// in-memory encoder fails.
pub fn encode_capture(image: RgbaImage) -> Result<Capture, CaptureError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(CaptureError::Empty);
    }
    let png = match encode_png(&image) {
        Ok(png) => png,
        Err(e) => {
            tracing::warn!("in-memory png encoding failed: {e}; staging through a temp file");
            encode_png_staged(&image, &std::env::temp_dir())?
        }
    };
    Ok(Capture::new(png, width, height))
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CaptureError> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut buf, ImageOutputFormat::Png)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Write the frame to a temporary PNG inside `dir` and read it back.
///
/// The file is removed when the guard drops, on success and on every error.
pub fn encode_png_staged(image: &RgbaImage, dir: &Path) -> Result<Vec<u8>, CaptureError> {
    let mut file = tempfile::Builder::new()
        .prefix("quick_vision_")
        .suffix(".png")
        .tempfile_in(dir)?;
    image
        .save_with_format(file.path(), image::ImageFormat::Png)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    let mut png = Vec::new();
    file.as_file_mut().read_to_end(&mut png)?;
    Ok(png)
}
