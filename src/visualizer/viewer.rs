// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Live preview window for annotated frames.

use std::time::{Duration, Instant};

use image::RgbImage;
use minifb::{Key, Window, WindowOptions};

use crate::error::{PoseError, Result};

/// Preview window backed by minifb. `q` or `Esc` asks the caller to stop.
pub struct Viewer {
    window: Window,
    pub width: usize,
    pub height: usize,
    buffer: Vec<u32>,
}

impl Viewer {
    /// Open a window of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::VisualizerError`] if no window can be created
    /// (for example on a headless machine).
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| PoseError::VisualizerError(format!("Failed to create window: {e}")))?;

        window.limit_update_rate(Some(Duration::from_micros(16600)));

        Ok(Self {
            window,
            width,
            height,
            buffer: Vec::new(),
        })
    }

    fn quit_requested(&self) -> bool {
        !self.window.is_open()
            || self.window.is_key_down(Key::Escape)
            || self.window.is_key_down(Key::Q)
    }

    /// Show a frame. Returns `Ok(false)` once the user asked to quit.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::VisualizerError`] if the window cannot be updated.
    pub fn show(&mut self, image: &RgbImage) -> Result<bool> {
        if self.quit_requested() {
            return Ok(false);
        }

        self.width = image.width() as usize;
        self.height = image.height() as usize;
        self.buffer.clear();
        // minifb expects 0x00RRGGBB
        self.buffer.extend(image.pixels().map(|p| {
            (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])
        }));

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| PoseError::VisualizerError(format!("Failed to update window: {e}")))?;

        Ok(!self.quit_requested())
    }

    /// Keep the last frame on screen for `duration`. Returns `Ok(false)` on quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be updated.
    pub fn wait(&mut self, duration: Duration) -> Result<bool> {
        if self.buffer.is_empty() {
            return Ok(true);
        }

        let start = Instant::now();
        while start.elapsed() < duration {
            if self.quit_requested() {
                return Ok(false);
            }
            self.window
                .update_with_buffer(&self.buffer, self.width, self.height)
                .map_err(|e| PoseError::VisualizerError(format!("Failed to update window: {e}")))?;
        }
        Ok(true)
    }
}
