use std::time::Duration;

use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use super::{FrameInfo, FrameSink, SinkControl};
use crate::io::dataset::DatasetError;

/// Shows every frame in a window and waits for a key press.
/// `q` or Escape quits, any other key shows the next frame.
#[derive(Default)]
pub struct WindowSink {
    window: Option<Window>,
}

impl WindowSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_window(&mut self, width: usize, height: usize) -> Result<&mut Window, DatasetError> {
        let matches = self
            .window
            .as_ref()
            .map_or(false, |w| w.get_size() == (width, height));
        if !matches {
            let mut window = Window::new("w", width, height, WindowOptions::default())
                .map_err(|err| DatasetError::Display(err.to_string()))?;
            window.limit_update_rate(Some(Duration::from_micros(16600)));
            self.window = Some(window);
        }
        self.window
            .as_mut()
            .ok_or_else(|| DatasetError::Display("Window was not created".to_string()))
    }
}

impl FrameSink for WindowSink {
    fn consume(&mut self, frame: &RgbImage, info: &FrameInfo) -> Result<SinkControl, DatasetError> {
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        let buffer = frame
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect::<Vec<u32>>();

        let window = self.ensure_window(width, height)?;
        window.set_title(&info.title());

        let mut control = SinkControl::Quit;
        while window.is_open() {
            window
                .update_with_buffer(&buffer, width, height)
                .map_err(|err| DatasetError::Display(err.to_string()))?;

            let keys = window.get_keys_pressed(KeyRepeat::No);
            if keys.iter().any(|k| matches!(k, Key::Q | Key::Escape)) {
                break;
            }
            if !keys.is_empty() {
                control = SinkControl::Continue;
                break;
            }
        }

        Ok(control)
    }
}
