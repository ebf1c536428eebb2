//! Frame source and on-screen display.

use image::RgbImage;
use minifb::{Key, Window, WindowOptions};
use vigil_vision::Camera;

use crate::error::{DeviceError, DisplayError};

pub trait FrameSource {
    /// Next frame. Any error ends the monitoring loop.
    fn next_frame(&mut self) -> Result<RgbImage, DeviceError>;
}

pub trait FrameDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError>;

    /// Non-blocking check for a user request to stop.
    fn quit_requested(&self) -> bool;
}

impl FrameSource for Camera {
    fn next_frame(&mut self) -> Result<RgbImage, DeviceError> {
        self.frame().map_err(DeviceError::Read)
    }
}

/// Desktop window; `q`, `Escape` or closing the window asks to quit.
///
/// Keys are sampled once per shown frame, after the window update. A tap
/// pressed and released entirely within one frame's processing time is not
/// seen, so on a slow machine `q` has to be held until the next frame.
pub struct WindowDisplay {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
    quit: bool,
}

impl WindowDisplay {
    /// The window opens on the first frame, sized to it.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            window: None,
            buffer: Vec::new(),
            quit: false,
        }
    }
}

impl FrameDisplay for WindowDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let window = match &mut self.window {
            Some(window) => window,
            slot => {
                let window = Window::new(&self.title, w, h, WindowOptions::default())
                    .map_err(|e| DisplayError::Window(e.to_string()))?;
                slot.insert(window)
            }
        };

        pack_rgb(frame, &mut self.buffer);
        window
            .update_with_buffer(&self.buffer, w, h)
            .map_err(|e| DisplayError::Window(e.to_string()))?;

        // latched so a key seen here is not lost by a later poll
        self.quit |= !window.is_open() || window.get_keys().iter().copied().any(is_quit_key);
        Ok(())
    }

    fn quit_requested(&self) -> bool {
        self.quit
    }
}

fn is_quit_key(key: Key) -> bool {
    matches!(key, Key::Q | Key::Escape)
}

/// Pack RGB pixels into minifb's `0RGB` words.
pub fn pack_rgb(frame: &RgbImage, out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        frame
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_rgb() {
        let mut frame = RgbImage::new(2, 1);
        frame.put_pixel(0, 0, image::Rgb([0x12, 0x34, 0x56]));
        frame.put_pixel(1, 0, image::Rgb([0xff, 0x00, 0x01]));

        let mut buf = vec![7; 10];
        pack_rgb(&frame, &mut buf);
        assert_eq!(buf, vec![0x0012_3456, 0x00ff_0001]);
    }

    #[test]
    fn test_quit_keys() {
        assert!(is_quit_key(Key::Q));
        assert!(is_quit_key(Key::Escape));
        assert!(!is_quit_key(Key::W));
        assert!(!is_quit_key(Key::Space));
    }

    #[test]
    fn test_no_window_means_no_quit() {
        let display = WindowDisplay::new("test");
        assert!(!display.quit_requested());
    }
}
