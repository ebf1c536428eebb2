use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::face::Region;

pub const FALLBACK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const NAME_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

const TEXT_SCALE: f32 = 20.0;
const LINE_GAP: i32 = 25;
const BOX_THICKNESS: u32 = 2;

/// Box and label color for an emotion. Unlisted emotions get the fallback.
pub fn emotion_color(emotion: &str) -> Rgb<u8> {
    match emotion {
        "happy" => Rgb([255, 255, 0]),
        "sad" => Rgb([0, 0, 255]),
        "angry" => Rgb([255, 0, 0]),
        "surprise" => Rgb([0, 255, 255]),
        "fear" => Rgb([128, 0, 128]),
        "disgust" => Rgb([0, 128, 0]),
        "neutral" => Rgb([200, 200, 200]),
        _ => FALLBACK_COLOR,
    }
}

/// Text shown next to one face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLabel {
    pub name: String,
    pub emotion: String,
    pub gender: String,
    pub age_range: String,
}

impl FaceLabel {
    /// Lines drawn under the box, top to bottom.
    pub fn lines_below(&self) -> [String; 3] {
        [
            format!("Emotion: {}", self.emotion),
            format!("Gender: {}", self.gender),
            self.age_range.clone(),
        ]
    }
}

/// Draws face boxes and labels onto frames. Without a font only the boxes
/// are drawn.
pub struct Annotator {
    font: Option<FontArc>,
}

impl Annotator {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// Load the label font, falling back to boxes only.
    pub fn from_font_file(path: &Path) -> Self {
        let font = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontArc::try_from_vec(bytes).map_err(|e| e.to_string()));
        match font {
            Ok(font) => Self::new(Some(font)),
            Err(e) => {
                log::warn!(
                    "cannot load font {} ({}), labels will not be drawn",
                    path.display(),
                    e
                );
                Self::new(None)
            }
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn annotate(&self, frame: &mut RgbImage, region: Region, label: &FaceLabel) {
        let Some(region) = region.clamp_to(frame.width(), frame.height()) else {
            return;
        };
        let color = emotion_color(&label.emotion);

        for inset in 0..BOX_THICKNESS {
            let w = region.width.saturating_sub(2 * inset);
            let h = region.height.saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(frame, rect, color);
        }

        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(TEXT_SCALE);
        let x = region.x as i32;
        let top = region.y as i32;
        let bottom = (region.y + region.height) as i32;

        draw_text_mut(
            frame,
            NAME_COLOR,
            x,
            top - 10 - TEXT_SCALE as i32,
            scale,
            font,
            &label.name,
        );
        for (i, line) in label.lines_below().iter().enumerate() {
            let y = bottom + LINE_GAP * (i as i32 + 1) - TEXT_SCALE as i32;
            draw_text_mut(frame, color, x, y, scale, font, line);
        }
    }
}
