//! Emotion (FER+) and age/gender (InsightFace genderage) heads.

use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::{session::Session, value::Value};

use crate::detector::Detection;

/// FER+ class order, renamed to the labels the rest of the system speaks.
pub const EMOTION_LABELS: [&str; 8] = [
    "neutral", "happy", "surprise", "sad", "angry", "disgust", "fear", "contempt",
];

pub const GENDER_LABELS: [&str; 2] = ["Woman", "Man"];

const EMOTION_SIZE: u32 = 64;
const AGE_GENDER_SIZE: u32 = 96;

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmotionScores {
    pub scores: Vec<(&'static str, f32)>,
}

impl EmotionScores {
    pub fn from_logits(logits: &[f32]) -> Self {
        let probs = softmax(logits);
        Self {
            scores: EMOTION_LABELS.iter().copied().zip(probs).collect(),
        }
    }

    /// Highest-probability label; earliest label wins a tie.
    pub fn dominant(&self) -> &'static str {
        let mut best: Option<(&'static str, f32)> = None;
        for &(label, p) in &self.scores {
            if best.map_or(true, |(_, b)| p > b) {
                best = Some((label, p));
            }
        }
        best.map(|(label, _)| label).unwrap_or("neutral")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgeGender {
    pub age: f32,
    /// `(label, probability)` in [`GENDER_LABELS`] order
    pub gender: Vec<(&'static str, f32)>,
}

impl AgeGender {
    /// Decode the `[female, male, age / 100]` output row.
    pub fn from_output(out: &[f32]) -> Result<Self> {
        if out.len() < 3 {
            anyhow::bail!("genderage output has {} values, expected 3", out.len());
        }
        let probs = softmax(&out[..2]);
        Ok(Self {
            age: out[2] * 100.0,
            gender: GENDER_LABELS.iter().copied().zip(probs).collect(),
        })
    }
}

/// Square crop of `side_scale` times the larger box edge, centered on the
/// box, clamped to the image and resized to `size`.
pub fn face_patch(img: &RgbImage, detection: &Detection, side_scale: f32, size: u32) -> Option<RgbImage> {
    let [x, y, w, h] = detection.bbox;
    let side = w.max(h) * side_scale;
    let square = Detection {
        bbox: [x + w / 2.0 - side / 2.0, y + h / 2.0 - side / 2.0, side, side],
        ..detection.clone()
    };
    let (cx, cy, cw, ch) = square.clamped_box(img.width(), img.height())?;
    let crop = image::imageops::crop_imm(img, cx, cy, cw, ch).to_image();
    Some(image::imageops::resize(&crop, size, size, FilterType::Triangle))
}

pub struct EmotionClassifier {
    session: Session,
}

impl EmotionClassifier {
    pub fn new(model: &Path) -> Result<Self> {
        Ok(Self {
            session: crate::model::load_session(model).context("emotion model")?,
        })
    }

    pub fn classify(&mut self, img: &RgbImage, detection: &Detection) -> Result<EmotionScores> {
        let patch = face_patch(img, detection, 1.0, EMOTION_SIZE)
            .ok_or_else(|| anyhow::anyhow!("face box outside frame"))?;
        let gray = image::imageops::grayscale(&patch);

        let data: Vec<f32> = gray.as_raw().iter().map(|&v| v as f32).collect();
        let input = Array4::from_shape_vec(
            (1, 1, EMOTION_SIZE as usize, EMOTION_SIZE as usize),
            data,
        )?;

        let outputs = self.session.run(ort::inputs![Value::from_array(input)?])?;
        let (_shape, logits) = outputs[0].try_extract_tensor::<f32>()?;
        if logits.len() < EMOTION_LABELS.len() {
            anyhow::bail!("emotion output has {} values", logits.len());
        }
        Ok(EmotionScores::from_logits(&logits[..EMOTION_LABELS.len()]))
    }
}

pub struct AgeGenderEstimator {
    session: Session,
}

impl AgeGenderEstimator {
    pub fn new(model: &Path) -> Result<Self> {
        Ok(Self {
            session: crate::model::load_session(model).context("age/gender model")?,
        })
    }

    pub fn estimate(&mut self, img: &RgbImage, detection: &Detection) -> Result<AgeGender> {
        let patch = face_patch(img, detection, 1.5, AGE_GENDER_SIZE)
            .ok_or_else(|| anyhow::anyhow!("face box outside frame"))?;

        // RGB planes, raw [0, 255]
        let plane = (AGE_GENDER_SIZE * AGE_GENDER_SIZE) as usize;
        let mut data = vec![0.0f32; 3 * plane];
        for (i, px) in patch.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = px[c] as f32;
            }
        }
        let input = Array4::from_shape_vec(
            (1, 3, AGE_GENDER_SIZE as usize, AGE_GENDER_SIZE as usize),
            data,
        )?;

        let outputs = self.session.run(ort::inputs![Value::from_array(input)?])?;
        let (_shape, out) = outputs[0].try_extract_tensor::<f32>()?;
        AgeGender::from_output(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn test_dominant_emotion() {
        let mut logits = [0.0f32; 8];
        logits[4] = 5.0;
        assert_eq!(EmotionScores::from_logits(&logits).dominant(), "angry");

        // all equal: first label wins
        assert_eq!(EmotionScores::from_logits(&[0.0; 8]).dominant(), "neutral");
    }

    #[test]
    fn test_age_gender_decoding() {
        let ag = AgeGender::from_output(&[0.2, 1.4, 0.304]).unwrap();
        assert!((ag.age - 30.4).abs() < 1e-4);
        assert_eq!(ag.gender[0].0, "Woman");
        assert_eq!(ag.gender[1].0, "Man");
        assert!(ag.gender[1].1 > ag.gender[0].1);

        assert!(AgeGender::from_output(&[0.1, 0.2]).is_err());
    }

    #[test]
    fn test_face_patch_clamps_to_image() {
        let img = RgbImage::new(100, 80);
        let detection = Detection {
            bbox: [70.0, 50.0, 40.0, 40.0],
            score: 0.9,
            landmarks: [0.0; 10],
        };
        let patch = face_patch(&img, &detection, 1.5, 96).unwrap();
        assert_eq!(patch.dimensions(), (96, 96));

        let gone = Detection {
            bbox: [500.0, 500.0, 10.0, 10.0],
            ..detection
        };
        assert!(face_patch(&img, &gone, 1.0, 64).is_none());
    }
}
