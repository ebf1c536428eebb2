use anyhow::{Context, Result};
use image::RgbImage;

use crate::attributes::{AgeGender, AgeGenderEstimator, EmotionClassifier, EmotionScores};
use crate::detector::{Detection, Detector};
use crate::model::ModelSet;

const NMS_THRESHOLD: f32 = 0.3;

/// Everything the models report about one face.
#[derive(Debug, Clone)]
pub struct FaceAnalysis {
    pub detection: Detection,
    pub emotion: EmotionScores,
    pub age_gender: AgeGender,
}

/// Full analysis pipeline: detect faces → emotion → age/gender
pub struct Pipeline {
    pub detector: Detector,
    pub emotion: EmotionClassifier,
    pub age_gender: AgeGenderEstimator,
}

impl Pipeline {
    pub fn new(models: &ModelSet, score_threshold: f32) -> Result<Self> {
        Ok(Self {
            detector: Detector::new(&models.detector, score_threshold, NMS_THRESHOLD)?,
            emotion: EmotionClassifier::new(&models.emotion)?,
            age_gender: AgeGenderEstimator::new(&models.age_gender)?,
        })
    }

    /// Analyze every face in the frame, in detector order. A frame without
    /// faces yields an empty list.
    pub fn analyze(&mut self, img: &RgbImage) -> Result<Vec<FaceAnalysis>> {
        let detections = self.detector.detect(img).context("detecting faces")?;

        let mut faces = Vec::with_capacity(detections.len());
        for detection in detections {
            if detection.clamped_box(img.width(), img.height()).is_none() {
                log::debug!("dropping face outside frame: {:?}", detection.bbox);
                continue;
            }
            let emotion = self
                .emotion
                .classify(img, &detection)
                .context("classifying emotion")?;
            let age_gender = self
                .age_gender
                .estimate(img, &detection)
                .context("estimating age and gender")?;
            faces.push(FaceAnalysis {
                detection,
                emotion,
                age_gender,
            });
        }
        Ok(faces)
    }
}
