//! Seams to the face models: per-frame analysis and identity lookup.

use image::RgbImage;
use vigil_vision::{FaceAnalysis, Gallery, Pipeline};

use crate::error::{AnalysisError, MatchError};
use crate::face::{Candidate, DetectedFace, GenderEstimate, Region};

/// Detects faces and estimates emotion, age and gender.
///
/// A frame with no faces must give `Ok(vec![])`, never an error.
pub trait FaceAnalyzer {
    fn analyze(&mut self, frame: &RgbImage) -> Result<Vec<DetectedFace>, AnalysisError>;
}

/// Looks a face crop up in the known-identities gallery.
///
/// Candidates come back best first; an empty list means nobody matched.
pub trait IdentityMatcher {
    fn find(&mut self, face: &RgbImage) -> Result<Vec<Candidate>, MatchError>;
}

impl FaceAnalyzer for Pipeline {
    fn analyze(&mut self, frame: &RgbImage) -> Result<Vec<DetectedFace>, AnalysisError> {
        let faces = Pipeline::analyze(self, frame).map_err(AnalysisError::Model)?;
        Ok(faces
            .into_iter()
            .filter_map(|f| to_detected_face(f, frame.width(), frame.height()))
            .collect())
    }
}

fn to_detected_face(face: FaceAnalysis, width: u32, height: u32) -> Option<DetectedFace> {
    let (x, y, w, h) = face.detection.clamped_box(width, height)?;
    Some(DetectedFace {
        region: Region::new(x, y, w, h),
        dominant_emotion: face.emotion.dominant().to_string(),
        age: face.age_gender.age,
        gender: GenderEstimate::Scores(
            face.age_gender
                .gender
                .iter()
                .map(|(label, p)| (label.to_string(), p * 100.0))
                .collect(),
        ),
    })
}

impl IdentityMatcher for Gallery {
    fn find(&mut self, face: &RgbImage) -> Result<Vec<Candidate>, MatchError> {
        if face.width() == 0 || face.height() == 0 {
            return Err(MatchError::EmptyCrop);
        }
        let matches = Gallery::find(self, face).map_err(MatchError::Model)?;
        Ok(matches
            .into_iter()
            .map(|m| Candidate {
                source: m.source,
                similarity: m.similarity,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_vision::{AgeGender, Detection, EmotionScores};

    #[test]
    fn test_model_output_becomes_detected_face() {
        let mut logits = [0.0f32; 8];
        logits[1] = 4.0;
        let analysis = FaceAnalysis {
            detection: Detection {
                bbox: [-4.0, 10.5, 50.0, 40.0],
                score: 0.95,
                landmarks: [0.0; 10],
            },
            emotion: EmotionScores::from_logits(&logits),
            age_gender: AgeGender::from_output(&[2.0, 0.0, 0.304]).unwrap(),
        };

        let face = to_detected_face(analysis, 640, 480).unwrap();
        assert_eq!(face.region, Region::new(0, 10, 46, 40));
        assert_eq!(face.dominant_emotion, "happy");
        assert_eq!(face.approx_age(), 30);
        assert_eq!(face.gender.label(), "Woman");
    }
}
