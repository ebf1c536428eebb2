use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use ort::{session::Session, value::Value};

use crate::detector::bgr_planes;

/// SFace input edge length.
pub const FACE_SIZE: u32 = 112;

/// L2-normalized face embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn normalized(mut vector: Vec<f32>) -> Self {
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Self { vector }
    }

    /// Cosine similarity; both sides are unit length so this is a dot product.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let dot: f32 = self
            .vector
            .iter()
            .zip(other.vector.iter())
            .map(|(a, b)| a * b)
            .sum();
        dot.clamp(-1.0, 1.0)
    }
}

/// SFace recognizer.
pub struct Encoder {
    session: Session,
}

impl Encoder {
    pub fn new(model: &Path) -> Result<Self> {
        Ok(Self {
            session: crate::model::load_session(model).context("recognizer model")?,
        })
    }

    /// Embed an aligned face crop. Other sizes are resized first.
    pub fn encode(&mut self, face: &RgbImage) -> Result<Embedding> {
        let input = if face.dimensions() == (FACE_SIZE, FACE_SIZE) {
            bgr_planes(face)?
        } else {
            let resized = image::imageops::resize(face, FACE_SIZE, FACE_SIZE, FilterType::Triangle);
            bgr_planes(&resized)?
        };

        let outputs = self.session.run(ort::inputs![Value::from_array(input)?])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        // [1, 128]
        let dims = if shape.len() == 2 {
            shape[1] as usize
        } else {
            data.len()
        };
        Ok(Embedding::normalized(data[..dims].to_vec()))
    }
}
