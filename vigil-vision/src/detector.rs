use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::{session::Session, value::Value};

use crate::yunet;

const INPUT_SIZE: u32 = 640;

/// A face found by the detector, in source image pixels.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
    pub landmarks: [f32; 10], // left eye, right eye, nose, mouth left, mouth right
}

impl Detection {
    /// Integer box clamped to a `width` x `height` image, or `None` when
    /// nothing of it lies inside.
    pub fn clamped_box(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let [x, y, w, h] = self.bbox;
        let x0 = x.max(0.0).min(width as f32) as u32;
        let y0 = y.max(0.0).min(height as f32) as u32;
        let x1 = (x + w).max(0.0).min(width as f32) as u32;
        let y1 = (y + h).max(0.0).min(height as f32) as u32;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// YuNet face detector.
pub struct Detector {
    session: Session,
    score_threshold: f32,
    nms_threshold: f32,
}

impl Detector {
    pub fn new(model: &Path, score_threshold: f32, nms_threshold: f32) -> Result<Self> {
        Ok(Self {
            session: crate::model::load_session(model).context("detector model")?,
            score_threshold,
            nms_threshold,
        })
    }

    /// Detect faces, best score first. An image without faces yields an
    /// empty list.
    pub fn detect(&mut self, img: &RgbImage) -> Result<Vec<Detection>> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Ok(vec![]);
        }

        // Letterbox into the square input without distorting the face
        let scale = INPUT_SIZE as f32 / width.max(height) as f32;
        let new_w = ((width as f32 * scale) as u32).max(1);
        let new_h = ((height as f32 * scale) as u32).max(1);
        let offset_x = (INPUT_SIZE - new_w) / 2;
        let offset_y = (INPUT_SIZE - new_h) / 2;

        let resized = image::imageops::resize(img, new_w, new_h, FilterType::Triangle);
        let mut canvas = RgbImage::new(INPUT_SIZE, INPUT_SIZE);
        image::imageops::overlay(&mut canvas, &resized, offset_x as i64, offset_y as i64);

        let input = Value::from_array(bgr_planes(&canvas)?)?;
        let outputs = self.session.run(ort::inputs![input])?;

        let mut tensors: Vec<(Vec<i64>, Vec<f32>)> = Vec::with_capacity(12);
        for (_name, output) in outputs.iter() {
            let (shape, data) = output.try_extract_tensor::<f32>()?;
            tensors.push((shape.iter().copied().collect(), data.to_vec()));
        }
        let heads: Vec<yunet::Head<'_>> = tensors
            .iter()
            .map(|(s, d)| (s.as_slice(), d.as_slice()))
            .collect();

        let raw = yunet::decode(&heads, INPUT_SIZE as usize, self.score_threshold)
            .context("decoding yunet outputs")?;

        let unmap_x = |v: f32| (v - offset_x as f32) / scale;
        let unmap_y = |v: f32| (v - offset_y as f32) / scale;
        let detections: Vec<Detection> = raw
            .into_iter()
            .map(|d| {
                let mut landmarks = [0.0f32; 10];
                for (dst, src) in landmarks.chunks_exact_mut(2).zip(d.landmarks.chunks_exact(2)) {
                    dst[0] = unmap_x(src[0]);
                    dst[1] = unmap_y(src[1]);
                }
                Detection {
                    bbox: [
                        unmap_x(d.bbox[0]),
                        unmap_y(d.bbox[1]),
                        d.bbox[2] / scale,
                        d.bbox[3] / scale,
                    ],
                    score: d.score,
                    landmarks,
                }
            })
            .collect();

        log::debug!("yunet: {} candidate(s) before nms", detections.len());
        Ok(nms(detections, self.nms_threshold))
    }
}

/// CHW float tensor in B, G, R plane order, values in [0, 255].
pub(crate) fn bgr_planes(img: &RgbImage) -> Result<Array4<f32>> {
    let (w, h) = img.dimensions();
    let plane = (w * h) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (i, px) in img.pixels().enumerate() {
        data[i] = px[2] as f32;
        data[plane + i] = px[1] as f32;
        data[2 * plane + i] = px[0] as f32;
    }
    Ok(Array4::from_shape_vec((1, 3, h as usize, w as usize), data)?)
}

/// Greedy non-maximum suppression; survivors are sorted by score.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    if iou_threshold >= 1.0 {
        return detections;
    }

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        if keep.iter().all(|k| iou(&k.bbox, &det.bbox) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let y2 = (a[1] + a[3]).min(b[1] + b[3]);
    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) * (y2 - y1);
    let union = a[2] * a[3] + b[2] * b[3] - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
