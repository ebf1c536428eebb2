//! YuNet output decoding.
//!
//! The 2023mar export emits twelve tensors, four heads per stride (8, 16, 32):
//! `cls_8, cls_16, cls_32, obj_8, obj_16, obj_32, bbox_8, bbox_16, bbox_32,
//! kps_8, kps_16, kps_32`. Each head is laid out `[1, H*W, C]` over the stride
//! grid. Decoding is anchor-free:
//!
//! - score = sqrt(clamp(cls) * clamp(obj))
//! - cx = (col + dx) * stride, cy = (row + dy) * stride
//! - w = exp(dw) * stride, h = exp(dh) * stride
//! - landmark k = ((col + kx) * stride, (row + ky) * stride)
//!
//! Coordinates come out in pixels of the square network input.

use anyhow::Result;

pub const STRIDES: [usize; 3] = [8, 16, 32];

#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// x, y, w, h in input pixels
    pub bbox: [f32; 4],
    pub score: f32,
    /// five points, interleaved x/y, in input pixels
    pub landmarks: [f32; 10],
}

/// Borrowed view over one output tensor.
pub type Head<'a> = (&'a [i64], &'a [f32]);

fn head<'a>(outputs: &[Head<'a>], index: usize, cells: usize, width: i64) -> Result<&'a [f32]> {
    let (shape, data) = outputs
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("missing yunet output {}", index))?;
    let ok = shape.len() == 3 && shape[0] == 1 && shape[1] as usize == cells && shape[2] == width;
    if !ok || data.len() < cells * width as usize {
        anyhow::bail!(
            "yunet output {} has shape {:?}, expected [1, {}, {}]",
            index,
            shape,
            cells,
            width
        );
    }
    Ok(data)
}

/// Decode every grid cell whose score reaches `score_threshold`.
pub fn decode(
    outputs: &[Head<'_>],
    input_size: usize,
    score_threshold: f32,
) -> Result<Vec<RawDetection>> {
    let mut detections = Vec::new();

    for (scale, &stride) in STRIDES.iter().enumerate() {
        let cols = input_size / stride;
        let cells = cols * cols;

        let cls = head(outputs, scale, cells, 1)?;
        let obj = head(outputs, scale + 3, cells, 1)?;
        let bbox = head(outputs, scale + 6, cells, 4)?;
        let kps = head(outputs, scale + 9, cells, 10)?;

        let s = stride as f32;
        for idx in 0..cells {
            let score = (cls[idx].clamp(0.0, 1.0) * obj[idx].clamp(0.0, 1.0)).sqrt();
            if score < score_threshold {
                continue;
            }

            let row = (idx / cols) as f32;
            let col = (idx % cols) as f32;
            let b = &bbox[idx * 4..idx * 4 + 4];

            let cx = (col + b[0]) * s;
            let cy = (row + b[1]) * s;
            let w = b[2].exp() * s;
            let h = b[3].exp() * s;

            let mut landmarks = [0.0f32; 10];
            for (k, point) in landmarks.chunks_exact_mut(2).enumerate() {
                point[0] = (col + kps[idx * 10 + k * 2]) * s;
                point[1] = (row + kps[idx * 10 + k * 2 + 1]) * s;
            }

            detections.push(RawDetection {
                bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
                score,
                landmarks,
            });
        }
    }

    Ok(detections)
}
