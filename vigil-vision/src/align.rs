use anyhow::Result;
use image::{Rgb, RgbImage};

use crate::detector::Detection;

/// ArcFace five-point template for a 112x112 crop.
const REFERENCE: [[f32; 2]; 5] = [
    [38.2946, 51.6963],
    [73.5318, 51.5014],
    [56.0252, 71.7366],
    [41.5493, 92.3655],
    [70.7299, 92.2041],
];

/// Similarity transform `q = [a -b; b a] p + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Similarity {
    /// Least-squares fit mapping `src` points onto `dst` points.
    pub fn fit(src: &[[f32; 2]], dst: &[[f32; 2]]) -> Option<Self> {
        let n = src.len().min(dst.len());
        if n < 2 {
            return None;
        }
        let mean = |pts: &[[f32; 2]]| {
            let (sx, sy) = pts[..n]
                .iter()
                .fold((0.0, 0.0), |(x, y), p| (x + p[0], y + p[1]));
            (sx / n as f32, sy / n as f32)
        };
        let (px, py) = mean(src);
        let (qx, qy) = mean(dst);

        let mut denom = 0.0;
        let mut num_a = 0.0;
        let mut num_b = 0.0;
        for (p, q) in src.iter().zip(dst.iter()).take(n) {
            let (ux, uy) = (p[0] - px, p[1] - py);
            let (vx, vy) = (q[0] - qx, q[1] - qy);
            denom += ux * ux + uy * uy;
            num_a += ux * vx + uy * vy;
            num_b += ux * vy - uy * vx;
        }
        if denom <= f32::EPSILON {
            return None;
        }

        let a = num_a / denom;
        let b = num_b / denom;
        Some(Self {
            a,
            b,
            tx: qx - (a * px - b * py),
            ty: qy - (b * px + a * py),
        })
    }

    pub fn apply(&self, p: [f32; 2]) -> [f32; 2] {
        [
            self.a * p[0] - self.b * p[1] + self.tx,
            self.b * p[0] + self.a * p[1] + self.ty,
        ]
    }

    pub fn invert(&self, q: [f32; 2]) -> [f32; 2] {
        let det = self.a * self.a + self.b * self.b;
        let (x, y) = (q[0] - self.tx, q[1] - self.ty);
        [
            (self.a * x + self.b * y) / det,
            (-self.b * x + self.a * y) / det,
        ]
    }
}

/// Warp the face onto the five-point template at `size` x `size`.
pub fn align_face(img: &RgbImage, detection: &Detection, size: u32) -> Result<RgbImage> {
    let k = size as f32 / 112.0;
    let dst: Vec<[f32; 2]> = REFERENCE.iter().map(|p| [p[0] * k, p[1] * k]).collect();
    let src: Vec<[f32; 2]> = detection
        .landmarks
        .chunks_exact(2)
        .map(|p| [p[0], p[1]])
        .collect();

    let transform = Similarity::fit(&src, &dst)
        .ok_or_else(|| anyhow::anyhow!("degenerate landmarks, cannot align face"))?;

    let mut out = RgbImage::new(size, size);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let [sx, sy] = transform.invert([x as f32, y as f32]);
        if let Some(sample) = bilinear(img, sx, sy) {
            *px = sample;
        }
    }
    Ok(out)
}

fn bilinear(img: &RgbImage, x: f32, y: f32) -> Option<Rgb<u8>> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    if x < 0.0 || y < 0.0 || x > (w - 1) as f32 || y > (h - 1) as f32 {
        return None;
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for (c, v) in out.iter_mut().enumerate() {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        *v = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgb(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_recovers_known_transform() {
        let truth = Similarity {
            a: 0.8,
            b: 0.3,
            tx: 5.0,
            ty: -2.0,
        };
        let src = REFERENCE.to_vec();
        let dst: Vec<[f32; 2]> = src.iter().map(|p| truth.apply(*p)).collect();
        let fitted = Similarity::fit(&src, &dst).unwrap();
        assert!((fitted.a - truth.a).abs() < 1e-4);
        assert!((fitted.b - truth.b).abs() < 1e-4);
        assert!((fitted.tx - truth.tx).abs() < 1e-2);
        assert!((fitted.ty - truth.ty).abs() < 1e-2);

        let back = fitted.invert(fitted.apply([10.0, 20.0]));
        assert!((back[0] - 10.0).abs() < 1e-3 && (back[1] - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_fit_rejects_degenerate_points() {
        let same = [[1.0, 1.0]; 5];
        assert!(Similarity::fit(&same, &REFERENCE).is_none());
    }

    #[test]
    fn test_align_face_output_size() {
        let img = RgbImage::from_pixel(200, 200, Rgb([90, 120, 150]));
        let mut landmarks = [0.0; 10];
        for (i, p) in REFERENCE.iter().enumerate() {
            landmarks[i * 2] = p[0] + 40.0;
            landmarks[i * 2 + 1] = p[1] + 40.0;
        }
        let detection = Detection {
            bbox: [40.0, 40.0, 112.0, 112.0],
            score: 0.9,
            landmarks,
        };
        let aligned = align_face(&img, &detection, 112).unwrap();
        assert_eq!(aligned.dimensions(), (112, 112));
        assert_eq!(aligned.get_pixel(56, 56), &Rgb([90, 120, 150]));
    }
}
