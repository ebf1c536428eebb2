use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;

use crate::align::align_face;
use crate::detector::Detector;
use crate::encoder::{Embedding, Encoder, FACE_SIZE};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub source: PathBuf,
    pub embedding: Embedding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryMatch {
    pub source: PathBuf,
    pub similarity: f32,
}

/// Reference images of known people, embedded once at load time.
pub struct Gallery {
    detector: Detector,
    encoder: Encoder,
    entries: Vec<GalleryEntry>,
    threshold: f32,
}

impl Gallery {
    /// Embed every image under `dir`, subdirectories included. Images that
    /// fail to decode or embed are skipped with a warning; a missing
    /// directory gives an empty gallery.
    pub fn load(dir: &Path, mut detector: Detector, mut encoder: Encoder, threshold: f32) -> Result<Self> {
        let entries = if dir.is_dir() {
            let paths = collect_images(dir)?;
            load_entries(paths, |img| embed(&mut detector, &mut encoder, img))
        } else {
            log::warn!("known faces directory {} not found", dir.display());
            Vec::new()
        };

        Ok(Self {
            detector,
            encoder,
            entries,
            threshold,
        })
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    /// Rank gallery identities against a face crop, best first. Crops in
    /// which no face is detected are embedded whole.
    pub fn find(&mut self, face: &RgbImage) -> Result<Vec<GalleryMatch>> {
        if self.entries.is_empty() {
            return Ok(vec![]);
        }
        let probe = embed(&mut self.detector, &mut self.encoder, face)?;
        Ok(rank(&self.entries, &probe, self.threshold))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files anywhere below `dir`, in path order.
fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let listing = std::fs::read_dir(&current)
            .with_context(|| format!("reading gallery {}", current.display()))?;
        for entry in listing.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_image(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn load_entries<F>(paths: Vec<PathBuf>, mut embed: F) -> Vec<GalleryEntry>
where
    F: FnMut(&RgbImage) -> Result<Embedding>,
{
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let img = match image::open(&path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                log::warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        match embed(&img) {
            Ok(embedding) => {
                log::debug!("gallery: loaded {}", path.display());
                entries.push(GalleryEntry {
                    source: path,
                    embedding,
                });
            }
            Err(e) => log::warn!("skipping {}: {:#}", path.display(), e),
        }
    }
    entries
}

fn embed(detector: &mut Detector, encoder: &mut Encoder, img: &RgbImage) -> Result<Embedding> {
    let detections = detector.detect(img).context("detecting faces")?;
    match detections.first() {
        Some(best) => {
            let aligned = align_face(img, best, FACE_SIZE).context("aligning face")?;
            encoder.encode(&aligned)
        }
        None => encoder.encode(img),
    }
}

/// Entries whose similarity reaches `threshold`, best first.
pub fn rank(entries: &[GalleryEntry], probe: &Embedding, threshold: f32) -> Vec<GalleryMatch> {
    let mut matches: Vec<GalleryMatch> = entries
        .iter()
        .map(|e| GalleryMatch {
            source: e.source.clone(),
            similarity: e.embedding.similarity(probe),
        })
        .filter(|m| m.similarity >= threshold)
        .collect();
    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, v: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            source: PathBuf::from("known").join(name),
            embedding: Embedding::normalized(v),
        }
    }

    #[test]
    fn test_rank_filters_and_sorts() {
        let entries = vec![
            entry("bob.jpg", vec![0.6, 0.8]),
            entry("alice.jpg", vec![1.0, 0.1]),
            entry("carol.png", vec![-1.0, 0.0]),
        ];
        let probe = Embedding::normalized(vec![1.0, 0.0]);
        let ranked = rank(&entries, &probe, 0.5);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].source, PathBuf::from("known/alice.jpg"));
        assert_eq!(ranked[1].source, PathBuf::from("known/bob.jpg"));
        assert!(ranked[0].similarity >= ranked[1].similarity);
    }

    #[test]
    fn test_rank_empty_when_nothing_close() {
        let entries = vec![entry("bob.jpg", vec![0.0, 1.0])];
        let probe = Embedding::normalized(vec![1.0, 0.0]);
        assert!(rank(&entries, &probe, 0.363).is_empty());
    }

    fn write_png(path: &Path, shade: u8) {
        RgbImage::from_pixel(8, 8, image::Rgb([shade, shade, shade]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_collect_images_walks_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("team").join("night");
        std::fs::create_dir_all(&nested).unwrap();
        write_png(&dir.path().join("alice.png"), 10);
        write_png(&nested.join("bob.png"), 20);
        std::fs::write(dir.path().join("team").join("notes.txt"), "x").unwrap();

        let found = collect_images(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("alice.png"), nested.join("bob.png")]);
    }

    #[test]
    fn test_load_entries_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("alice.png");
        let blank = dir.path().join("blank.png");
        let broken = dir.path().join("broken.jpg");
        write_png(&good, 200);
        write_png(&blank, 0);
        std::fs::write(&broken, b"not an image").unwrap();

        let entries = load_entries(vec![good.clone(), blank, broken], |img| {
            if img.get_pixel(0, 0)[0] == 0 {
                anyhow::bail!("no usable face");
            }
            Ok(Embedding::normalized(vec![1.0, 0.0]))
        });
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, good);
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("known/alice.JPG")));
        assert!(is_image(Path::new("known/bob.png")));
        assert!(!is_image(Path::new("known/notes.txt")));
        assert!(!is_image(Path::new("known/README")));
    }
}
