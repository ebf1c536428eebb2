//! What the monitor knows about one face in one frame.

use std::path::{Path, PathBuf};

pub const UNKNOWN: &str = "Unknown";

/// Face box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The part of this region inside a `width` x `height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        let x0 = self.x.min(width);
        let y0 = self.y.min(height);
        let x1 = self.x.saturating_add(self.width).min(width);
        let y1 = self.y.saturating_add(self.height).min(height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Region::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// Gender as the analyzer reports it: either a bare label or a score per
/// label.
#[derive(Debug, Clone, PartialEq)]
pub enum GenderEstimate {
    Label(String),
    Scores(Vec<(String, f32)>),
}

impl GenderEstimate {
    /// Single display label. For scores this is the argmax; on a tie the
    /// entry listed first wins.
    pub fn label(&self) -> &str {
        match self {
            GenderEstimate::Label(label) => label,
            GenderEstimate::Scores(scores) => {
                let mut best: Option<&(String, f32)> = None;
                for entry in scores {
                    if best.map_or(true, |b| entry.1 > b.1) {
                        best = Some(entry);
                    }
                }
                best.map(|(label, _)| label.as_str()).unwrap_or(UNKNOWN)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub region: Region,
    pub dominant_emotion: String,
    pub age: f32,
    pub gender: GenderEstimate,
}

impl DetectedFace {
    /// Age rounded to the nearest year, halves to even.
    pub fn approx_age(&self) -> i32 {
        self.age.round_ties_even() as i32
    }

    pub fn age_range(&self) -> String {
        age_range(self.approx_age())
    }
}

pub fn age_range(approx_age: i32) -> String {
    format!("Age: {}-{}", approx_age - 1, approx_age + 1)
}

/// One ranked gallery hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source: PathBuf,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMatch {
    pub name: String,
    pub is_known: bool,
}

impl IdentityMatch {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            is_known: false,
        }
    }

    /// Resolve a ranked candidate list. The top candidate's file stem is the
    /// person's name.
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        match candidates.first() {
            Some(top) => Self {
                name: display_name(&top.source),
                is_known: true,
            },
            None => Self::unknown(),
        }
    }
}

/// File name up to its first dot: `known/alice.jpg` → `alice`.
pub fn display_name(source: &Path) -> String {
    let file = source
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(age: f32) -> DetectedFace {
        DetectedFace {
            region: Region::new(0, 0, 10, 10),
            dominant_emotion: "neutral".to_string(),
            age,
            gender: GenderEstimate::Label("Man".to_string()),
        }
    }

    #[test]
    fn test_age_rounding_and_range() {
        assert_eq!(face(30.4).approx_age(), 30);
        assert_eq!(face(30.4).age_range(), "Age: 29-31");
        assert_eq!(face(30.6).approx_age(), 31);
        assert_eq!(face(30.5).approx_age(), 30);
        assert_eq!(face(31.5).approx_age(), 32);
    }

    #[test]
    fn test_gender_label() {
        let label = GenderEstimate::Label("Woman".to_string());
        assert_eq!(label.label(), "Woman");

        let scores = GenderEstimate::Scores(vec![
            ("Woman".to_string(), 12.5),
            ("Man".to_string(), 87.5),
        ]);
        assert_eq!(scores.label(), "Man");

        let tie = GenderEstimate::Scores(vec![
            ("Woman".to_string(), 50.0),
            ("Man".to_string(), 50.0),
        ]);
        assert_eq!(tie.label(), "Woman");

        assert_eq!(GenderEstimate::Scores(vec![]).label(), UNKNOWN);
    }

    #[test]
    fn test_identity_from_candidates() {
        let known = IdentityMatch::from_candidates(&[
            Candidate {
                source: PathBuf::from("known/alice.jpg"),
                similarity: 0.8,
            },
            Candidate {
                source: PathBuf::from("known/bob.jpg"),
                similarity: 0.5,
            },
        ]);
        assert_eq!(known.name, "alice");
        assert!(known.is_known);

        let unknown = IdentityMatch::from_candidates(&[]);
        assert_eq!(unknown, IdentityMatch::unknown());
        assert!(!unknown.is_known);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("known/alice.jpg")), "alice");
        assert_eq!(display_name(Path::new("known/bob.smith.png")), "bob");
        assert_eq!(display_name(Path::new("carol")), "carol");
        assert_eq!(display_name(Path::new("known/.hidden")), UNKNOWN);
    }

    #[test]
    fn test_region_clamp() {
        let r = Region::new(90, 10, 30, 30);
        assert_eq!(r.clamp_to(100, 100), Some(Region::new(90, 10, 10, 30)));
        assert_eq!(Region::new(120, 0, 5, 5).clamp_to(100, 100), None);
        assert_eq!(Region::new(0, 0, 0, 5).clamp_to(100, 100), None);
    }
}
