pub mod align;
pub mod attributes;
pub mod detector;
pub mod encoder;
pub mod gallery;
pub mod model;
pub mod pipeline;
pub mod video;
pub mod yunet;

// Re-export commonly used types
pub use attributes::{AgeGender, EmotionScores};
pub use detector::{Detection, Detector};
pub use encoder::{Embedding, Encoder};
pub use gallery::{Gallery, GalleryMatch};
pub use pipeline::{FaceAnalysis, Pipeline};
pub use video::Camera;
