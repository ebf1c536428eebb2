//! First-sighting policy for unknown faces.
//!
//! A signature is only an approximation of "the same stranger": two different
//! people with equal rounded age, gender and emotion share one alert.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FaceSignature {
    pub approx_age: i32,
    pub gender: String,
    pub emotion: String,
}

impl FaceSignature {
    pub fn new(approx_age: i32, gender: impl Into<String>, emotion: impl Into<String>) -> Self {
        Self {
            approx_age,
            gender: gender.into(),
            emotion: emotion.into(),
        }
    }
}

/// Signatures already alerted on during this process. Starts empty, only
/// grows, never persisted.
#[derive(Debug, Default)]
pub struct SeenSignatures {
    seen: HashSet<FaceSignature>,
}

impl SeenSignatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `signature` and returns true if it had not been seen before.
    pub fn first_sighting(&mut self, signature: FaceSignature) -> bool {
        self.seen.insert(signature)
    }

    pub fn contains(&self, signature: &FaceSignature) -> bool {
        self.seen.contains(signature)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_only_once() {
        let mut seen = SeenSignatures::new();
        let sig = FaceSignature::new(30, "Man", "happy");

        assert!(seen.first_sighting(sig.clone()));
        assert!(!seen.first_sighting(sig.clone()));
        assert!(!seen.first_sighting(sig.clone()));
        assert!(seen.contains(&sig));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_any_field_makes_a_new_signature() {
        let mut seen = SeenSignatures::new();
        assert!(seen.first_sighting(FaceSignature::new(30, "Man", "happy")));
        assert!(seen.first_sighting(FaceSignature::new(31, "Man", "happy")));
        assert!(seen.first_sighting(FaceSignature::new(30, "Woman", "happy")));
        assert!(seen.first_sighting(FaceSignature::new(30, "Man", "sad")));
        assert_eq!(seen.len(), 4);
    }
}
