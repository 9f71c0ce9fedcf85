//! Layout signature folding

use blake3::Hasher;

use crate::types::Rect;

/// Incremental BLAKE3 digest over visited node shapes
pub(crate) struct SignatureBuilder {
    hasher: Hasher,
    folded: usize,
}

impl SignatureBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
            folded: 0,
        }
    }

    /// Fold one node: type tag, rounded container-space frame, depth, and
    /// ordinal among its siblings
    pub fn fold(&mut self, type_name: &str, frame: &Rect, depth: usize, ordinal: usize) {
        self.hasher.update(type_name.as_bytes());
        // Terminates the variable-length tag so "AB"+"C" != "A"+"BC"
        self.hasher.update(&[0]);
        for value in frame.rounded() {
            self.hasher.update(&value.to_le_bytes());
        }
        self.hasher.update(&(depth as u32).to_le_bytes());
        self.hasher.update(&(ordinal as u32).to_le_bytes());
        self.folded += 1;
    }

    pub fn finish(self) -> Option<String> {
        if self.folded == 0 {
            return None;
        }
        Some(self.hasher.finalize().to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature_of(nodes: &[(&str, Rect, usize, usize)]) -> Option<String> {
        let mut builder = SignatureBuilder::new();
        for (name, frame, depth, ordinal) in nodes {
            builder.fold(name, frame, *depth, *ordinal);
        }
        builder.finish()
    }

    #[test]
    fn test_empty_builder_has_no_signature() {
        assert_eq!(SignatureBuilder::new().finish(), None);
    }

    #[test]
    fn test_sub_point_jitter_is_ignored() {
        let a = signature_of(&[("UIView", Rect::new(0.0, 0.0, 100.0, 50.0), 0, 0)]);
        let b = signature_of(&[("UIView", Rect::new(0.2, -0.3, 100.4, 49.8), 0, 0)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_geometry_and_structure_change_signature() {
        let base = signature_of(&[("UIView", Rect::new(0.0, 0.0, 100.0, 50.0), 0, 0)]);
        let moved = signature_of(&[("UIView", Rect::new(0.0, 10.0, 100.0, 50.0), 0, 0)]);
        let retyped = signature_of(&[("UILabel", Rect::new(0.0, 0.0, 100.0, 50.0), 0, 0)]);
        let reordered = signature_of(&[("UIView", Rect::new(0.0, 0.0, 100.0, 50.0), 0, 1)]);
        assert_ne!(base, moved);
        assert_ne!(base, retyped);
        assert_ne!(base, reordered);
    }

    #[test]
    fn test_signature_is_hex_digest() {
        let sig = signature_of(&[("UIView", Rect::new(0.0, 0.0, 1.0, 1.0), 0, 0)]).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
