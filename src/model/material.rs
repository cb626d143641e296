use binrw::binread;

use crate::math::MmdVector3;
use crate::text::decode_fixed_str;

/// One 70-byte material record.
///
/// `face_vert_count` is the length of this material's contiguous run in the
/// face-index array. Equality compares the full attribute set and is what
/// the converter uses to merge adjacent same-material runs into one batch;
/// `material_no` is the stable ordinal assigned after parsing and is
/// deliberately excluded, so two structurally equal records still carry
/// distinct ordinals for cache keying.
#[binread]
#[derive(Debug, Clone)]
#[br(little)]
pub struct PmdMaterial {
    pub diffuse: MmdVector3,
    pub alpha: f32,
    pub specular_power: f32,
    pub specular: MmdVector3,
    pub ambient: MmdVector3,
    pub toon_index: u8,
    pub edge_flag: u8,

    /// Number of face-index entries (3 per triangle) this material owns.
    pub face_vert_count: u32,

    #[br(try_map = |raw: [u8; 20]| decode_fixed_str(&raw))]
    pub texture_file_name: String,

    /// Index of this material in the model's material array.
    #[br(ignore)]
    pub material_no: u32,
}

impl PmdMaterial {
    /// Whether batches for this material carry a texcoord stream.
    pub fn has_texture(&self) -> bool {
        !self.texture_file_name.is_empty()
    }
}

impl PartialEq for PmdMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.diffuse == other.diffuse
            && self.alpha == other.alpha
            && self.specular_power == other.specular_power
            && self.specular == other.specular
            && self.ambient == other.ambient
            && self.toon_index == other.toon_index
            && self.edge_flag == other.edge_flag
            && self.face_vert_count == other.face_vert_count
            && self.texture_file_name == other.texture_file_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::MmdVector3;

    fn material(texture: &str, material_no: u32) -> PmdMaterial {
        PmdMaterial {
            diffuse: MmdVector3::new(1.0, 1.0, 1.0),
            alpha: 1.0,
            specular_power: 5.0,
            specular: MmdVector3::new(0.2, 0.2, 0.2),
            ambient: MmdVector3::new(0.4, 0.4, 0.4),
            toon_index: 0,
            edge_flag: 1,
            face_vert_count: 6,
            texture_file_name: texture.to_string(),
            material_no,
        }
    }

    #[test]
    fn test_equality_ignores_ordinal() {
        let a = material("body.png", 0);
        let b = material("body.png", 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_compares_attributes() {
        let a = material("body.png", 0);
        let mut b = material("body.png", 0);
        b.alpha = 0.5;
        assert_ne!(a, b);
    }

    #[test]
    fn test_has_texture() {
        assert!(material("body.png", 0).has_texture());
        assert!(!material("", 0).has_texture());
    }
}
