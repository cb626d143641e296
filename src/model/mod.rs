//! PMD model file decoding.
//!
//! Sections appear in one strict order, each element array preceded by its
//! count: header, vertices, face indices, materials, bones, IK chains,
//! morphs, then a fixed table of ten toon texture names. The decoder does
//! the framing only; referential integrity is checked by [`PmdModel::validate`]
//! immediately after parsing, before the model is handed out.

mod bone;
mod material;
mod morph;
mod vertex;

pub use bone::{BoneKind, PmdBone, PmdIkChain, BONE_INDEX_NONE};
pub use material::PmdMaterial;
pub use morph::{PmdMorph, PmdMorphVertex, MORPH_KIND_BASE};
pub use vertex::PmdVertex;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use binrw::{binread, BinRead};
use log::debug;
use serde::Serialize;

use crate::error::{MmdError, Result};
use crate::text::decode_fixed_str;

/// Number of slots in the toon texture name table.
pub const TOON_TEXTURE_COUNT: usize = 10;

/// One fixed-width toon texture name slot.
#[binread]
#[derive(Debug, Clone, PartialEq)]
#[br(little)]
pub struct PmdToonTexture(#[br(try_map = |raw: [u8; 100]| decode_fixed_str(&raw))] pub String);

/// A parsed PMD model. Immutable once returned by [`PmdModel::from_reader`].
#[binread]
#[derive(Debug, Clone)]
#[br(little, magic = b"Pmd")]
pub struct PmdModel {
    pub version: f32,

    #[br(try_map = |raw: [u8; 20]| decode_fixed_str(&raw))]
    pub model_name: String,

    #[br(try_map = |raw: [u8; 256]| decode_fixed_str(&raw))]
    pub comment: String,

    #[br(temp)]
    vert_count: u32,

    #[br(count = vert_count)]
    pub vertices: Vec<PmdVertex>,

    #[br(temp)]
    face_vert_count: u32,

    /// Flat triangle list; materials own contiguous runs of it.
    #[br(count = face_vert_count)]
    pub face_indices: Vec<u16>,

    #[br(temp)]
    material_count: u32,

    #[br(count = material_count)]
    pub materials: Vec<PmdMaterial>,

    #[br(temp)]
    bone_count: u16,

    #[br(count = bone_count)]
    pub bones: Vec<PmdBone>,

    #[br(temp)]
    ik_chain_count: u16,

    #[br(count = ik_chain_count)]
    pub ik_chains: Vec<PmdIkChain>,

    #[br(temp)]
    morph_count: u16,

    #[br(count = morph_count)]
    pub morphs: Vec<PmdMorph>,

    pub toon_textures: [PmdToonTexture; TOON_TEXTURE_COUNT],
}

/// Counts reported by the CLI inspector.
#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub model_name: String,
    pub version: f32,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub material_count: usize,
    pub bone_count: usize,
    pub ik_chain_count: usize,
    pub morph_count: usize,
}

impl PmdModel {
    /// Decodes and validates a model from a seekable byte stream.
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<PmdModel> {
        let mut model = PmdModel::read(reader)?;
        for (i, material) in model.materials.iter_mut().enumerate() {
            material.material_no = i as u32;
        }
        model.validate()?;
        debug!(
            "loaded PMD model '{}': {} vertices, {} faces, {} materials, {} bones, {} morphs",
            model.model_name,
            model.vertices.len(),
            model.face_indices.len() / 3,
            model.materials.len(),
            model.bones.len(),
            model.morphs.len(),
        );
        Ok(model)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<PmdModel> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::from_reader(&mut reader)
    }

    /// Referential-integrity checks the binary framing cannot express.
    ///
    /// The decoder accepts any in-range counts; a corrupt file can still
    /// carry out-of-range bone or vertex references that would otherwise
    /// surface as index panics deep inside conversion.
    pub fn validate(&self) -> Result<()> {
        let vert_count = self.vertices.len();
        let bone_count = self.bones.len();

        if vert_count > 0x10000 {
            return Err(MmdError::Format(format!(
                "{} vertices exceed the 16-bit face index space",
                vert_count
            )));
        }
        for (i, v) in self.vertices.iter().enumerate() {
            for b in v.bone_index {
                if (b as usize) >= bone_count {
                    return Err(MmdError::Format(format!(
                        "vertex {} references bone {} of {}",
                        i, b, bone_count
                    )));
                }
            }
            if v.bone_weight > 100 {
                return Err(MmdError::Format(format!(
                    "vertex {} bone weight {} exceeds 100",
                    i, v.bone_weight
                )));
            }
        }
        if self.face_indices.len() % 3 != 0 {
            return Err(MmdError::Format(format!(
                "face index count {} is not a multiple of 3",
                self.face_indices.len()
            )));
        }
        for (i, &fi) in self.face_indices.iter().enumerate() {
            if (fi as usize) >= vert_count {
                return Err(MmdError::Format(format!(
                    "face index {} references vertex {} of {}",
                    i, fi, vert_count
                )));
            }
        }
        let run_total: u64 = self
            .materials
            .iter()
            .map(|m| u64::from(m.face_vert_count))
            .sum();
        if run_total != self.face_indices.len() as u64 {
            return Err(MmdError::Format(format!(
                "material runs cover {} face indices, file has {}",
                run_total,
                self.face_indices.len()
            )));
        }
        for m in &self.materials {
            if m.face_vert_count % 3 != 0 {
                return Err(MmdError::Format(format!(
                    "material {} run length {} is not a multiple of 3",
                    m.material_no, m.face_vert_count
                )));
            }
        }
        for (i, bone) in self.bones.iter().enumerate() {
            for index in [bone.parent(), bone.tail()].into_iter().flatten() {
                if (index as usize) >= bone_count {
                    return Err(MmdError::Format(format!(
                        "bone {} references bone {} of {}",
                        i, index, bone_count
                    )));
                }
            }
            if bone.ik_target_index != 0 && (bone.ik_target_index as usize) >= bone_count {
                return Err(MmdError::Format(format!(
                    "bone {} IK target {} of {}",
                    i, bone.ik_target_index, bone_count
                )));
            }
        }
        for (i, chain) in self.ik_chains.iter().enumerate() {
            let all = chain
                .chain
                .iter()
                .copied()
                .chain([chain.ik_bone_index, chain.target_bone_index]);
            for b in all {
                if (b as usize) >= bone_count {
                    return Err(MmdError::Format(format!(
                        "IK chain {} references bone {} of {}",
                        i, b, bone_count
                    )));
                }
            }
        }
        if let Some(base) = self.base_morph() {
            for entry in &base.vertices {
                if (entry.vertex_index as usize) >= vert_count {
                    return Err(MmdError::Format(format!(
                        "base morph references vertex {} of {}",
                        entry.vertex_index, vert_count
                    )));
                }
            }
        }
        Ok(())
    }

    /// The type-0 morph defining the morph-capable vertex set, if present.
    pub fn base_morph(&self) -> Option<&PmdMorph> {
        self.morphs.iter().find(|m| m.is_base())
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            model_name: self.model_name.clone(),
            version: self.version,
            vertex_count: self.vertices.len(),
            triangle_count: self.face_indices.len() / 3,
            material_count: self.materials.len(),
            bone_count: self.bones.len(),
            ik_chain_count: self.ik_chains.len(),
            morph_count: self.morphs.len(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;
    use crate::math::MmdVector3;
    use std::io::Cursor;

    fn sample_model() -> PmdModel {
        let mut model = empty_model(2);
        model.model_name = "初音ミク".to_string();
        model.comment = "sample".to_string();
        model.vertices = vec![
            vertex(0.0, [0, 1], 100),
            vertex(1.0, [0, 1], 50),
            vertex(2.0, [1, 0], 0),
        ];
        model.face_indices = vec![0, 1, 2];
        model.materials = vec![material(3, "body.png", 0)];
        model.morphs = vec![PmdMorph {
            name: "base".to_string(),
            kind: MORPH_KIND_BASE,
            vertices: vec![PmdMorphVertex {
                vertex_index: 2,
                offset: MmdVector3::new(2.0, 0.0, 0.0),
            }],
        }];
        model
    }

    #[test]
    fn test_parse_full_model_stream() {
        let bytes = to_bytes(&sample_model());
        let model = PmdModel::from_reader(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(model.model_name, "初音ミク");
        assert_eq!(model.comment, "sample");
        assert_eq!(model.vertices.len(), 3);
        assert_eq!(model.face_indices, vec![0, 1, 2]);
        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.materials[0].material_no, 0);
        assert_eq!(model.materials[0].texture_file_name, "body.png");
        assert_eq!(model.bones.len(), 2);
        assert_eq!(model.morphs.len(), 1);
        assert!(model.morphs[0].is_base());
        assert_eq!(model.toon_textures[0].0, "toon01.bmp");
        // z flip applied on decode, so the round trip restores the fixture
        assert_eq!(model.vertices[1].position.to_slice(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_bad_magic_is_format_error() {
        let mut bytes = to_bytes(&sample_model());
        bytes[0] = b'X';
        let err = PmdModel::from_reader(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, MmdError::Format(_)), "got {:?}", err);
    }

    #[test]
    fn test_truncated_stream_is_io_error() {
        let bytes = to_bytes(&sample_model());
        let err = PmdModel::from_reader(&mut Cursor::new(&bytes[..bytes.len() / 2])).unwrap_err();
        assert!(matches!(err, MmdError::Io(_)), "got {:?}", err);
    }

    #[test]
    fn test_validation_rejects_bad_bone_reference() {
        let mut model = sample_model();
        model.vertices[0].bone_index = [9, 0];
        let err = model.validate().unwrap_err();
        assert!(matches!(err, MmdError::Format(_)));
    }

    #[test]
    fn test_validation_rejects_bad_face_index() {
        let mut model = sample_model();
        model.face_indices[2] = 40;
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_run_length_mismatch() {
        let mut model = sample_model();
        model.materials[0].face_vert_count = 6;
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_overweight_vertex() {
        let mut model = sample_model();
        model.vertices[1].bone_weight = 101;
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_summary_counts() {
        let summary = sample_model().summary();
        assert_eq!(summary.vertex_count, 3);
        assert_eq!(summary.triangle_count, 1);
        assert_eq!(summary.material_count, 1);
        assert_eq!(summary.bone_count, 2);
        assert_eq!(summary.morph_count, 1);
    }
}
