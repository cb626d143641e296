use binrw::binread;

use crate::math::MmdVector3;
use crate::text::decode_fixed_str;

/// Morph kind tag for the base ("skin") entry. Vertices listed by the base
/// morph are the morph-capable set the converter routes to the shared skin
/// bucket; nonzero kinds are the actual named expression morphs.
pub const MORPH_KIND_BASE: u8 = 0;

/// One displacement entry of a morph target.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct PmdMorphVertex {
    pub vertex_index: u32,

    #[br(map = MmdVector3::flipped_z)]
    pub offset: MmdVector3,
}

/// A morph target ("skin" in the source format's terms).
///
/// For the base morph the entries carry the rest positions of every
/// morph-capable vertex; for the others they carry displacements keyed by
/// position in the base list.
#[binread]
#[derive(Debug, Clone, PartialEq)]
#[br(little)]
pub struct PmdMorph {
    #[br(try_map = |raw: [u8; 20]| decode_fixed_str(&raw))]
    pub name: String,

    #[br(temp)]
    vert_count: u32,

    pub kind: u8,

    #[br(count = vert_count)]
    pub vertices: Vec<PmdMorphVertex>,
}

impl PmdMorph {
    pub fn is_base(&self) -> bool {
        self.kind == MORPH_KIND_BASE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinRead;
    use std::io::Cursor;

    use crate::text::encode_fixed_str;

    #[test]
    fn test_morph_record_decodes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&encode_fixed_str::<20>("笑い"));
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.push(2);
        for (index, offset) in [(4u32, [0.0f32, 0.1, 0.0]), (9, [0.0, -0.1, 0.2])] {
            bytes.extend_from_slice(&index.to_le_bytes());
            for f in offset {
                bytes.extend_from_slice(&f.to_le_bytes());
            }
        }

        let morph = PmdMorph::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(morph.name, "笑い");
        assert_eq!(morph.kind, 2);
        assert!(!morph.is_base());
        assert_eq!(morph.vertices.len(), 2);
        assert_eq!(morph.vertices[0].vertex_index, 4);
        assert_eq!(morph.vertices[1].offset.to_slice(), [0.0, -0.1, -0.2]);
    }
}
