use binrw::binread;

use crate::math::MmdVector3;
use crate::text::decode_fixed_str;

/// Sentinel for "no parent" / "no tail" bone references.
pub const BONE_INDEX_NONE: u16 = 0xffff;

/// Behavior tag of a bone. Closed enumeration; any other tag byte is a
/// format error. Tag 3 is unassigned in the source format.
#[repr(u8)]
#[binread]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[br(little, repr = u8)]
pub enum BoneKind {
    Rotation = 0,
    RotationTranslation = 1,
    Ik = 2,
    IkLinked = 4,
    RotationLinked = 5,
    IkTarget = 6,
    Hidden = 7,
    Twist = 8,
    RotationDriven = 9,
}

/// One 39-byte bone record.
#[binread]
#[derive(Debug, Clone, PartialEq)]
#[br(little)]
pub struct PmdBone {
    #[br(try_map = |raw: [u8; 20]| decode_fixed_str(&raw))]
    pub name: String,

    /// Parent bone index, or [`BONE_INDEX_NONE`].
    pub parent_index: u16,

    /// Tail bone index defining the local forward axis, or
    /// [`BONE_INDEX_NONE`].
    pub tail_index: u16,

    pub kind: BoneKind,

    /// Influencing bone for IK-linked / rotation-linked kinds; 0 when
    /// unused.
    pub ik_target_index: u16,

    #[br(map = MmdVector3::flipped_z)]
    pub head_position: MmdVector3,
}

impl PmdBone {
    pub fn parent(&self) -> Option<u16> {
        (self.parent_index != BONE_INDEX_NONE).then_some(self.parent_index)
    }

    pub fn tail(&self) -> Option<u16> {
        (self.tail_index != BONE_INDEX_NONE).then_some(self.tail_index)
    }
}

/// One IK chain: the IK bone drives `chain` toward the target.
#[binread]
#[derive(Debug, Clone, PartialEq)]
#[br(little)]
pub struct PmdIkChain {
    pub ik_bone_index: u16,
    pub target_bone_index: u16,

    #[br(temp)]
    chain_length: u8,

    pub iteration_count: u16,
    pub control_weight: f32,

    #[br(count = chain_length)]
    pub chain: Vec<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinRead;
    use std::io::Cursor;

    use crate::text::encode_fixed_str;

    fn bone_record(kind: u8) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&encode_fixed_str::<20>("右腕"));
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.push(kind);
        bytes.extend_from_slice(&0u16.to_le_bytes());
        for f in [1.5f32, 10.0, 0.5] {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_bone_record_decodes() {
        let bytes = bone_record(1);
        assert_eq!(bytes.len(), 39);
        let bone = PmdBone::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(bone.name, "右腕");
        assert_eq!(bone.parent(), Some(1));
        assert_eq!(bone.tail(), Some(4));
        assert_eq!(bone.kind, BoneKind::RotationTranslation);
        assert_eq!(bone.head_position.to_slice(), [1.5, 10.0, -0.5]);
    }

    #[test]
    fn test_none_sentinel() {
        let mut bytes = bone_record(0);
        bytes[20..22].copy_from_slice(&BONE_INDEX_NONE.to_le_bytes());
        let bone = PmdBone::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(bone.parent(), None);
    }

    #[test]
    fn test_unassigned_kind_tag_is_rejected() {
        let bytes = bone_record(3);
        assert!(PmdBone::read(&mut Cursor::new(bytes)).is_err());
    }

    #[test]
    fn test_ik_chain_decodes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&12u16.to_le_bytes());
        bytes.extend_from_slice(&13u16.to_le_bytes());
        bytes.push(2);
        bytes.extend_from_slice(&15u16.to_le_bytes());
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        bytes.extend_from_slice(&10u16.to_le_bytes());
        bytes.extend_from_slice(&11u16.to_le_bytes());

        let chain = PmdIkChain::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(chain.ik_bone_index, 12);
        assert_eq!(chain.target_bone_index, 13);
        assert_eq!(chain.iteration_count, 15);
        assert_eq!(chain.chain, vec![10, 11]);
    }
}
