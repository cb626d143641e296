use binrw::binread;

use crate::math::{MmdVector2, MmdVector3};

/// One 38-byte vertex record.
///
/// Position and normal are converted to the right-handed convention at
/// decode time. The weight is an integer percentage toward the first bone
/// influence; the complement applies to the second.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct PmdVertex {
    #[br(map = MmdVector3::flipped_z)]
    pub position: MmdVector3,

    #[br(map = MmdVector3::flipped_z)]
    pub normal: MmdVector3,

    pub uv: MmdVector2,

    /// Global bone indices of the two influences.
    pub bone_index: [u16; 2],

    /// Weight of the first influence, 0..=100.
    pub bone_weight: u8,

    /// Nonzero disables the outline edge for this vertex.
    pub edge_flag: u8,
}

impl PmdVertex {
    /// First-influence weight as a 0..=1 float; the second influence
    /// weighs `1.0 - weight()`.
    pub fn weight(&self) -> f32 {
        f32::from(self.bone_weight) / 100.0
    }
}
