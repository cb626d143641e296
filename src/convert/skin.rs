use std::collections::{BTreeMap, HashMap};

use binrw::binrw;

use crate::error::{MmdError, Result};
use crate::model::PmdModel;

/// Per-material index sub-buffer of the skin bucket, keyed by the stable
/// material ordinal.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct SkinIndexBlock {
    pub material_no: u32,

    #[br(temp)]
    #[bw(calc = (indices.len() * 2) as u32)]
    byte_len: u32,

    #[br(count = byte_len / 2)]
    pub indices: Vec<u16>,
}

/// The shared buffer set for all morph-affected geometry.
///
/// One deduplicated vertex list serves every material that routed a
/// triangle here, so morph displacements stay addressable through a single
/// position buffer. Split (non-interleaved) buffers, all native byte
/// order; also the cache-stream record for the bucket.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct SkinMesh {
    #[br(temp)]
    #[bw(calc = positions.len() as u32)]
    position_byte_len: u32,

    /// 3 x f32 per vertex.
    #[br(count = position_byte_len)]
    pub positions: Vec<u8>,

    #[br(temp)]
    #[bw(calc = normals.len() as u32)]
    normal_byte_len: u32,

    /// 3 x f32 per vertex, re-normalized at emission.
    #[br(count = normal_byte_len)]
    pub normals: Vec<u8>,

    #[br(temp)]
    #[bw(calc = texcoords.len() as u32)]
    texcoord_byte_len: u32,

    /// 2 x f32 per vertex, v flipped to the target texture-space
    /// convention.
    #[br(count = texcoord_byte_len)]
    pub texcoords: Vec<u8>,

    #[br(temp)]
    #[bw(calc = weights.len() as u32)]
    weight_byte_len: u32,

    /// 2 x f32 per vertex.
    #[br(count = weight_byte_len)]
    pub weights: Vec<u8>,

    #[br(temp)]
    #[bw(calc = bone_indices.len() as u32)]
    bone_index_byte_len: u32,

    /// 2 x u16 local bone indices per vertex.
    #[br(count = bone_index_byte_len)]
    pub bone_indices: Vec<u8>,

    #[br(temp)]
    #[bw(calc = bone_table.len() as u32)]
    bone_table_len: u32,

    /// Global skeleton bone index for each local palette slot; what the
    /// animation player uses to map palette entries back to bones.
    #[br(count = bone_table_len)]
    pub bone_table: Vec<i32>,

    #[br(temp)]
    #[bw(calc = index_blocks.len() as u32)]
    material_block_count: u32,

    #[br(count = material_block_count)]
    pub index_blocks: Vec<SkinIndexBlock>,
}

impl SkinMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 12
    }

    pub fn index_block(&self, material_no: u32) -> Option<&SkinIndexBlock> {
        self.index_blocks
            .iter()
            .find(|b| b.material_no == material_no)
    }
}

/// Accumulates morph-affected geometry during conversion.
///
/// Seeded with every vertex of the base morph, then grown triangle by
/// triangle exactly like a batch, except there is no bone ceiling: the
/// bucket must stay whole so morph logic can address its vertices
/// regardless of batch boundaries.
pub(crate) struct SkinMeshBuilder {
    vert_indices: Vec<u16>,
    local_of: HashMap<u16, u16>,
    bones: Vec<u16>,
    bone_local: HashMap<u16, u16>,
    index_map: BTreeMap<u32, Vec<u16>>,
}

impl SkinMeshBuilder {
    /// Seeds the vertex list from the base morph, first-seen order.
    pub fn seed(model: &PmdModel) -> Self {
        let mut builder = SkinMeshBuilder {
            vert_indices: Vec::new(),
            local_of: HashMap::new(),
            bones: Vec::new(),
            bone_local: HashMap::new(),
            index_map: BTreeMap::new(),
        };
        if let Some(base) = model.base_morph() {
            for entry in &base.vertices {
                let vi = entry.vertex_index as u16;
                if !builder.local_of.contains_key(&vi) {
                    let local = builder.vert_indices.len() as u16;
                    builder.local_of.insert(vi, local);
                    builder.vert_indices.push(vi);
                }
            }
        }
        builder
    }

    pub fn add_triangle(&mut self, model: &PmdModel, material_no: u32, tri: [u16; 3]) -> Result<()> {
        for &vi in &tri {
            let v = &model.vertices[vi as usize];
            for b in v.bone_index {
                if !self.bone_local.contains_key(&b) {
                    self.bone_local.insert(b, self.bones.len() as u16);
                    self.bones.push(b);
                }
            }
        }
        let mut locals = [0u16; 3];
        for (slot, &vi) in locals.iter_mut().zip(&tri) {
            *slot = match self.local_of.get(&vi) {
                Some(&local) => local,
                None => {
                    if self.vert_indices.len() >= 0x10000 {
                        return Err(MmdError::Format(
                            "skin bucket exceeds the 16-bit index space".to_string(),
                        ));
                    }
                    let local = self.vert_indices.len() as u16;
                    self.local_of.insert(vi, local);
                    self.vert_indices.push(vi);
                    local
                }
            };
        }
        self.index_map
            .entry(material_no)
            .or_default()
            .extend_from_slice(&locals);
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vert_indices.len()
    }

    pub fn build(self, model: &PmdModel) -> SkinMesh {
        let n = self.vert_indices.len();
        let mut positions = Vec::with_capacity(n * 12);
        let mut normals = Vec::with_capacity(n * 12);
        let mut texcoords = Vec::with_capacity(n * 8);
        let mut weights = Vec::with_capacity(n * 8);
        let mut bone_indices = Vec::with_capacity(n * 4);

        for &vi in &self.vert_indices {
            let v = &model.vertices[vi as usize];
            positions.extend_from_slice(bytemuck::bytes_of(&v.position.to_slice()));
            normals.extend_from_slice(bytemuck::bytes_of(&v.normal.normalized().to_slice()));
            let [u, tex_v] = v.uv.to_slice();
            texcoords.extend_from_slice(bytemuck::bytes_of(&[u, 1.0 - tex_v]));
            // a seeded vertex no routed triangle referenced resolves to 0
            for b in v.bone_index {
                let local = self.bone_local.get(&b).copied().unwrap_or(0);
                bone_indices.extend_from_slice(bytemuck::bytes_of(&local));
            }
            let w = v.weight();
            weights.extend_from_slice(bytemuck::bytes_of(&[w, 1.0 - w]));
        }

        let bone_table = self.bones.iter().map(|&b| i32::from(b)).collect();
        let index_blocks = self
            .index_map
            .into_iter()
            .map(|(material_no, indices)| SkinIndexBlock {
                material_no,
                indices,
            })
            .collect();

        SkinMesh {
            positions,
            normals,
            texcoords,
            weights,
            bone_indices,
            bone_table,
            index_blocks,
        }
    }
}
