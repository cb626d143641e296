use std::collections::HashMap;

use binrw::binrw;

use crate::model::{PmdModel, PmdVertex};

/// Slot order of the per-batch field offset table: position, normal,
/// texcoord, bone indices, bone weights. `-1` marks an absent field.
pub const OFFSET_SLOT_COUNT: usize = 5;

/// Interleaved stride with / without the texcoord field.
pub const STRIDE_WITH_UV: u32 = 44;
pub const STRIDE_WITHOUT_UV: u32 = 36;

/// One sealed draw batch: an interleaved vertex buffer, a 16-bit index
/// buffer, and the local-to-global bone palette. Frozen once emitted;
/// also the cache-stream record for the batch.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct BatchMesh {
    /// Stable ordinal of the owning material.
    pub material_no: u32,

    pub stride: u32,

    /// Byte offset of each field within one vertex; see
    /// [`OFFSET_SLOT_COUNT`].
    pub offsets: [i8; OFFSET_SLOT_COUNT],

    #[br(temp)]
    #[bw(calc = bone_table.len() as u32)]
    bone_count: u32,

    /// Global bone index for each local palette slot.
    #[br(count = bone_count)]
    pub bone_table: Vec<u16>,

    #[br(temp)]
    #[bw(calc = interleaved.len() as u32)]
    vertex_byte_len: u32,

    /// Native-byte-order interleaved vertex data, `stride` bytes per
    /// vertex.
    #[br(count = vertex_byte_len)]
    pub interleaved: Vec<u8>,

    #[br(temp)]
    #[bw(calc = (indices.len() * 2) as u32)]
    index_byte_len: u32,

    #[br(count = index_byte_len / 2)]
    pub indices: Vec<u16>,
}

impl BatchMesh {
    pub fn vertex_count(&self) -> usize {
        self.interleaved.len() / self.stride as usize
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_texcoords(&self) -> bool {
        self.offsets[2] >= 0
    }
}

/// Incremental state of one open batch. Deduplicates vertices into local
/// slots and tracks the distinct bones its vertices reference; sealed by
/// the converter when the bone budget or the 16-bit index space would
/// overflow.
pub(crate) struct BatchBuilder {
    material_no: u32,
    max_bone_count: usize,
    vert_indices: Vec<u16>,
    local_of: HashMap<u16, u16>,
    indices: Vec<u16>,
    bones: Vec<u16>,
    bone_local: HashMap<u16, u16>,
}

impl BatchBuilder {
    pub fn new(material_no: u32, max_bone_count: usize) -> Self {
        BatchBuilder {
            material_no,
            max_bone_count,
            vert_indices: Vec::new(),
            local_of: HashMap::new(),
            indices: Vec::new(),
            bones: Vec::new(),
            bone_local: HashMap::new(),
        }
    }

    pub fn material_no(&self) -> u32 {
        self.material_no
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Whether admitting `vertex` would push the distinct-bone count past
    /// the budget. This is the single invariant batching must never
    /// violate: the palette slots are consumed per batch by the skinning
    /// stage.
    pub fn would_exceed_bone_budget(&self, vertex: &PmdVertex) -> bool {
        let [b1, b2] = vertex.bone_index;
        let mut extra = 0;
        if !self.bone_local.contains_key(&b1) {
            extra += 1;
        }
        if b2 != b1 && !self.bone_local.contains_key(&b2) {
            extra += 1;
        }
        self.bones.len() + extra > self.max_bone_count
    }

    /// Admits a whole triangle, or refuses without side effects when the
    /// bone budget or the 16-bit local index space cannot take it.
    pub fn try_add_triangle(&mut self, model: &PmdModel, tri: [u16; 3]) -> bool {
        let mut pending_bones: Vec<u16> = Vec::new();
        let mut pending_verts: Vec<u16> = Vec::new();
        for &vi in &tri {
            let v = &model.vertices[vi as usize];
            for b in v.bone_index {
                if !self.bone_local.contains_key(&b) && !pending_bones.contains(&b) {
                    pending_bones.push(b);
                }
            }
            if !self.local_of.contains_key(&vi) && !pending_verts.contains(&vi) {
                pending_verts.push(vi);
            }
        }
        if self.bones.len() + pending_bones.len() > self.max_bone_count {
            return false;
        }
        if self.vert_indices.len() + pending_verts.len() > 0x10000 {
            return false;
        }

        for b in pending_bones {
            self.bone_local.insert(b, self.bones.len() as u16);
            self.bones.push(b);
        }
        for &vi in &tri {
            let local = match self.local_of.get(&vi) {
                Some(&local) => local,
                None => {
                    let local = self.vert_indices.len() as u16;
                    self.local_of.insert(vi, local);
                    self.vert_indices.push(vi);
                    local
                }
            };
            self.indices.push(local);
        }
        true
    }

    /// Emits the frozen buffers. Field layout: position (12B), normal
    /// (12B), texcoord (8B, only when the material has a texture
    /// reference), two u16 local bone indices, two f32 weights.
    pub fn build(self, model: &PmdModel) -> BatchMesh {
        let has_uv = model.materials[self.material_no as usize].has_texture();
        let (stride, offsets) = if has_uv {
            (STRIDE_WITH_UV, [0, 12, 24, 32, 36])
        } else {
            (STRIDE_WITHOUT_UV, [0, 12, -1, 24, 28])
        };

        let mut interleaved = Vec::with_capacity(stride as usize * self.vert_indices.len());
        for &vi in &self.vert_indices {
            let v = &model.vertices[vi as usize];
            interleaved.extend_from_slice(bytemuck::bytes_of(&v.position.to_slice()));
            interleaved.extend_from_slice(bytemuck::bytes_of(&v.normal.to_slice()));
            if has_uv {
                interleaved.extend_from_slice(bytemuck::bytes_of(&v.uv.to_slice()));
            }
            for b in v.bone_index {
                let local = self.bone_local.get(&b).copied().unwrap_or(0);
                interleaved.extend_from_slice(bytemuck::bytes_of(&local));
            }
            let w = v.weight();
            interleaved.extend_from_slice(bytemuck::bytes_of(&[w, 1.0 - w]));
        }

        BatchMesh {
            material_no: self.material_no,
            stride,
            offsets,
            bone_table: self.bones,
            interleaved,
            indices: self.indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_fixtures::{empty_model, material, vertex};

    #[test]
    fn test_dedup_assigns_one_slot_per_vertex() {
        let mut model = empty_model(2);
        model.vertices = vec![
            vertex(0.0, [0, 1], 50),
            vertex(1.0, [0, 1], 50),
            vertex(2.0, [0, 1], 50),
            vertex(3.0, [0, 1], 50),
        ];
        model.materials = vec![material(6, "", 0)];

        let mut builder = BatchBuilder::new(0, 20);
        assert!(builder.try_add_triangle(&model, [0, 1, 2]));
        assert!(builder.try_add_triangle(&model, [2, 1, 3]));
        let batch = builder.build(&model);

        // four distinct vertices across two triangles sharing an edge
        assert_eq!(batch.vertex_count(), 4);
        assert_eq!(batch.indices, vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn test_bone_budget_predicate() {
        let mut model = empty_model(6);
        model.vertices = vec![vertex(0.0, [0, 1], 50), vertex(1.0, [2, 3], 50)];

        let mut builder = BatchBuilder::new(0, 3);
        assert!(!builder.would_exceed_bone_budget(&model.vertices[0]));
        assert!(builder.try_add_triangle(&model, [0, 0, 0]));
        // bones {0, 1} admitted; {2, 3} would make four of a budget of 3
        assert!(builder.would_exceed_bone_budget(&model.vertices[1]));
    }

    #[test]
    fn test_budget_counts_duplicate_influences_once() {
        let model = {
            let mut m = empty_model(2);
            m.vertices = vec![vertex(0.0, [1, 1], 100)];
            m
        };
        let builder = BatchBuilder::new(0, 1);
        assert!(!builder.would_exceed_bone_budget(&model.vertices[0]));
    }

    #[test]
    fn test_refused_triangle_leaves_builder_unchanged() {
        let mut model = empty_model(4);
        model.vertices = vec![
            vertex(0.0, [0, 1], 50),
            vertex(1.0, [1, 2], 50),
            vertex(2.0, [2, 3], 50),
        ];

        let mut builder = BatchBuilder::new(0, 2);
        assert!(!builder.try_add_triangle(&model, [0, 1, 2]));
        assert!(builder.is_empty());
        assert_eq!(builder.bone_count(), 0);
    }

    #[test]
    fn test_layout_without_texture() {
        let mut model = empty_model(1);
        model.vertices = vec![vertex(0.0, [0, 0], 100); 3];
        model.materials = vec![material(3, "", 0)];

        let mut builder = BatchBuilder::new(0, 20);
        assert!(builder.try_add_triangle(&model, [0, 1, 2]));
        let batch = builder.build(&model);

        assert_eq!(batch.stride, STRIDE_WITHOUT_UV);
        assert_eq!(batch.offsets, [0, 12, -1, 24, 28]);
        assert!(!batch.has_texcoords());
        assert_eq!(batch.interleaved.len(), 3 * 36);
    }

    #[test]
    fn test_layout_with_texture_and_weights() {
        let mut model = empty_model(2);
        model.vertices = vec![vertex(0.0, [1, 0], 75); 3];
        model.materials = vec![material(3, "face.png", 0)];

        let mut builder = BatchBuilder::new(0, 20);
        assert!(builder.try_add_triangle(&model, [0, 1, 2]));
        let batch = builder.build(&model);

        assert_eq!(batch.stride, STRIDE_WITH_UV);
        assert_eq!(batch.offsets, [0, 12, 24, 32, 36]);

        // vertex 0: local bone indices at +32, weights at +36
        let bone_bytes = &batch.interleaved[32..36];
        assert_eq!(
            u16::from_ne_bytes([bone_bytes[0], bone_bytes[1]]),
            0,
            "first influence (global bone 1) takes local slot 0"
        );
        assert_eq!(u16::from_ne_bytes([bone_bytes[2], bone_bytes[3]]), 1);
        let w1 = f32::from_ne_bytes(batch.interleaved[36..40].try_into().unwrap());
        let w2 = f32::from_ne_bytes(batch.interleaved[40..44].try_into().unwrap());
        assert!((w1 - 0.75).abs() < 1e-6);
        assert!((w1 + w2 - 1.0).abs() < 1e-6);
    }
}
