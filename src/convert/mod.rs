//! Mesh conversion: material-partitioned draw batches plus the shared
//! skin bucket.
//!
//! Triangles are walked in file order, material run by material run. A
//! triangle touching any morph-capable vertex is routed whole to the skin
//! bucket so morph displacements never straddle a batch boundary; every
//! other triangle lands in the open batch for its material, which seals
//! and reopens whenever the distinct-bone budget would overflow.

mod batch;
mod cache;
mod skin;

pub use batch::{BatchMesh, OFFSET_SLOT_COUNT, STRIDE_WITHOUT_UV, STRIDE_WITH_UV};
pub use cache::ConvertedMesh;
pub use skin::{SkinIndexBlock, SkinMesh};

use std::collections::HashSet;

use log::debug;

use crate::error::{MmdError, Result};
use crate::model::PmdModel;

use batch::BatchBuilder;
use skin::SkinMeshBuilder;

/// Default ceiling on distinct bones referenced by one batch. The local
/// bone indices in the interleaved buffer address a per-batch palette the
/// skinning shader uploads whole, so a batch must never reference more
/// bones than the palette holds.
pub const DEFAULT_MAX_BONE_COUNT: usize = 20;

/// Converts a parsed model into renderer-ready buffers. Conversion is
/// all-or-nothing over a model; there are no recoverable mid-pass errors.
pub struct MeshConverter<'a> {
    model: &'a PmdModel,
    max_bone_count: usize,
}

impl<'a> MeshConverter<'a> {
    pub fn new(model: &'a PmdModel) -> Self {
        MeshConverter {
            model,
            max_bone_count: DEFAULT_MAX_BONE_COUNT,
        }
    }

    /// Overrides the distinct-bone ceiling. Values below 6 can make a
    /// single triangle unplaceable (three vertices, two influences each);
    /// conversion then fails instead of looping.
    pub fn with_max_bone_count(mut self, max_bone_count: usize) -> Self {
        self.max_bone_count = max_bone_count;
        self
    }

    pub fn max_bone_count(&self) -> usize {
        self.max_bone_count
    }

    pub fn convert(&self) -> Result<ConvertedMesh> {
        // trust nothing: a model built or patched outside from_reader may
        // carry references the walk below would index with
        self.model.validate()?;

        let skin_verts: HashSet<u16> = self
            .model
            .base_morph()
            .map(|base| {
                base.vertices
                    .iter()
                    .map(|entry| entry.vertex_index as u16)
                    .collect()
            })
            .unwrap_or_default();

        let mut skin = SkinMeshBuilder::seed(self.model);
        let mut builders: Vec<BatchBuilder> = Vec::new();
        let mut cursor = 0usize;

        for (material_no, material) in self.model.materials.iter().enumerate() {
            let material_no = material_no as u32;
            let run = material.face_vert_count as usize;
            let faces = &self.model.face_indices[cursor..cursor + run];
            cursor += run;
            if run == 0 {
                continue;
            }

            // reopen the latest batch of a structurally equal material so
            // adjacent same-material runs merge into one draw unit
            let mut current = match builders
                .iter()
                .rposition(|b| self.model.materials[b.material_no() as usize] == *material)
            {
                Some(found) => found,
                None => {
                    builders.push(BatchBuilder::new(material_no, self.max_bone_count));
                    builders.len() - 1
                }
            };

            for tri in faces.chunks_exact(3) {
                let tri = [tri[0], tri[1], tri[2]];
                if tri.iter().any(|vi| skin_verts.contains(vi)) {
                    skin.add_triangle(self.model, material_no, tri)?;
                } else if !builders[current].try_add_triangle(self.model, tri) {
                    debug!(
                        "sealing batch for material {} at {} bones",
                        builders[current].material_no(),
                        builders[current].bone_count(),
                    );
                    builders.push(BatchBuilder::new(material_no, self.max_bone_count));
                    current = builders.len() - 1;
                    if !builders[current].try_add_triangle(self.model, tri) {
                        return Err(MmdError::Format(format!(
                            "triangle references more bones than the budget of {}",
                            self.max_bone_count
                        )));
                    }
                }
            }
        }

        let batches: Vec<BatchMesh> = builders
            .into_iter()
            .filter(|b| !b.is_empty())
            .map(|b| b.build(self.model))
            .collect();
        let skin_mesh = skin.build(self.model);
        debug!(
            "converted mesh: {} batches, {} skin vertices",
            batches.len(),
            skin_mesh.vertex_count(),
        );
        Ok(ConvertedMesh {
            batches,
            skin: skin_mesh,
        })
    }
}
