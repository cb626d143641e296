//! Decoders for the PMD model and VMD motion binary formats, and the mesh
//! conversion pipeline that turns a parsed model into renderer-ready
//! vertex/index buffers partitioned for skeletal skinning.
//!
//! The renderer, animation player, and asset layer live elsewhere; this
//! crate stops at correct, bounded, renderer-agnostic buffers and
//! time-sorted motion data.

pub mod convert;
pub mod error;
pub mod math;
pub mod model;
pub mod motion;
pub mod text;

pub use convert::{BatchMesh, ConvertedMesh, MeshConverter, SkinMesh, DEFAULT_MAX_BONE_COUNT};
pub use error::{MmdError, Result};
pub use model::PmdModel;
pub use motion::{VmdLoadOptions, VmdMotion};
