//! Binary cache of a converted mesh.
//!
//! Little-endian, length-prefixed blocks: the batch list, then the skin
//! bucket's buffers in fixed field order, its bone table, and the
//! material-ordinal-keyed index blocks. A round trip restores every buffer
//! byte for byte, so startup can skip conversion entirely.

use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinWrite};
use log::debug;

use super::batch::BatchMesh;
use super::skin::SkinMesh;
use crate::error::Result;

/// The full output of one conversion: every sealed batch plus the shared
/// skin bucket. Restorable from a cache stream without the source model;
/// batches reference materials by stable ordinal only.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedMesh {
    #[br(temp)]
    #[bw(calc = batches.len() as u32)]
    batch_count: u32,

    #[br(count = batch_count)]
    pub batches: Vec<BatchMesh>,

    pub skin: SkinMesh,
}

impl ConvertedMesh {
    /// Serializes to a cache stream.
    pub fn write_cache<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        self.write(writer)?;
        debug!(
            "wrote mesh cache: {} batches, {} skin vertices",
            self.batches.len(),
            self.skin.vertex_count(),
        );
        Ok(())
    }

    /// Restores a previously written cache stream, bypassing conversion.
    pub fn read_cache<R: Read + Seek>(reader: &mut R) -> Result<ConvertedMesh> {
        let mesh = ConvertedMesh::read(reader)?;
        debug!(
            "restored mesh cache: {} batches, {} skin vertices",
            mesh.batches.len(),
            mesh.skin.vertex_count(),
        );
        Ok(mesh)
    }
}
