//! VMD motion file decoding.
//!
//! Bone keyframes are decoded into an arena in file order; a stable index
//! permutation sorted by frame number gives playback a monotonically
//! non-decreasing view without relocating the records. Morph keyframes are
//! left in file order, matching the source format's observed asymmetry;
//! [`VmdLoadOptions::sort_morph_keyframes`] opts into sorting them with the
//! same stable rule.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use binrw::BinRead;
use log::debug;
use serde::Serialize;

use crate::error::{MmdError, Result};
use crate::math::{MmdQuaternion, MmdVector3};
use crate::text::decode_fixed_str;

/// Required content of the 30-byte header field, NUL padding excluded.
pub const VMD_MAGIC: &[u8] = b"Vocaloid Motion Data 0002";

/// One bone keyframe. `bone_name_id` indexes the motion's interned name
/// table; the interpolation curve bytes are carried opaquely.
#[derive(Debug, Clone)]
pub struct VmdBoneKeyframe {
    pub bone_name_id: u16,
    pub frame_no: u32,
    pub position: MmdVector3,
    pub rotation: MmdQuaternion,
    pub interpolation: [u8; 64],
}

/// One morph keyframe.
#[derive(Debug, Clone)]
pub struct VmdMorphKeyframe {
    pub morph_name: String,
    pub frame_no: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VmdLoadOptions {
    /// Stable-sort morph keyframes by frame number as well. Off by
    /// default: the source format never sorted them.
    pub sort_morph_keyframes: bool,
}

/// Counts reported by the CLI inspector.
#[derive(Debug, Serialize)]
pub struct MotionSummary {
    pub model_name: String,
    pub bone_keyframe_count: usize,
    pub distinct_bone_count: usize,
    pub morph_keyframe_count: usize,
    pub last_frame: u32,
}

/// A parsed VMD motion. Immutable after loading; accessors return owned
/// records, so concurrent readers need no external locking.
#[derive(Debug)]
pub struct VmdMotion {
    model_name: String,
    bone_names: Vec<String>,
    keyframes: Vec<VmdBoneKeyframe>,
    order: Vec<u32>,
    morph_keyframes: Vec<VmdMorphKeyframe>,
}

impl VmdMotion {
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<VmdMotion> {
        Self::from_reader_with(reader, VmdLoadOptions::default())
    }

    pub fn from_reader_with<R: Read + Seek>(
        reader: &mut R,
        options: VmdLoadOptions,
    ) -> Result<VmdMotion> {
        // The magic is checked before anything is allocated.
        let header = <[u8; 30]>::read_le(reader)?;
        let end = header.iter().position(|&b| b == 0).unwrap_or(header.len());
        if &header[..end] != VMD_MAGIC {
            return Err(MmdError::Format(format!(
                "not a VMD stream (header {:?})",
                String::from_utf8_lossy(&header[..end])
            )));
        }

        let name_raw = <[u8; 20]>::read_le(reader)?;
        let model_name =
            decode_fixed_str(&name_raw).map_err(|e| MmdError::Encoding(e.to_string()))?;

        let keyframe_count = u32::read_le(reader)?;
        let mut bone_names: Vec<String> = Vec::new();
        let mut name_ids: HashMap<String, u16> = HashMap::new();
        let mut keyframes = Vec::with_capacity(keyframe_count as usize);
        for _ in 0..keyframe_count {
            let raw = <[u8; 15]>::read_le(reader)?;
            let name = decode_fixed_str(&raw).map_err(|e| MmdError::Encoding(e.to_string()))?;
            let bone_name_id = match name_ids.get(&name) {
                Some(&id) => id,
                None => {
                    if bone_names.len() > u16::MAX as usize {
                        return Err(MmdError::Format(
                            "more than 65536 distinct bone names".to_string(),
                        ));
                    }
                    let id = bone_names.len() as u16;
                    name_ids.insert(name.clone(), id);
                    bone_names.push(name);
                    id
                }
            };
            let frame_no = u32::read_le(reader)?;
            let position = MmdVector3::read_le(reader)?.flipped_z();
            let rotation = MmdQuaternion::read_le(reader)?;
            let interpolation = <[u8; 64]>::read_le(reader)?;
            keyframes.push(VmdBoneKeyframe {
                bone_name_id,
                frame_no,
                position,
                rotation,
                interpolation,
            });
        }

        // Stable by construction: equal frame numbers keep file order, so
        // several bones keyframed on one frame stay in a consistent order.
        let mut order: Vec<u32> = (0..keyframe_count).collect();
        order.sort_by_key(|&i| keyframes[i as usize].frame_no);

        let morph_count = u32::read_le(reader)?;
        let mut morph_keyframes = Vec::with_capacity(morph_count as usize);
        for _ in 0..morph_count {
            let raw = <[u8; 15]>::read_le(reader)?;
            let morph_name =
                decode_fixed_str(&raw).map_err(|e| MmdError::Encoding(e.to_string()))?;
            let frame_no = u32::read_le(reader)?;
            let weight = f32::read_le(reader)?;
            morph_keyframes.push(VmdMorphKeyframe {
                morph_name,
                frame_no,
                weight,
            });
        }
        if options.sort_morph_keyframes {
            morph_keyframes.sort_by_key(|m| m.frame_no);
        }

        debug!(
            "loaded VMD motion for '{}': {} bone keyframes over {} bones, {} morph keyframes",
            model_name,
            keyframes.len(),
            bone_names.len(),
            morph_keyframes.len(),
        );
        Ok(VmdMotion {
            model_name,
            bone_names,
            keyframes,
            order,
            morph_keyframes,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<VmdMotion> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::from_reader(&mut reader)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn bone_keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// The keyframe at `pos` in frame-number order, as an owned record.
    ///
    /// # Panics
    /// Panics if `pos >= bone_keyframe_count()`.
    pub fn bone_keyframe(&self, pos: usize) -> VmdBoneKeyframe {
        self.keyframes[self.order[pos] as usize].clone()
    }

    /// Keyframes in frame-number order.
    pub fn bone_keyframes(&self) -> impl Iterator<Item = &VmdBoneKeyframe> + '_ {
        self.order.iter().map(|&i| &self.keyframes[i as usize])
    }

    /// Interned bone names; `VmdBoneKeyframe::bone_name_id` indexes this.
    pub fn bone_names(&self) -> &[String] {
        &self.bone_names
    }

    pub fn bone_name(&self, id: u16) -> &str {
        &self.bone_names[id as usize]
    }

    /// Morph keyframes in stored order (file order unless
    /// [`VmdLoadOptions::sort_morph_keyframes`] was set).
    pub fn morph_keyframes(&self) -> &[VmdMorphKeyframe] {
        &self.morph_keyframes
    }

    pub fn summary(&self) -> MotionSummary {
        MotionSummary {
            model_name: self.model_name.clone(),
            bone_keyframe_count: self.keyframes.len(),
            distinct_bone_count: self.bone_names.len(),
            morph_keyframe_count: self.morph_keyframes.len(),
            last_frame: self
                .bone_keyframes()
                .last()
                .map(|k| k.frame_no)
                .unwrap_or(0),
        }
    }
}
