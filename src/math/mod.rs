use binrw::binread;
use cgmath::{InnerSpace, Quaternion, Vector2, Vector3};

/// Three-component float vector as stored in PMD/VMD streams.
///
/// Decodes the raw little-endian triple; handedness conversion is applied
/// separately by the parsers via [`MmdVector3::flipped_z`].
#[binread]
#[derive(Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct MmdVector3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))] pub Vector3<f32>,
);

impl MmdVector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        MmdVector3(Vector3::new(x, y, z))
    }

    pub fn to_slice(&self) -> [f32; 3] {
        let v = &self.0;
        [v.x, v.y, v.z]
    }

    /// Sign-flips the z component (left-handed source data to the
    /// right-handed convention the converted buffers use).
    pub fn flipped_z(mut self) -> Self {
        self.0.z = -self.0.z;
        self
    }

    /// Unit-length copy; zero vectors are returned untouched.
    pub fn normalized(self) -> Self {
        if self.0.magnitude2() > 0.0 {
            MmdVector3(self.0.normalize())
        } else {
            self
        }
    }
}

impl Default for MmdVector3 {
    fn default() -> Self {
        MmdVector3(Vector3::new(0.0, 0.0, 0.0))
    }
}

#[binread]
#[derive(Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct MmdVector2(
    #[br(map = |raw: [f32; 2]| Vector2::new(raw[0], raw[1]))] pub Vector2<f32>,
);

impl MmdVector2 {
    pub fn new(x: f32, y: f32) -> Self {
        MmdVector2(Vector2::new(x, y))
    }

    pub fn to_slice(&self) -> [f32; 2] {
        let v = &self.0;
        [v.x, v.y]
    }
}

impl Default for MmdVector2 {
    fn default() -> Self {
        MmdVector2(Vector2::new(0.0, 0.0))
    }
}

/// Rotation quaternion stored on disk as (x, y, z, w).
#[binread]
#[derive(Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct MmdQuaternion(
    #[br(map = |raw: [f32; 4]| Quaternion::new(raw[3], raw[0], raw[1], raw[2]))]
    pub Quaternion<f32>,
);

impl MmdQuaternion {
    pub fn identity() -> Self {
        MmdQuaternion(Quaternion::new(1.0, 0.0, 0.0, 0.0))
    }

    /// Disk order: (x, y, z, w).
    pub fn to_slice(&self) -> [f32; 4] {
        let q = &self.0;
        [q.v.x, q.v.y, q.v.z, q.s]
    }
}

impl Default for MmdQuaternion {
    fn default() -> Self {
        Self::identity()
    }
}
