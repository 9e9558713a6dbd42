use std::any::Any;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, Replicate};
use crate::error::ReplicationError;

const FLOAT_SIZE: usize = std::mem::size_of::<f32>();
const MATRIX_FLOATS: usize = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformEncoding {
    /// Local TRS matrix, column-major, bottom-right element omitted.
    #[default]
    Matrix,
    /// Translation change since the previous serialize. Lossy under packet
    /// loss: a dropped delta is never recovered.
    Delta,
}

impl TransformEncoding {
    pub fn payload_size(self) -> usize {
        match self {
            Self::Matrix => MATRIX_FLOATS * FLOAT_SIZE,
            Self::Delta => 3 * FLOAT_SIZE,
        }
    }

    pub fn kind(self) -> EntityKind {
        match self {
            Self::Matrix => EntityKind::TRANSFORM,
            Self::Delta => EntityKind::TRANSFORM_DELTA,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformReplica {
    matrix: Mat4,
    encoding: TransformEncoding,
    last_translation: Vec3,
}

impl Default for TransformReplica {
    fn default() -> Self {
        Self::new(TransformEncoding::Matrix)
    }
}

impl TransformReplica {
    pub fn new(encoding: TransformEncoding) -> Self {
        Self {
            matrix: Mat4::IDENTITY,
            encoding,
            last_translation: Vec3::ZERO,
        }
    }

    pub fn from_trs(
        scale: Vec3,
        rotation: Quat,
        translation: Vec3,
        encoding: TransformEncoding,
    ) -> Self {
        Self {
            matrix: Mat4::from_scale_rotation_translation(scale, rotation, translation),
            encoding,
            last_translation: translation,
        }
    }

    pub fn encoding(&self) -> TransformEncoding {
        self.encoding
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn translation(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }

    pub fn to_scale_rotation_translation(&self) -> (Vec3, Quat, Vec3) {
        self.matrix.to_scale_rotation_translation()
    }

    pub fn set_trs(&mut self, scale: Vec3, rotation: Quat, translation: Vec3) {
        self.matrix = Mat4::from_scale_rotation_translation(scale, rotation, translation);
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.matrix.w_axis = translation.extend(1.0);
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.set_translation(self.translation() + offset);
    }

    fn read_floats<const N: usize>(bytes: &[u8]) -> [f32; N] {
        let mut out = [0.0; N];
        for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(FLOAT_SIZE)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        out
    }
}

impl Replicate for TransformReplica {
    fn kind(&self) -> EntityKind {
        self.encoding.kind()
    }

    fn serialize(&mut self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoding.payload_size());
        match self.encoding {
            TransformEncoding::Matrix => {
                for value in &self.matrix.to_cols_array()[..MATRIX_FLOATS] {
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
            }
            TransformEncoding::Delta => {
                let translation = self.translation();
                let delta = translation - self.last_translation;
                self.last_translation = translation;
                for value in delta.to_array() {
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
        bytes
    }

    fn apply(&mut self, bytes: &[u8]) -> Result<(), ReplicationError> {
        let expected = self.encoding.payload_size();
        if bytes.len() != expected {
            return Err(ReplicationError::Length {
                expected,
                actual: bytes.len(),
            });
        }

        match self.encoding {
            TransformEncoding::Matrix => {
                let received: [f32; MATRIX_FLOATS] = Self::read_floats(bytes);
                let mut cols = [0.0; 16];
                cols[..MATRIX_FLOATS].copy_from_slice(&received);
                cols[15] = 1.0;
                self.matrix = Mat4::from_cols_array(&cols);
            }
            TransformEncoding::Delta => {
                let delta: [f32; 3] = Self::read_floats(bytes);
                self.translate(Vec3::from_array(delta));
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
