use std::{collections::BTreeMap, fs, path::Path};

use log::debug;
use ndarray::{ArrayD, IxDyn};
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use crate::{MlErr, Result};

/// Named parameter tensors, keyed `"{layer}.{param}"`.
pub type StateDict = BTreeMap<String, TensorData>;

/// A flat, row-major copy of a parameter tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorData {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl TensorData {
    pub fn from_array(a: &ArrayD<f32>) -> Self {
        Self {
            data: a.iter().copied().collect(),
            shape: a.shape().to_vec(),
        }
    }

    pub fn to_array(&self) -> Result<ArrayD<f32>> {
        Ok(ArrayD::from_shape_vec(IxDyn(&self.shape), self.data.clone())?)
    }
}

/// Keys that differ between the state a model expects and the one it's given.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StateDictDiff {
    pub missing_keys: Vec<String>,
    pub unexpected_keys: Vec<String>,
    /// `(key, expected, loaded)` shapes.
    pub shape_mismatches: Vec<(String, Vec<usize>, Vec<usize>)>,
}

impl StateDictDiff {
    pub fn is_empty(&self) -> bool {
        self.missing_keys.is_empty()
            && self.unexpected_keys.is_empty()
            && self.shape_mismatches.is_empty()
    }
}

/// Compares the state a model expects against a loaded one without touching either.
pub fn diff_state_dict(expected: &StateDict, loaded: &StateDict) -> StateDictDiff {
    let mut diff = StateDictDiff::default();

    for (key, td) in expected {
        match loaded.get(key) {
            None => diff.missing_keys.push(key.clone()),
            Some(other) if other.shape != td.shape => {
                diff.shape_mismatches
                    .push((key.clone(), td.shape.clone(), other.shape.clone()))
            }
            Some(_) => {}
        }
    }

    diff.unexpected_keys = loaded
        .keys()
        .filter(|k| !expected.contains_key(*k))
        .cloned()
        .collect();

    diff
}

/// Encodes a state dict in the safetensors format, every tensor as little-endian `F32`.
pub fn serialize(state: &StateDict) -> Result<Vec<u8>> {
    let views = state
        .iter()
        .map(|(key, td)| -> Result<(&str, TensorView<'_>)> {
            let bytes: &[u8] = bytemuck::cast_slice(&td.data);
            Ok((key.as_str(), TensorView::new(Dtype::F32, td.shape.clone(), bytes)?))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(safetensors::serialize(views, &None)?)
}

/// Decodes a safetensors buffer.
///
/// # Returns
/// The state dict or an error if the buffer is malformed or holds anything but `F32` tensors.
pub fn deserialize(buffer: &[u8]) -> Result<StateDict> {
    let tensors = SafeTensors::deserialize(buffer)?;
    let mut state = StateDict::new();

    for (key, view) in tensors.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(MlErr::UnsupportedDtype {
                key,
                dtype: format!("{:?}", view.dtype()),
            });
        }

        // The buffer offset of each tensor isn't guaranteed to be 4-aligned.
        let data = view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        state.insert(
            key,
            TensorData {
                data,
                shape: view.shape().to_vec(),
            },
        );
    }

    Ok(state)
}

/// Writes a state dict to `path` in the safetensors format.
pub fn save_safetensors<P: AsRef<Path>>(state: &StateDict, path: P) -> Result<()> {
    let bytes = serialize(state)?;
    fs::write(path.as_ref(), bytes)?;
    debug!(tensors = state.len(); "saved weights to {}", path.as_ref().display());
    Ok(())
}

/// Reads a state dict from a safetensors file.
pub fn load_safetensors<P: AsRef<Path>>(path: P) -> Result<StateDict> {
    let buffer = fs::read(path.as_ref())?;
    let state = deserialize(&buffer)?;
    debug!(tensors = state.len(); "loaded weights from {}", path.as_ref().display());
    Ok(state)
}
