use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use ndarray::ArrayD;

use crate::{MlErr, Result};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// The entry point of a model: a non-batch shape, optionally bound to a concrete tensor.
///
/// Clones share the id and the bound tensor, so a model built from a clone is built on the
/// same input.
#[derive(Clone, Debug)]
pub struct Input {
    id: u64,
    shape: Vec<usize>,
    tensor: Option<Arc<ArrayD<f32>>>,
}

impl Input {
    /// Creates a new symbolic `Input` with nothing bound to it.
    ///
    /// # Arguments
    /// * `shape` - The input shape, batch axis excluded.
    pub fn new(shape: Vec<usize>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            shape,
            tensor: None,
        }
    }

    /// Creates a new `Input` bound to `tensor`, whose first axis is the batch.
    ///
    /// # Returns
    /// The bound input or an error if `tensor` has no batch axis.
    pub fn bound(tensor: ArrayD<f32>) -> Result<Self> {
        if tensor.ndim() == 0 {
            return Err(MlErr::InvalidShape {
                what: "bound input (missing batch axis)",
                shape: Vec::new(),
            });
        }

        let mut input = Self::new(tensor.shape()[1..].to_vec());
        input.tensor = Some(Arc::new(tensor));
        Ok(input)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn tensor(&self) -> Option<&ArrayD<f32>> {
        self.tensor.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.tensor.is_some()
    }
}
