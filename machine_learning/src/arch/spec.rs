use serde::{Deserialize, Serialize};

use super::{DataFormat, activations::ActFnSpec, layers::NormMode};
use crate::{MlErr, Result};

/// A serializable description of a single layer. Shapes handled here never include the batch
/// axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LayerSpec {
    ZeroPadding2d {
        padding: (usize, usize),
        format: DataFormat,
    },
    BatchNorm {
        /// Counted with the batch axis at 0.
        axis: usize,
        mode: NormMode,
    },
    Conv2d {
        filters: usize,
        kernel: (usize, usize),
        format: DataFormat,
    },
    Activation {
        act_fn: ActFnSpec,
    },
    MaxPool2d {
        pool: (usize, usize),
        strides: (usize, usize),
        format: DataFormat,
    },
    Dropout {
        rate: f32,
    },
    Permute {
        dims: Vec<usize>,
    },
    Reshape {
        target: Vec<usize>,
    },
    Gru {
        units: usize,
        return_sequences: bool,
    },
    Dense {
        units: usize,
        act_fn: Option<ActFnSpec>,
    },
}

/// A `LayerSpec` together with the name its parameters are stored under.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedLayerSpec {
    pub name: String,
    #[serde(flatten)]
    pub spec: LayerSpec,
}

impl NamedLayerSpec {
    pub fn new(name: impl Into<String>, spec: LayerSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

impl LayerSpec {
    /// Infers the output shape of this layer.
    ///
    /// # Arguments
    /// * `input` - The non-batch input shape.
    ///
    /// # Returns
    /// The non-batch output shape or an error if the input can't go through this layer.
    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        match self {
            LayerSpec::ZeroPadding2d { padding, format } => {
                let (c, h, w) = format.split_shape(input)?;
                Ok(format.image_shape(c, h + 2 * padding.0, w + 2 * padding.1))
            }
            LayerSpec::BatchNorm { axis, .. } => {
                norm_dim(*axis, input)?;
                Ok(input.to_vec())
            }
            LayerSpec::Conv2d {
                filters, format, ..
            } => {
                let (_, h, w) = format.split_shape(input)?;
                Ok(format.image_shape(*filters, h, w))
            }
            LayerSpec::Activation { .. } | LayerSpec::Dropout { .. } => Ok(input.to_vec()),
            LayerSpec::MaxPool2d {
                pool,
                strides,
                format,
            } => {
                let (c, h, w) = format.split_shape(input)?;
                if h < pool.0 || w < pool.1 || strides.0 == 0 || strides.1 == 0 {
                    return Err(MlErr::InvalidShape {
                        what: "max pooling input",
                        shape: input.to_vec(),
                    });
                }

                let out = ((h - pool.0) / strides.0 + 1, (w - pool.1) / strides.1 + 1);
                Ok(format.image_shape(c, out.0, out.1))
            }
            LayerSpec::Permute { dims } => {
                if dims.len() != input.len() {
                    return Err(MlErr::RankMismatch {
                        layer: "Permute",
                        got: input.len() + 1,
                        expected: dims.len() + 1,
                    });
                }

                dims.iter()
                    .map(|&d| {
                        d.checked_sub(1)
                            .and_then(|i| input.get(i).copied())
                            .ok_or_else(|| MlErr::InvalidSpec(format!("bad permutation {dims:?}")))
                    })
                    .collect()
            }
            LayerSpec::Reshape { target } => {
                let got: usize = input.iter().product();
                let expected: usize = target.iter().product();
                if got != expected {
                    return Err(MlErr::SizeMismatch {
                        what: "reshaped elements",
                        got,
                        expected,
                    });
                }

                Ok(target.clone())
            }
            LayerSpec::Gru {
                units,
                return_sequences,
            } => {
                let &[steps, _] = input else {
                    return Err(MlErr::RankMismatch {
                        layer: "GRU",
                        got: input.len() + 1,
                        expected: 3,
                    });
                };

                Ok(match return_sequences {
                    true => vec![steps, *units],
                    false => vec![*units],
                })
            }
            LayerSpec::Dense { units, .. } => {
                if input.len() != 1 {
                    return Err(MlErr::RankMismatch {
                        layer: "Dense",
                        got: input.len() + 1,
                        expected: 2,
                    });
                }

                Ok(vec![*units])
            }
        }
    }

    /// Returns the named parameter shapes this layer needs, in the order the layer exposes them.
    ///
    /// # Arguments
    /// * `input` - The non-batch input shape.
    pub fn param_shapes(&self, input: &[usize]) -> Result<Vec<(&'static str, Vec<usize>)>> {
        Ok(match self {
            LayerSpec::BatchNorm { axis, .. } => {
                let dim = norm_dim(*axis, input)?;
                ["gamma", "beta", "running_mean", "running_std"]
                    .into_iter()
                    .map(|key| (key, vec![dim]))
                    .collect()
            }
            LayerSpec::Conv2d {
                filters,
                kernel,
                format,
            } => {
                let (c, _, _) = format.split_shape(input)?;
                vec![("W", vec![*filters, c, kernel.0, kernel.1]), ("b", vec![*filters])]
            }
            LayerSpec::Gru { units, .. } => {
                let &[_, features] = input else {
                    return Err(MlErr::RankMismatch {
                        layer: "GRU",
                        got: input.len() + 1,
                        expected: 3,
                    });
                };

                let u = *units;
                vec![
                    ("W_z", vec![features, u]),
                    ("U_z", vec![u, u]),
                    ("b_z", vec![u]),
                    ("W_r", vec![features, u]),
                    ("U_r", vec![u, u]),
                    ("b_r", vec![u]),
                    ("W_h", vec![features, u]),
                    ("U_h", vec![u, u]),
                    ("b_h", vec![u]),
                ]
            }
            LayerSpec::Dense { units, .. } => {
                let &[inputs] = input else {
                    return Err(MlErr::RankMismatch {
                        layer: "Dense",
                        got: input.len() + 1,
                        expected: 2,
                    });
                };

                vec![("W", vec![inputs, *units]), ("b", vec![*units])]
            }
            _ => Vec::new(),
        })
    }

    /// Returns the amount of parameters this layer has for the given non-batch input shape.
    pub fn param_count(&self, input: &[usize]) -> Result<usize> {
        let shapes = self.param_shapes(input)?;
        Ok(shapes
            .iter()
            .map(|(_, s)| s.iter().product::<usize>())
            .sum())
    }

    /// A human readable name of the operation.
    pub fn kind(&self) -> &'static str {
        match self {
            LayerSpec::ZeroPadding2d { .. } => "ZeroPadding2D",
            LayerSpec::BatchNorm { .. } => "BatchNormalization",
            LayerSpec::Conv2d { .. } => "Convolution2D",
            LayerSpec::Activation { .. } => "Activation",
            LayerSpec::MaxPool2d { .. } => "MaxPooling2D",
            LayerSpec::Dropout { .. } => "Dropout",
            LayerSpec::Permute { .. } => "Permute",
            LayerSpec::Reshape { .. } => "Reshape",
            LayerSpec::Gru { .. } => "GRU",
            LayerSpec::Dense { .. } => "Dense",
        }
    }
}

/// Length of the normalized axis, `axis` counted with the batch axis at 0.
fn norm_dim(axis: usize, input: &[usize]) -> Result<usize> {
    axis.checked_sub(1)
        .and_then(|i| input.get(i).copied())
        .ok_or_else(|| MlErr::InvalidShape {
            what: "batch normalization input",
            shape: input.to_vec(),
        })
}
