//! The fixed topology of the tagger, as a list of named layer specs.

use machine_learning::arch::{
    DataFormat,
    activations::ActFnSpec,
    layers::NormMode,
    spec::{LayerSpec, NamedLayerSpec},
};

/// The name given to every built model.
pub const MODEL_NAME: &str = "AudioConvRNN";

/// Mel frequency bins of the input.
pub const N_MELS: usize = 96;
/// Time frames of the input.
pub const N_FRAMES: usize = 1366;
/// Zeros added at each side of the time axis.
pub const TIME_PADDING: usize = 37;
/// Amount of tags predicted.
pub const N_TAGS: usize = 50;

/// `(filters, pool)` of every convolutional block.
pub const CONV_BLOCKS: [(usize, usize); 4] = [(64, 2), (128, 3), (128, 4), (128, 4)];
pub const CONV_DROPOUT: f32 = 0.5;

/// Steps and features the feature map is reshaped into.
pub const SEQUENCE: (usize, usize) = (15, 128);
pub const GRU_UNITS: [usize; 2] = [32, 32];
pub const OUTPUT_DROPOUT: f32 = 0.3;

/// The non-batch input shape for the given format.
pub fn input_shape(format: DataFormat) -> Vec<usize> {
    format.image_shape(1, N_MELS, N_FRAMES)
}

/// Every layer of the tagger, in order, named the way the pretrained weights are.
pub fn layers(format: DataFormat) -> Vec<NamedLayerSpec> {
    let axes = format.axes();
    let mut specs = vec![
        NamedLayerSpec::new(
            "zeropadding2d_1",
            LayerSpec::ZeroPadding2d {
                padding: (0, TIME_PADDING),
                format,
            },
        ),
        NamedLayerSpec::new(
            "bn_0_freq",
            LayerSpec::BatchNorm {
                axis: axes.cols,
                mode: NormMode::RunningStats,
            },
        ),
    ];

    for (i, (filters, pool)) in CONV_BLOCKS.into_iter().enumerate() {
        let k = i + 1;
        specs.extend([
            NamedLayerSpec::new(
                format!("conv{k}"),
                LayerSpec::Conv2d {
                    filters,
                    kernel: (3, 3),
                    format,
                },
            ),
            NamedLayerSpec::new(
                format!("bn{k}"),
                LayerSpec::BatchNorm {
                    axis: axes.channel,
                    mode: NormMode::BatchStats,
                },
            ),
            NamedLayerSpec::new(
                format!("elu_{k}"),
                LayerSpec::Activation {
                    act_fn: ActFnSpec::Elu { alpha: 1. },
                },
            ),
            NamedLayerSpec::new(
                format!("pool{k}"),
                LayerSpec::MaxPool2d {
                    pool: (pool, pool),
                    strides: (pool, pool),
                    format,
                },
            ),
            NamedLayerSpec::new(format!("dropout{k}"), LayerSpec::Dropout { rate: CONV_DROPOUT }),
        ]);
    }

    // Time has to come first before flattening each step.
    if format == DataFormat::ChannelsFirst {
        specs.push(NamedLayerSpec::new(
            "permute_1",
            LayerSpec::Permute {
                dims: vec![3, 1, 2],
            },
        ));
    }

    specs.extend([
        NamedLayerSpec::new(
            "reshape_1",
            LayerSpec::Reshape {
                target: vec![SEQUENCE.0, SEQUENCE.1],
            },
        ),
        NamedLayerSpec::new(
            "gru1",
            LayerSpec::Gru {
                units: GRU_UNITS[0],
                return_sequences: true,
            },
        ),
        NamedLayerSpec::new(
            "gru2",
            LayerSpec::Gru {
                units: GRU_UNITS[1],
                return_sequences: false,
            },
        ),
        NamedLayerSpec::new("dropout_1", LayerSpec::Dropout { rate: OUTPUT_DROPOUT }),
        NamedLayerSpec::new(
            "output",
            LayerSpec::Dense {
                units: N_TAGS,
                act_fn: Some(ActFnSpec::Sigmoid),
            },
        ),
    ]);

    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Non-batch output shape after every layer.
    fn shapes(format: DataFormat) -> Vec<(String, Vec<usize>)> {
        let mut shape = input_shape(format);
        layers(format)
            .into_iter()
            .map(|s| {
                shape = s.spec.output_shape(&shape).unwrap();
                (s.name, shape.clone())
            })
            .collect()
    }

    fn shape_of(shapes: &[(String, Vec<usize>)], name: &str) -> Vec<usize> {
        shapes.iter().find(|(n, _)| n == name).unwrap().1.clone()
    }

    #[test]
    fn channels_first_stages() {
        let shapes = shapes(DataFormat::ChannelsFirst);

        assert_eq!(shape_of(&shapes, "zeropadding2d_1"), [1, 96, 1440]);
        assert_eq!(shape_of(&shapes, "pool1"), [64, 48, 720]);
        assert_eq!(shape_of(&shapes, "pool2"), [128, 16, 240]);
        assert_eq!(shape_of(&shapes, "pool3"), [128, 4, 60]);
        assert_eq!(shape_of(&shapes, "pool4"), [128, 1, 15]);
        assert_eq!(shape_of(&shapes, "permute_1"), [15, 128, 1]);
        assert_eq!(shape_of(&shapes, "reshape_1"), [15, 128]);
        assert_eq!(shape_of(&shapes, "gru1"), [15, 32]);
        assert_eq!(shape_of(&shapes, "gru2"), [32]);
        assert_eq!(shape_of(&shapes, "output"), [50]);
    }

    #[test]
    fn channels_last_stages() {
        let shapes = shapes(DataFormat::ChannelsLast);

        assert_eq!(input_shape(DataFormat::ChannelsLast), [96, 1366, 1]);
        assert_eq!(shape_of(&shapes, "zeropadding2d_1"), [96, 1440, 1]);
        assert_eq!(shape_of(&shapes, "pool4"), [1, 15, 128]);
        assert_eq!(shape_of(&shapes, "reshape_1"), [15, 128]);
        assert!(shapes.iter().all(|(n, _)| n != "permute_1"));
        assert_eq!(shapes.last().unwrap().1, [50]);
    }

    #[test]
    fn time_is_normalized_first_then_channels() {
        for format in [DataFormat::ChannelsFirst, DataFormat::ChannelsLast] {
            let axes = format.axes();
            let specs = layers(format);

            let axis_of = |name: &str| match specs.iter().find(|s| s.name == name).unwrap().spec {
                LayerSpec::BatchNorm { axis, .. } => axis,
                _ => unreachable!(),
            };

            assert_eq!(axis_of("bn_0_freq"), axes.cols);
            for k in 1..=4 {
                assert_eq!(axis_of(&format!("bn{k}")), axes.channel);
            }
        }
    }

    #[test]
    fn names_are_unique() {
        let specs = layers(DataFormat::ChannelsFirst);
        let mut names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();

        assert_eq!(names.len(), specs.len());
        assert_eq!(specs.len(), 2 + 4 * 5 + 1 + 1 + 2 + 2);
    }
}
