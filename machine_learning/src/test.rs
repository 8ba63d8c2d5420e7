#![cfg(test)]

use ndarray::{Array, ArrayD, IxDyn};

use crate::{
    MlErr,
    arch::{
        DataFormat, Input, ModelBuilder,
        activations::ActFnSpec,
        layers::NormMode,
        spec::{LayerSpec, NamedLayerSpec},
    },
    io::TensorData,
};

/// A scaled down convolutional recurrent tagger over `(1, 8, 12)` channels-first inputs.
fn small_crnn(format: DataFormat) -> Vec<NamedLayerSpec> {
    let axes = format.axes();
    let mut specs = vec![
        NamedLayerSpec::new("pad", LayerSpec::ZeroPadding2d { padding: (0, 2), format }),
        NamedLayerSpec::new(
            "bn_0",
            LayerSpec::BatchNorm {
                axis: axes.cols,
                mode: NormMode::RunningStats,
            },
        ),
        NamedLayerSpec::new(
            "conv",
            LayerSpec::Conv2d {
                filters: 4,
                kernel: (3, 3),
                format,
            },
        ),
        NamedLayerSpec::new(
            "bn",
            LayerSpec::BatchNorm {
                axis: axes.channel,
                mode: NormMode::BatchStats,
            },
        ),
        NamedLayerSpec::new(
            "elu",
            LayerSpec::Activation {
                act_fn: ActFnSpec::Elu { alpha: 1. },
            },
        ),
        NamedLayerSpec::new(
            "pool",
            LayerSpec::MaxPool2d {
                pool: (8, 2),
                strides: (8, 2),
                format,
            },
        ),
        NamedLayerSpec::new("drop", LayerSpec::Dropout { rate: 0.5 }),
    ];

    if format == DataFormat::ChannelsFirst {
        specs.push(NamedLayerSpec::new("permute", LayerSpec::Permute { dims: vec![3, 1, 2] }));
    }

    specs.extend([
        NamedLayerSpec::new("reshape", LayerSpec::Reshape { target: vec![8, 4] }),
        NamedLayerSpec::new(
            "gru",
            LayerSpec::Gru {
                units: 3,
                return_sequences: false,
            },
        ),
        NamedLayerSpec::new(
            "out",
            LayerSpec::Dense {
                units: 5,
                act_fn: Some(ActFnSpec::Sigmoid),
            },
        ),
    ]);

    specs
}

#[test]
fn small_crnn_shapes_per_format() {
    for format in [DataFormat::ChannelsFirst, DataFormat::ChannelsLast] {
        let input = Input::new(format.image_shape(1, 8, 12));
        let mut model = ModelBuilder::new(Some(11))
            .build("small", input, &small_crnn(format))
            .unwrap();

        assert_eq!(model.output_shape(), [5]);

        let x = Array::from_shape_fn(IxDyn(&[2, 1, 8, 12]), |i| ((i[2] * 12 + i[3]) % 7) as f32);
        let x = match format {
            DataFormat::ChannelsFirst => x,
            DataFormat::ChannelsLast => x.permuted_axes(IxDyn(&[0, 2, 3, 1])),
        };

        let y = model.predict(x).unwrap();
        assert_eq!(y.shape(), [2, 5]);
        assert!(y.iter().all(|&p| (0. ..=1.).contains(&p)));
    }
}

#[test]
fn formats_agree_given_the_same_weights() {
    let th = DataFormat::ChannelsFirst;
    let tf = DataFormat::ChannelsLast;

    let mut first = ModelBuilder::new(Some(5))
        .build("th", Input::new(th.image_shape(1, 8, 12)), &small_crnn(th))
        .unwrap();
    let mut last = ModelBuilder::new(Some(6))
        .build("tf", Input::new(tf.image_shape(1, 8, 12)), &small_crnn(tf))
        .unwrap();
    last.load_state_dict(&first.state_dict()).unwrap();

    let x = Array::from_shape_fn(IxDyn(&[1, 1, 8, 12]), |i| (i[2] as f32 - i[3] as f32) / 4.);
    let y_th = first.predict(x.clone()).unwrap();
    let y_tf = last.predict(x.permuted_axes(IxDyn(&[0, 2, 3, 1]))).unwrap();

    for (a, b) in y_th.iter().zip(y_tf.iter()) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn weights_file_restores_predictions() {
    let format = DataFormat::ChannelsFirst;
    let specs = small_crnn(format);
    let x = ArrayD::from_elem(IxDyn(&[1, 1, 8, 12]), 0.25);

    let mut a = ModelBuilder::new(Some(1))
        .build("a", Input::new(format.image_shape(1, 8, 12)), &specs)
        .unwrap();
    let mut b = ModelBuilder::new(Some(2))
        .build("b", Input::new(format.image_shape(1, 8, 12)), &specs)
        .unwrap();

    let path = std::env::temp_dir().join(format!("small_crnn_{}.safetensors", std::process::id()));
    a.save_weights(&path).unwrap();
    b.load_weights(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(a.predict(x.clone()).unwrap(), b.predict(x).unwrap());
}

#[test]
fn strict_loading_leaves_params_untouched_on_error() {
    let format = DataFormat::ChannelsFirst;
    let build = |seed| {
        ModelBuilder::new(Some(seed))
            .build("m", Input::new(format.image_shape(1, 8, 12)), &small_crnn(format))
            .unwrap()
    };

    let mut model = build(1);
    let before = model.state_dict();

    let mut missing = build(2).state_dict();
    missing.remove("gru.U_h");
    assert!(matches!(model.load_state_dict(&missing), Err(MlErr::MissingParam(k)) if k == "gru.U_h"));

    let mut reshaped = build(2).state_dict();
    reshaped.insert(
        "out.b".into(),
        TensorData {
            data: vec![0.; 4],
            shape: vec![4],
        },
    );
    assert!(matches!(
        model.load_state_dict(&reshaped),
        Err(MlErr::ParamShapeMismatch { key, got, expected })
            if key == "out.b" && got == [4] && expected == [5]
    ));
    assert_eq!(model.state_dict(), before);

    let mut extra = build(2).state_dict();
    extra.insert("unrelated.W".into(), TensorData { data: vec![1.], shape: vec![1] });
    model.load_state_dict(&extra).unwrap();
    assert_ne!(model.state_dict(), before);
}

#[test]
fn flipping_touches_only_convolution_kernels() {
    let format = DataFormat::ChannelsFirst;
    let mut model = ModelBuilder::new(Some(3))
        .build("m", Input::new(format.image_shape(1, 8, 12)), &small_crnn(format))
        .unwrap();
    let before = model.state_dict();

    model.flip_conv_kernels();
    let after = model.state_dict();

    let kernel = before["conv.W"].to_array().unwrap();
    let flipped = after["conv.W"].to_array().unwrap();
    assert_eq!(flipped.shape(), [4, 1, 3, 3]);
    for f in 0..4 {
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(flipped[[f, 0, i, j]], kernel[[f, 0, 2 - i, 2 - j]]);
            }
        }
    }

    for (key, td) in &before {
        if key != "conv.W" {
            assert_eq!(&after[key], td, "{key}");
        }
    }

    model.flip_conv_kernels();
    assert_eq!(model.state_dict(), before);
}

#[test]
fn bound_input_predicts_and_symbolic_refuses() {
    let format = DataFormat::ChannelsFirst;
    let x = ArrayD::ones(IxDyn(&[3, 1, 8, 12]));

    let mut bound = ModelBuilder::new(Some(9))
        .build("bound", Input::bound(x).unwrap(), &small_crnn(format))
        .unwrap();
    assert_eq!(bound.predict_bound().unwrap().shape(), [3, 5]);

    let mut symbolic = ModelBuilder::new(Some(9))
        .build("symbolic", Input::new(format.image_shape(1, 8, 12)), &small_crnn(format))
        .unwrap();
    assert!(matches!(symbolic.predict_bound(), Err(MlErr::UnboundInput)));
    assert!(symbolic.predict(ArrayD::ones(IxDyn(&[1, 1, 8, 11]))).is_err());
}

#[test]
fn training_mode_makes_dropout_stochastic() {
    let format = DataFormat::ChannelsFirst;
    let mut model = ModelBuilder::new(Some(4))
        .build("m", Input::new(format.image_shape(1, 8, 12)), &small_crnn(format))
        .unwrap();
    let x = Array::from_shape_fn(IxDyn(&[2, 1, 8, 12]), |i| (i[3] % 3) as f32);

    let a = model.predict(x.clone()).unwrap();
    let b = model.predict(x.clone()).unwrap();
    assert_eq!(a, b);

    model.train(true);
    let c = model.predict(x.clone()).unwrap();
    let d = model.predict(x).unwrap();
    assert_ne!(c, d);
}

#[test]
fn summary_lists_every_layer() {
    let format = DataFormat::ChannelsLast;
    let model = ModelBuilder::new(Some(0))
        .build("small", Input::new(format.image_shape(1, 8, 12)), &small_crnn(format))
        .unwrap();
    let summary = model.summary();

    assert!(summary.starts_with("Model: small"));
    for (name, layer) in model.layers() {
        assert!(summary.contains(&format!("{name} ({})", layer.kind())));
    }
    assert!(summary.contains(&format!("Total params: {}", model.count_params())));
    assert!(!summary.contains("permute"));
}
