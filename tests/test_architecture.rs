//! Tests for JSON architecture configuration
//!
//! Covers loading the shipped architectures, per-layer field validation,
//! the width chain between neighbouring layers, and building models.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tiny_nn::architecture::{
    build_model, load_architecture, validate_architecture, ArchitectureConfig, LayerConfig,
};
use tiny_nn::utils::SimpleRng;
use tiny_nn::NnError;

fn write_architecture(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("arch.json");
    fs::write(&path, contents).unwrap();
    path
}

fn layer(layer_type: &str) -> LayerConfig {
    LayerConfig {
        layer_type: layer_type.to_string(),
        ..LayerConfig::default()
    }
}

fn dense(input: Option<usize>, output: usize, activation: &str) -> LayerConfig {
    LayerConfig {
        input_size: input,
        output_size: Some(output),
        activation: Some(activation.to_string()),
        ..layer("dense")
    }
}

fn conv(height: usize, width: usize, in_channels: usize, kernel: usize, out_channels: usize) -> LayerConfig {
    LayerConfig {
        input_height: Some(height),
        input_width: Some(width),
        in_channels: Some(in_channels),
        kernel_size: Some(kernel),
        out_channels: Some(out_channels),
        ..layer("conv2d")
    }
}

fn maxpool(height: usize, width: usize, channels: usize, pool: usize) -> LayerConfig {
    LayerConfig {
        input_height: Some(height),
        input_width: Some(width),
        channels: Some(channels),
        pool_size: Some(pool),
        ..layer("maxpool")
    }
}

fn assert_invalid(config: &ArchitectureConfig) {
    assert!(
        matches!(validate_architecture(config), Err(NnError::InvalidConfig(_))),
        "expected InvalidConfig for {:?}",
        config
    );
}

// ============================================================================
// Loading
// ============================================================================

mod loading_tests {
    use super::*;

    #[test]
    fn test_load_xor_architecture() {
        let config = load_architecture("config/architectures/xor.json").unwrap();
        assert_eq!(config.layers.len(), 2);
        assert_eq!(config.layers[0].activation.as_deref(), Some("relu"));

        let mut rng = SimpleRng::new(42);
        let mut model = build_model(&config, &mut rng).unwrap();
        assert_eq!(model.parameter_count(), 2 * 8 + 8 + 8 + 1);
        assert_eq!(model.forward(&[1.0, 0.0]).unwrap().len(), 1);
    }

    #[test]
    fn test_load_small_cnn_architecture() {
        let config = load_architecture("config/architectures/small_cnn.json").unwrap();
        let mut rng = SimpleRng::new(42);
        let mut model = build_model(&config, &mut rng).unwrap();
        assert_eq!(model.len(), 5);

        let output = model.forward(&[0.5; 64]).unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(model.layers()[4].input_size(), Some(10));
    }

    #[test]
    fn test_layer_type_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = write_architecture(
            &dir,
            r#"{ "layers": [ { "layer_type": "Dense", "input_size": 3, "output_size": 2 } ] }"#,
        );
        let config = load_architecture(&path).unwrap();
        let model = build_model(&config, &mut SimpleRng::new(1)).unwrap();
        assert_eq!(model.layers()[0].type_tag(), "Dense");
    }

    #[test]
    fn test_invalid_json_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = write_architecture(&dir, r#"{ "layers": [ { "layer_type": "dense" "#);
        assert!(matches!(load_architecture(&path), Err(NnError::Json(_))));
        assert!(matches!(
            load_architecture(dir.path().join("missing.json")),
            Err(NnError::Io(_))
        ));
    }

    #[test]
    fn test_same_seed_builds_identical_models() {
        let config = load_architecture("config/architectures/small_cnn.json").unwrap();
        let mut a = build_model(&config, &mut SimpleRng::new(9)).unwrap();
        let mut b = build_model(&config, &mut SimpleRng::new(9)).unwrap();
        let input: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
        assert_eq!(a.forward(&input).unwrap(), b.forward(&input).unwrap());
        assert_eq!(a.to_text(), b.to_text());
    }
}

// ============================================================================
// Validation
// ============================================================================

mod validation_tests {
    use super::*;

    #[test]
    fn test_empty_architecture_rejected() {
        assert_invalid(&ArchitectureConfig { layers: vec![] });
    }

    #[test]
    fn test_unknown_layer_type_rejected() {
        assert_invalid(&ArchitectureConfig {
            layers: vec![layer("dropout")],
        });
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        assert_invalid(&ArchitectureConfig {
            layers: vec![layer("dense")],
        });
        assert_invalid(&ArchitectureConfig {
            layers: vec![LayerConfig {
                kernel_size: None,
                ..conv(4, 4, 1, 3, 2)
            }],
        });
        assert_invalid(&ArchitectureConfig {
            layers: vec![LayerConfig {
                pool_size: None,
                ..maxpool(4, 4, 1, 2)
            }],
        });
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert_invalid(&ArchitectureConfig {
            layers: vec![dense(Some(0), 4, "relu")],
        });
        assert_invalid(&ArchitectureConfig {
            layers: vec![conv(4, 4, 0, 3, 2)],
        });
        assert_invalid(&ArchitectureConfig {
            layers: vec![LayerConfig {
                stride: Some(0),
                ..conv(4, 4, 1, 3, 2)
            }],
        });
    }

    #[test]
    fn test_kernel_larger_than_input_rejected() {
        assert_invalid(&ArchitectureConfig {
            layers: vec![conv(2, 2, 1, 5, 1)],
        });
    }

    #[test]
    fn test_indivisible_pool_rejected() {
        assert_invalid(&ArchitectureConfig {
            layers: vec![maxpool(5, 4, 1, 2)],
        });
    }

    #[test]
    fn test_unknown_activation_rejected() {
        let config = ArchitectureConfig {
            layers: vec![dense(Some(2), 2, "swish")],
        };
        assert!(matches!(
            validate_architecture(&config),
            Err(NnError::UnknownActivation(_))
        ));
    }

    #[test]
    fn test_width_chain_checked() {
        // conv 4x4x1 -> 2 channels (padding 0, kernel 3) = 2*2*2 = 8 values.
        let config = ArchitectureConfig {
            layers: vec![conv(4, 4, 1, 3, 2), layer("flatten"), dense(Some(9), 1, "sigmoid")],
        };
        let err = validate_architecture(&config).unwrap_err();
        assert!(err.to_string().contains("Layer 1 output size (8)"));

        let config = ArchitectureConfig {
            layers: vec![conv(4, 4, 1, 3, 2), layer("flatten"), dense(Some(8), 1, "sigmoid")],
        };
        assert!(validate_architecture(&config).is_ok());
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = ArchitectureConfig {
            layers: vec![dense(Some(2), 3, "relu"), dense(Some(4), 1, "linear")],
        };
        assert!(build_model(&config, &mut SimpleRng::new(1)).is_err());
    }
}
