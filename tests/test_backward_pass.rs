// Tests for backward propagation: gradient shapes, routing and the
// accumulate-until-update contract shared by every layer.

use approx::assert_relative_eq;
use tiny_nn::layers::{Conv2DLayer, DenseLayer, FlattenLayer, Layer, MaxPoolLayer};
use tiny_nn::utils::{Activation, SimpleRng};
use tiny_nn::{Model, NnError};

fn random_vec(len: usize, rng: &mut SimpleRng) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range_f32(-1.0, 1.0)).collect()
}

// ============================================================================
// MaxPool
// ============================================================================

mod maxpool_backward_tests {
    use super::*;

    #[test]
    fn test_gradient_routed_to_window_maximum() {
        let mut layer = MaxPoolLayer::new(2, 4, 1, 2).unwrap();
        layer
            .forward(&[1.0, 9.0, 0.0, 0.0, 3.0, 2.0, 0.0, 5.0])
            .unwrap();
        let grad = layer.backward(&[10.0, 20.0]).unwrap();
        assert_eq!(grad, vec![0.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 20.0]);
    }

    #[test]
    fn test_ties_route_to_first_maximum() {
        let mut layer = MaxPoolLayer::new(2, 2, 1, 2).unwrap();
        layer.forward(&[0.5, 0.5, 0.5, 0.5]).unwrap();
        assert_eq!(layer.backward(&[1.0]).unwrap(), vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_gradient_sum_preserved_per_window() {
        let mut rng = SimpleRng::new(31);
        let mut layer = MaxPoolLayer::new(6, 4, 3, 2).unwrap();
        let input = random_vec(3 * 6 * 4, &mut rng);
        layer.forward(&input).unwrap();

        let out_grad = random_vec(3 * 3 * 2, &mut rng);
        let in_grad = layer.backward(&out_grad).unwrap();

        // Exactly one non-zero cell per window, holding that window's gradient.
        for c in 0..3 {
            for py in 0..3 {
                for px in 0..2 {
                    let mut nonzero = Vec::new();
                    for dy in 0..2 {
                        for dx in 0..2 {
                            let idx = c * 24 + (py * 2 + dy) * 4 + px * 2 + dx;
                            if in_grad[idx] != 0.0 {
                                nonzero.push(in_grad[idx]);
                            }
                        }
                    }
                    assert_eq!(nonzero, vec![out_grad[(c * 3 + py) * 2 + px]]);
                }
            }
        }
    }

    #[test]
    fn test_backward_without_forward_fails() {
        let mut layer = MaxPoolLayer::new(2, 2, 1, 2).unwrap();
        assert!(matches!(
            layer.backward(&[1.0]),
            Err(NnError::ShapeMismatch { expected: 0, .. })
        ));
    }
}

// ============================================================================
// Flatten
// ============================================================================

mod flatten_backward_tests {
    use super::*;

    #[test]
    fn test_gradient_passes_through() {
        let mut layer = FlattenLayer::new();
        layer.forward(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(layer.backward(&[0.1, 0.2, 0.3]).unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_gradient_length_checked() {
        let mut layer = FlattenLayer::new();
        layer.forward(&[1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            layer.backward(&[0.1, 0.2]),
            Err(NnError::ShapeMismatch {
                got: 2,
                expected: 3,
                ..
            })
        ));
    }
}

// ============================================================================
// Dense and Conv2D accumulation
// ============================================================================

mod accumulation_tests {
    use super::*;

    #[test]
    fn test_dense_gradients_accumulate_until_update() {
        let mut rng = SimpleRng::new(41);
        let mut once = DenseLayer::with_input_size(3, 2, Activation::Tanh, &mut rng);
        let mut twice = once.clone();
        let input = [0.3, -0.2, 0.9];
        let grad = [1.0, -0.5];

        once.forward(&input).unwrap();
        once.backward(&grad).unwrap();
        for _ in 0..2 {
            twice.forward(&input).unwrap();
            twice.backward(&grad).unwrap();
        }

        for (a, b) in once.weight_gradients().iter().zip(twice.weight_gradients()) {
            assert_relative_eq!(2.0 * a, *b, epsilon = 1e-6);
        }
        for (a, b) in once.bias_gradients().iter().zip(twice.bias_gradients()) {
            assert_relative_eq!(2.0 * a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_dense_update_applies_and_clears() {
        let mut layer =
            DenseLayer::from_parameters(2, 1, Activation::Linear, vec![0.5, -0.5], vec![0.0])
                .unwrap();
        layer.forward(&[1.0, 2.0]).unwrap();
        layer.backward(&[1.0]).unwrap();
        layer.update_weights(0.1);

        assert_relative_eq!(layer.weights()[0], 0.4, epsilon = 1e-6);
        assert_relative_eq!(layer.weights()[1], -0.7, epsilon = 1e-6);
        assert_relative_eq!(layer.biases()[0], -0.1, epsilon = 1e-6);
        assert!(layer.weight_gradients().iter().all(|g| *g == 0.0));
        assert!(layer.bias_gradients().iter().all(|g| *g == 0.0));

        // A second update without backward changes nothing.
        let before = layer.weights().to_vec();
        layer.update_weights(0.1);
        assert_eq!(layer.weights(), before.as_slice());
    }

    #[test]
    fn test_conv_gradients_accumulate_and_clear() {
        let mut rng = SimpleRng::new(43);
        let mut layer = Conv2DLayer::new(4, 4, 2, 3, 2, 1, 1, &mut rng).unwrap();
        let input = random_vec(32, &mut rng);
        let grad = random_vec(32, &mut rng);

        layer.forward(&input).unwrap();
        layer.backward(&grad).unwrap();
        let first = layer.weight_gradients().to_vec();
        layer.forward(&input).unwrap();
        layer.backward(&grad).unwrap();
        for (a, b) in first.iter().zip(layer.weight_gradients()) {
            assert_relative_eq!(2.0 * a, *b, epsilon = 1e-5);
        }

        let weights = layer.weights().to_vec();
        let grads = layer.weight_gradients().to_vec();
        layer.update_weights(0.5);
        for ((w, g), updated) in weights.iter().zip(&grads).zip(layer.weights()) {
            assert_relative_eq!(w - 0.5 * g, *updated, epsilon = 1e-6);
        }
        assert!(layer.bias_gradients().iter().all(|g| *g == 0.0));
    }

    #[test]
    fn test_conv_bias_gradient_sums_output_map() {
        let mut rng = SimpleRng::new(47);
        let mut layer = Conv2DLayer::new(3, 3, 1, 2, 2, 1, 0, &mut rng).unwrap();
        layer.forward(&[0.0; 9]).unwrap();
        layer
            .backward(&[1.0, 2.0, 3.0, 4.0, -1.0, -1.0, -1.0, -1.0])
            .unwrap();
        assert_eq!(layer.bias_gradients(), &[10.0, -4.0]);
    }

    #[test]
    fn test_backward_requires_matching_forward() {
        let mut rng = SimpleRng::new(53);
        let mut layer = Conv2DLayer::new(3, 3, 1, 2, 1, 1, 0, &mut rng).unwrap();
        assert!(matches!(
            layer.backward(&[0.0; 4]),
            Err(NnError::ShapeMismatch { expected: 0, .. })
        ));

        layer.forward(&[0.0; 9]).unwrap();
        assert!(layer.backward(&[0.0; 3]).is_err());
        // The cached forward survives a rejected gradient.
        assert!(layer.backward(&[0.0; 4]).is_ok());
    }
}

// ============================================================================
// Model
// ============================================================================

mod model_backward_tests {
    use super::*;

    #[test]
    fn test_input_gradient_matches_input_shape() {
        let mut rng = SimpleRng::new(59);
        let mut model = Model::new();
        model.push(Conv2DLayer::new(4, 4, 1, 3, 2, 1, 1, &mut rng).unwrap());
        model.push(MaxPoolLayer::new(4, 4, 2, 2).unwrap());
        model.push(FlattenLayer::new());
        model.push(DenseLayer::new(3, Activation::Sigmoid, &mut rng));

        let input = random_vec(16, &mut rng);
        let output = model.forward(&input).unwrap();
        assert_eq!(output.len(), 3);
        let grad = model.backward(&[1.0, 0.0, -1.0]).unwrap();
        assert_eq!(grad.len(), 16);
    }

    #[test]
    fn test_wrong_output_gradient_rejected() {
        let mut rng = SimpleRng::new(61);
        let mut model = Model::new();
        model.push(DenseLayer::with_input_size(2, 3, Activation::Relu, &mut rng));
        model.forward(&[1.0, 1.0]).unwrap();
        assert!(matches!(
            model.backward(&[1.0]),
            Err(NnError::ShapeMismatch {
                got: 1,
                expected: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_rejected_output_gradient_leaves_model_untouched() {
        let build = || {
            let mut rng = SimpleRng::new(67);
            let mut model = Model::new();
            model.push(DenseLayer::with_input_size(2, 4, Activation::Tanh, &mut rng));
            model.push(DenseLayer::with_input_size(4, 2, Activation::Linear, &mut rng));
            model
        };
        let input = [0.4, -0.8];
        let grad = [1.0, -2.0];

        let mut retried = build();
        retried.forward(&input).unwrap();
        assert!(retried.backward(&[1.0, -2.0, 3.0]).is_err());
        let retried_grad = retried.backward(&grad).unwrap();

        let mut clean = build();
        clean.forward(&input).unwrap();
        let clean_grad = clean.backward(&grad).unwrap();

        assert_eq!(retried_grad, clean_grad);
        retried.update_weights(0.1);
        clean.update_weights(0.1);
        assert_eq!(retried.to_text(), clean.to_text());
    }
}
