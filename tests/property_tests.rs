#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;
    use minerva::layers::{Layer, MaxPoolingLayer};
    use minerva::loss::one_hot;
    use minerva::volume::{flatten, unflatten, window_output_size};
    use minerva::Network;
    use ndarray::Array3;

    // Strategy for a small conv -> (pool) -> dense stack and a matching input
    fn architecture_strategy() -> impl Strategy<Value = (usize, usize, usize, usize, usize, bool)> {
        (4usize..=12, 1usize..=3, 1usize..=3, 1usize..=3, 1usize..=6, any::<bool>())
    }

    fn input_strategy(len: usize) -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-1.0f32..1.0, len)
    }

    proptest! {
        #[test]
        fn test_window_output_size_formula(input in 1usize..=40, window in 1usize..=40, stride in 1usize..=6) {
            match window_output_size(input, window, stride) {
                Ok(output) => {
                    prop_assert!(window <= input);
                    prop_assert_eq!((input - window) % stride, 0);
                    prop_assert_eq!((output - 1) * stride + window, input);
                }
                Err(_) => {
                    prop_assert!(window > input || (input - window) % stride != 0);
                }
            }
        }

        #[test]
        fn test_network_output_length(
            (size, depth, filters, kernel, classes, pool) in architecture_strategy(),
            seed in any::<u64>(),
        ) {
            let mut network = Network::new(0.01, seed).unwrap();
            network.add_convolution_layer(size, depth, filters, kernel, 1).unwrap();

            let mut width = size - kernel + 1;
            if pool && width % 2 == 0 {
                network.add_max_pooling_layer(width, filters, 2, 2).unwrap();
                width /= 2;
            }
            network.add_dense_layer(width, filters, classes).unwrap();

            let input = Array3::from_shape_fn((depth, size, size), |(c, y, x)| ((c + y * size + x) % 11) as f32 / 11.0);
            let scores = network.forward(input.view()).unwrap();

            prop_assert_eq!(scores.len(), classes);
            prop_assert!(scores.iter().all(|&s| (0.0..=1.0).contains(&s)));
            prop_assert!(network.backward(classes - 1).is_ok());
        }

        #[test]
        fn test_pooling_backward_conserves_error(values in input_strategy(2 * 6 * 6), errors in input_strategy(2 * 3 * 3)) {
            let mut pool = MaxPoolingLayer::new(6, 2, 2, 2).unwrap();
            let input = Array3::from_shape_vec((2, 6, 6), values).unwrap();
            let output_error = Array3::from_shape_vec((2, 3, 3), errors).unwrap();

            let output = pool.forward(input.view()).unwrap();
            let input_error = pool.backward(output_error.view(), 0.01).unwrap();

            // Non-overlapping windows route each error to exactly one cell
            prop_assert!((input_error.sum() - output_error.sum()).abs() < 1e-4);
            let routed = input_error.iter().filter(|&&e| e != 0.0).count();
            prop_assert!(routed <= output_error.len());

            for ((c, oh, ow), &max) in output.indexed_iter() {
                for y in oh * 2..oh * 2 + 2 {
                    for x in ow * 2..ow * 2 + 2 {
                        prop_assert!(input[[c, y, x]] <= max);
                    }
                }
            }
        }

        #[test]
        fn test_flatten_unflatten_identity(depth in 1usize..=4, width in 1usize..=6) {
            let volume = Array3::from_shape_fn((depth, width, width), |(c, y, x)| (c * 100 + y * 10 + x) as f32);
            let flat = flatten(volume.view());
            prop_assert_eq!(flat.len(), depth * width * width);
            prop_assert_eq!(unflatten(flat.view(), (depth, width, width)).unwrap(), volume);
        }

        #[test]
        fn test_one_hot(classes in 1usize..=20, label in 0usize..=25) {
            match one_hot(label, classes) {
                Ok(target) => {
                    prop_assert!(label < classes);
                    prop_assert_eq!(target.len(), classes);
                    prop_assert_eq!(target.sum(), 1.0);
                    prop_assert_eq!(target[label], 1.0);
                }
                Err(_) => prop_assert!(label >= classes),
            }
        }
    }
}
