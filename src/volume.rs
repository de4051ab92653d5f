//! The [`Volume`] data unit and the shape arithmetic shared by every layer.
//!
//! A volume is a `depth × height × width` array of `f32` indexed as
//! `[channel, row, col]`. Flattening always walks channel first, then row,
//! then column, and [`unflatten`] is its exact inverse.

use ndarray::{Array1, Array3, ArrayView1, ArrayView3};

use crate::error::{MinervaError, Result};

/// A 3-dimensional array of floats (depth × height × width)
pub type Volume = Array3<f32>;

/// Shape of a volume as `(depth, height, width)`
pub type Shape = (usize, usize, usize);

/// Compute `(input_size - window_size) / stride + 1`, rejecting parameters
/// for which the result is not an exact positive integer.
pub fn window_output_size(input_size: usize, window_size: usize, stride: usize) -> Result<usize> {
    if input_size == 0 {
        return Err(MinervaError::invalid_parameter("input_size", "must be positive"));
    }
    if window_size == 0 {
        return Err(MinervaError::invalid_parameter("window_size", "must be positive"));
    }
    if stride == 0 {
        return Err(MinervaError::invalid_parameter("stride", "must be positive"));
    }
    if window_size > input_size {
        return Err(MinervaError::InvalidParameter {
            name: "window_size".to_string(),
            reason: format!("window {} does not fit in input {}", window_size, input_size),
        });
    }
    let span = input_size - window_size;
    if span % stride != 0 {
        return Err(MinervaError::InvalidParameter {
            name: "stride".to_string(),
            reason: format!(
                "({} - {}) / {} is not an integer; the window would not tile the input",
                input_size, window_size, stride
            ),
        });
    }
    Ok(span / stride + 1)
}

/// Render a shape for error messages
pub fn describe(shape: Shape) -> String {
    format!("{}x{}x{}", shape.0, shape.1, shape.2)
}

/// Fail with a dimension mismatch unless `volume` has exactly `expected` shape
pub fn ensure_shape(volume: &ArrayView3<f32>, expected: Shape) -> Result<()> {
    let actual = volume.dim();
    if actual != expected {
        return Err(MinervaError::dimension_mismatch(describe(expected), describe(actual)));
    }
    Ok(())
}

/// Flatten a volume channel-major, then row, then column
pub fn flatten(volume: ArrayView3<f32>) -> Array1<f32> {
    volume.iter().copied().collect()
}

/// Inverse of [`flatten`]
pub fn unflatten(values: ArrayView1<f32>, shape: Shape) -> Result<Volume> {
    let expected = shape.0 * shape.1 * shape.2;
    if values.len() != expected {
        return Err(MinervaError::dimension_mismatch(
            format!("{} values for {}", expected, describe(shape)),
            format!("{} values", values.len()),
        ));
    }
    Array3::from_shape_vec(shape, values.to_vec())
        .map_err(|e| MinervaError::dimension_mismatch(describe(shape), e.to_string()))
}

/// Wrap a vector as a `1 × 1 × n` volume
pub fn from_vector(values: ArrayView1<f32>) -> Volume {
    let len = values.len();
    let mut volume = Array3::zeros((1, 1, len));
    for (i, &v) in values.iter().enumerate() {
        volume[[0, 0, i]] = v;
    }
    volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_window_output_size() {
        assert_eq!(window_output_size(28, 5, 1).unwrap(), 24);
        assert_eq!(window_output_size(24, 2, 2).unwrap(), 12);
        assert_eq!(window_output_size(4, 4, 3).unwrap(), 1);
        assert!(window_output_size(5, 2, 2).unwrap_err().is_configuration_error());
        assert!(window_output_size(3, 4, 1).is_err());
        assert!(window_output_size(4, 2, 0).is_err());
        assert!(window_output_size(4, 0, 1).is_err());
    }

    #[test]
    fn test_flatten_order_is_channel_row_col() {
        let volume = Array3::from_shape_fn((2, 2, 3), |(c, r, k)| (c * 100 + r * 10 + k) as f32);
        let flat = flatten(volume.view());
        assert_eq!(flat[0], 0.0);
        assert_eq!(flat[2], 2.0);
        assert_eq!(flat[3], 10.0);
        assert_eq!(flat[6], 100.0);
        assert_eq!(flat[11], 112.0);

        let restored = unflatten(flat.view(), (2, 2, 3)).unwrap();
        assert_eq!(restored, volume);
    }

    #[test]
    fn test_unflatten_rejects_wrong_length() {
        let values = arr1(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            unflatten(values.view(), (1, 2, 2)),
            Err(MinervaError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_from_vector() {
        let volume = from_vector(arr1(&[0.5, 0.25]).view());
        assert_eq!(volume.dim(), (1, 1, 2));
        assert_eq!(volume[[0, 0, 1]], 0.25);
    }
}
