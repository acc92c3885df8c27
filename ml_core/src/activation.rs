use ndarray::{Array1, ArrayView1};

pub(crate) fn sigmoid(z: f64) -> f64 {
    1. / (1. + (-z).exp())
}

/// Applies the sigmoid element-wise.
pub(crate) fn sigmoid_layer(z: ArrayView1<f64>) -> Array1<f64> {
    z.mapv(sigmoid)
}

/// Derivative of the sigmoid expressed through its output `a = sigmoid(z)`.
pub(crate) fn sigmoid_prime_from_output(a: ArrayView1<f64>) -> Array1<f64> {
    a.mapv(|a| a * (1. - a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sigmoid_is_centered_and_bounded() {
        assert_eq!(sigmoid(0.), 0.5);
        assert!(sigmoid(40.) <= 1.);
        assert!(sigmoid(-40.) >= 0.);
    }

    #[test]
    fn derivative_peaks_at_half() {
        let a = array![0.5, 0.0, 1.0];
        assert_eq!(sigmoid_prime_from_output(a.view()), array![0.25, 0.0, 0.0]);
    }
}
