use crate::MlError;

/// The dimensions and learning rate a model is built with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub input_size: usize,
    pub hidden_units: usize,
    pub output_size: usize,
    pub learning_rate: f64,
}

impl ModelSpec {
    /// Checks every dimension and the learning rate.
    ///
    /// # Errors
    /// Returns `MlError::InvalidDimension` for a zero dimension and
    /// `MlError::InvalidLearningRate` for a non finite or non positive rate.
    pub fn validate(&self) -> Result<(), MlError> {
        let dims = [
            ("input size", self.input_size),
            ("hidden units", self.hidden_units),
            ("output size", self.output_size),
        ];

        if let Some(&(what, got)) = dims.iter().find(|(_, size)| *size == 0) {
            return Err(MlError::InvalidDimension { what, got });
        }

        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(MlError::InvalidLearningRate(self.learning_rate));
        }

        Ok(())
    }
}

/// A trainable binary classifier.
///
/// The orchestration layer only ever talks to a model through this trait, so
/// its numerics stay opaque: one `train` call is one sample presentation and
/// `predict` never mutates the parameters.
pub trait Model: Send {
    /// Length every `inputs` slice must have.
    fn input_size(&self) -> usize;

    /// Length every `targets` slice must have and every prediction has.
    fn output_size(&self) -> usize;

    /// Presents a single sample, updating the parameters in place.
    ///
    /// # Errors
    /// Returns `MlError::ShapeMismatch` if either slice has the wrong length.
    fn train(&mut self, inputs: &[f64], targets: &[f64]) -> Result<(), MlError>;

    /// Computes the model output for a given input.
    ///
    /// # Errors
    /// Returns `MlError::ShapeMismatch` if `inputs` has the wrong length.
    fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>, MlError>;

    /// Returns a flat copy of every parameter.
    fn parameters(&self) -> Vec<f64>;

    /// Overwrites every parameter from a flat snapshot taken by `parameters`.
    ///
    /// # Errors
    /// Returns `MlError::ParameterCount` if the snapshot has the wrong length.
    fn load_parameters(&mut self, params: &[f64]) -> Result<(), MlError>;
}

/// Builds fresh models.
///
/// Factories are cloned into worker contexts, so each context constructs a
/// private model instead of sharing one.
pub trait ModelFactory: Clone + Send + 'static {
    type Model: Model + 'static;

    /// Constructs a new model.
    ///
    /// # Errors
    /// Returns a construction error (see `MlError::is_construction`) if the
    /// spec is invalid or the backend cannot allocate the model.
    fn construct(&self, spec: ModelSpec) -> Result<Self::Model, MlError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(input_size: usize, hidden_units: usize, output_size: usize) -> ModelSpec {
        ModelSpec {
            input_size,
            hidden_units,
            output_size,
            learning_rate: 0.5,
        }
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert_eq!(
            spec(2, 0, 1).validate(),
            Err(MlError::InvalidDimension {
                what: "hidden units",
                got: 0
            })
        );
        assert!(spec(0, 4, 1).validate().is_err());
        assert!(spec(2, 4, 0).validate().is_err());
        assert!(spec(2, 4, 1).validate().is_ok());
    }

    #[test]
    fn learning_rate_must_be_positive_and_finite() {
        for lr in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            let spec = ModelSpec {
                learning_rate: lr,
                ..spec(2, 4, 1)
            };
            let err = spec.validate().unwrap_err();
            assert!(err.is_construction(), "{err}");
        }
    }
}
