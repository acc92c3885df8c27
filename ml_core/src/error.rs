use std::fmt;

/// Errors produced by the model capability when it is misused.
#[derive(Debug, Clone, PartialEq)]
pub enum MlError {
    /// A model dimension is not strictly positive.
    InvalidDimension {
        /// Which dimension was rejected (e.g. "hidden units").
        what: &'static str,
        /// The rejected value.
        got: usize,
    },

    /// The learning rate is not a finite, strictly positive number.
    InvalidLearningRate(f64),

    /// A shape invariant was violated (e.g. mismatched lengths).
    ShapeMismatch {
        /// Human-readable context for the mismatch (e.g. "inputs", "targets").
        what: &'static str,
        /// Observed value.
        got: usize,
        /// Expected value.
        expected: usize,
    },

    /// A parameter snapshot does not fit the model it is loaded into.
    ParameterCount { got: usize, expected: usize },
}

impl MlError {
    /// Whether this error was raised while constructing a model.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            MlError::InvalidDimension { .. } | MlError::InvalidLearningRate(_)
        )
    }
}

impl fmt::Display for MlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlError::InvalidDimension { what, got } => {
                write!(f, "invalid {what}: got {got}, must be at least 1")
            }
            MlError::InvalidLearningRate(lr) => {
                write!(f, "invalid learning rate {lr}: must be finite and positive")
            }
            MlError::ShapeMismatch {
                what,
                got,
                expected,
            } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            MlError::ParameterCount { got, expected } => {
                write!(
                    f,
                    "parameter snapshot has {got} values, model expects {expected}"
                )
            }
        }
    }
}

impl std::error::Error for MlError {}
