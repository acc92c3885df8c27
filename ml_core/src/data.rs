use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced while assembling a sample set.
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    /// A sample set must contain at least one sample.
    Empty,

    /// A sample disagrees with the first sample's input or target length.
    InconsistentSample {
        index: usize,
        what: &'static str,
        got: usize,
        expected: usize,
    },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Empty => write!(f, "a sample set needs at least one sample"),
            DataError::InconsistentSample {
                index,
                what,
                got,
                expected,
            } => write!(
                f,
                "sample {index} has {got} {what}, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for DataError {}

/// One labeled point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub inputs: Vec<f64>,
    pub targets: Vec<f64>,
}

impl Sample {
    pub fn new(inputs: impl Into<Vec<f64>>, targets: impl Into<Vec<f64>>) -> Self {
        Self {
            inputs: inputs.into(),
            targets: targets.into(),
        }
    }
}

/// An ordered, immutable training corpus.
///
/// Order is significant: every epoch presents the samples exactly in this
/// order. On the wire it is a plain array of samples and it is re-validated
/// when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Sample>", into = "Vec<Sample>")]
pub struct SampleSet {
    samples: Vec<Sample>,
}

impl SampleSet {
    /// Creates a new `SampleSet`.
    ///
    /// # Errors
    /// Returns `DataError::Empty` without samples and
    /// `DataError::InconsistentSample` if lengths differ between samples.
    pub fn new(samples: Vec<Sample>) -> Result<Self, DataError> {
        let first = samples.first().ok_or(DataError::Empty)?;
        let (n_in, n_out) = (first.inputs.len(), first.targets.len());

        for (index, sample) in samples.iter().enumerate() {
            if sample.inputs.len() != n_in {
                return Err(DataError::InconsistentSample {
                    index,
                    what: "inputs",
                    got: sample.inputs.len(),
                    expected: n_in,
                });
            }

            if sample.targets.len() != n_out {
                return Err(DataError::InconsistentSample {
                    index,
                    what: "targets",
                    got: sample.targets.len(),
                    expected: n_out,
                });
            }
        }

        Ok(Self { samples })
    }

    /// The four XOR points: the canonical non linearly separable scenario.
    pub fn xor() -> Self {
        Self {
            samples: vec![
                Sample::new([0., 0.], [0.]),
                Sample::new([0., 1.], [1.]),
                Sample::new([1., 0.], [1.]),
                Sample::new([1., 1.], [0.]),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn input_size(&self) -> usize {
        self.samples[0].inputs.len()
    }

    pub fn output_size(&self) -> usize {
        self.samples[0].targets.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

impl TryFrom<Vec<Sample>> for SampleSet {
    type Error = DataError;

    fn try_from(samples: Vec<Sample>) -> Result<Self, Self::Error> {
        Self::new(samples)
    }
}

impl From<SampleSet> for Vec<Sample> {
    fn from(set: SampleSet) -> Self {
        set.samples
    }
}
