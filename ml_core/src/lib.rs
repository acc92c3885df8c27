mod activation;
mod data;
mod error;
mod mlp;
mod model;

pub use data::{DataError, Sample, SampleSet};
pub use error::MlError;
pub use mlp::{Mlp, MlpFactory};
pub use model::{Model, ModelFactory, ModelSpec};
