use ndarray::{linalg, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    activation::{sigmoid_layer, sigmoid_prime_from_output},
    MlError, Model, ModelFactory, ModelSpec,
};

/// A fully connected `input -> hidden -> output` network with sigmoid
/// activations, trained by online gradient descent.
#[derive(Debug, Clone)]
pub struct Mlp {
    spec: ModelSpec,
    w_ih: Array2<f64>,
    b_h: Array1<f64>,
    w_ho: Array2<f64>,
    b_o: Array1<f64>,
}

impl Mlp {
    /// Creates a new `Mlp` with every parameter drawn uniformly from `[-1, 1)`.
    ///
    /// # Errors
    /// Returns a construction error if `spec` is invalid.
    pub fn new<R: Rng>(spec: ModelSpec, rng: &mut R) -> Result<Self, MlError> {
        spec.validate()?;

        let ModelSpec {
            input_size,
            hidden_units,
            output_size,
            ..
        } = spec;

        let mut uniform = || -> f64 { rng.random_range(-1.0..1.0) };
        let w_ih = Array2::from_shape_fn((hidden_units, input_size), |_| uniform());
        let w_ho = Array2::from_shape_fn((output_size, hidden_units), |_| uniform());
        let b_h = Array1::from_shape_fn(hidden_units, |_| uniform());
        let b_o = Array1::from_shape_fn(output_size, |_| uniform());

        Ok(Self {
            spec,
            w_ih,
            b_h,
            w_ho,
            b_o,
        })
    }

    fn num_params(&self) -> usize {
        self.w_ih.len() + self.b_h.len() + self.w_ho.len() + self.b_o.len()
    }

    fn check_len(what: &'static str, got: usize, expected: usize) -> Result<(), MlError> {
        if got != expected {
            return Err(MlError::ShapeMismatch {
                what,
                got,
                expected,
            });
        }
        Ok(())
    }

    /// Returns the hidden and output activations for `x`.
    fn forward(&self, x: ArrayView1<f64>) -> (Array1<f64>, Array1<f64>) {
        let hidden = sigmoid_layer((self.w_ih.dot(&x) + &self.b_h).view());
        let output = sigmoid_layer((self.w_ho.dot(&hidden) + &self.b_o).view());
        (hidden, output)
    }
}

fn column(v: ArrayView1<'_, f64>) -> ArrayView2<'_, f64> {
    v.insert_axis(Axis(1))
}

fn row(v: ArrayView1<'_, f64>) -> ArrayView2<'_, f64> {
    v.insert_axis(Axis(0))
}

impl Model for Mlp {
    fn input_size(&self) -> usize {
        self.spec.input_size
    }

    fn output_size(&self) -> usize {
        self.spec.output_size
    }

    fn train(&mut self, inputs: &[f64], targets: &[f64]) -> Result<(), MlError> {
        Self::check_len("inputs", inputs.len(), self.spec.input_size)?;
        Self::check_len("targets", targets.len(), self.spec.output_size)?;

        let x = ArrayView1::from(inputs);
        let y = ArrayView1::from(targets);
        let (hidden, output) = self.forward(x);

        let output_grad = (&y - &output) * sigmoid_prime_from_output(output.view());
        let hidden_grad =
            self.w_ho.t().dot(&output_grad) * sigmoid_prime_from_output(hidden.view());

        let lr = self.spec.learning_rate;
        linalg::general_mat_mul(
            lr,
            &column(output_grad.view()),
            &row(hidden.view()),
            1.0,
            &mut self.w_ho,
        );
        linalg::general_mat_mul(lr, &column(hidden_grad.view()), &row(x), 1.0, &mut self.w_ih);
        self.b_o.scaled_add(lr, &output_grad);
        self.b_h.scaled_add(lr, &hidden_grad);

        Ok(())
    }

    fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>, MlError> {
        Self::check_len("inputs", inputs.len(), self.spec.input_size)?;
        let (_, output) = self.forward(ArrayView1::from(inputs));
        Ok(output.to_vec())
    }

    fn parameters(&self) -> Vec<f64> {
        self.w_ih
            .iter()
            .chain(&self.b_h)
            .chain(&self.w_ho)
            .chain(&self.b_o)
            .copied()
            .collect()
    }

    fn load_parameters(&mut self, params: &[f64]) -> Result<(), MlError> {
        let expected = self.num_params();
        if params.len() != expected {
            return Err(MlError::ParameterCount {
                got: params.len(),
                expected,
            });
        }

        self.w_ih
            .iter_mut()
            .chain(self.b_h.iter_mut())
            .chain(self.w_ho.iter_mut())
            .chain(self.b_o.iter_mut())
            .zip(params)
            .for_each(|(p, v)| *p = *v);

        Ok(())
    }
}

/// Builds [`Mlp`]s, optionally from a fixed seed so that runs are reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct MlpFactory {
    seed: Option<u64>,
}

impl MlpFactory {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl ModelFactory for MlpFactory {
    type Model = Mlp;

    fn construct(&self, spec: ModelSpec) -> Result<Mlp, MlError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Mlp::new(spec, &mut rng)
    }
}
