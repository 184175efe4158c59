// External imports
use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Module};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::cast::ToElement;
use burn::tensor::Tensor;
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

// Internal imports
use crate::constants::{EPOCHS, LEARNING_RATE};
use crate::error::{ForecastError, Result};

/// Backend used while fitting
pub type TrainBackend = Autodiff<NdArray<f32>>;
/// Backend of a fitted model
pub type InferenceBackend = NdArray<f32>;

/// A fitted model mapping feature rows to predictions
pub trait Model {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;
}

/// Anything that can be fitted on a feature matrix and label vector
pub trait Regressor {
    type Model: Model;

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<Self::Model>;
}

/// Single linear layer mapping standardized features to a standardized target.
///
/// Weights start at zero, so fitting the same data always gives the same model.
#[derive(Module, Debug)]
pub struct LinearNet<B: Backend> {
    input_size: usize,
    output_layer: Linear<B>,
}

impl<B: Backend> LinearNet<B> {
    pub fn new(input_size: usize, device: &B::Device) -> Self {
        let output_layer = LinearConfig::new(input_size, 1)
            .with_initializer(Initializer::Zeros)
            .init(device);
        Self {
            input_size,
            output_layer,
        }
    }

    /// `[batch, input_size]` to `[batch, 1]`
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.output_layer.forward(x)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }
}

/// Training hyperparameters of [`LinearRegressor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressorConfig {
    pub learning_rate: f64,
    pub epochs: usize,
}

impl Default for RegressorConfig {
    fn default() -> Self {
        Self {
            learning_rate: LEARNING_RATE,
            epochs: EPOCHS,
        }
    }
}

impl RegressorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ForecastError::Configuration(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(ForecastError::Configuration("epochs must be positive".into()));
        }
        Ok(())
    }
}

/// Per-column mean and standard deviation; a constant column gets a unit scale
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl Standardizer {
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > 0.0 { s } else { 1.0 });
        Self { mean, std }
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.std
    }
}

fn scalar_scale(y: ArrayView1<'_, f64>) -> (f64, f64) {
    let mean = y.mean().unwrap_or(0.0);
    let std = y.std(0.0);
    (mean, if std.is_finite() && std > 0.0 { std } else { 1.0 })
}

fn to_tensor<B: Backend>(x: &Array2<f64>, device: &B::Device) -> Tensor<B, 2> {
    let data: Vec<f32> = x.iter().map(|&v| v as f32).collect();
    Tensor::<B, 1>::from_data(data.as_slice(), device).reshape([x.nrows(), x.ncols()])
}

/// Least-squares linear regression fitted by Adam on standardized data
#[derive(Debug, Clone, Default)]
pub struct LinearRegressor {
    pub config: RegressorConfig,
}

impl LinearRegressor {
    pub fn new(config: RegressorConfig) -> Self {
        Self { config }
    }
}

/// A fitted [`LinearRegressor`]
#[derive(Debug)]
pub struct LinearModel {
    net: LinearNet<InferenceBackend>,
    scaler: Standardizer,
    y_mean: f64,
    y_std: f64,
}

impl Regressor for LinearRegressor {
    type Model = LinearModel;

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<LinearModel> {
        self.config.validate()?;
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ForecastError::Model(format!(
                "cannot fit on a {}x{} feature matrix",
                x.nrows(),
                x.ncols()
            )));
        }
        if x.nrows() != y.len() {
            return Err(ForecastError::Model(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if !x.iter().chain(y.iter()).all(|v| v.is_finite()) {
            return Err(ForecastError::Model("training data contains non-finite values".into()));
        }

        let device = Default::default();

        let scaler = Standardizer::fit(x);
        let (y_mean, y_std) = scalar_scale(y);
        let targets = y.mapv(|v| (v - y_mean) / y_std).insert_axis(Axis(1));

        let inputs = to_tensor::<TrainBackend>(&scaler.transform(x), &device);
        let targets = to_tensor::<TrainBackend>(&targets, &device);

        let mut model = LinearNet::<TrainBackend>::new(x.ncols(), &device);
        let mut optim = AdamConfig::new().init::<TrainBackend, LinearNet<TrainBackend>>();

        info!(
            "Fitting linear model on {} samples x {} features ({} epochs)",
            x.nrows(),
            x.ncols(),
            self.config.epochs
        );
        for epoch in 0..self.config.epochs {
            let diff = model.forward(inputs.clone()) - targets.clone();
            let loss = (diff.clone() * diff).mean();

            if epoch % 100 == 0 || epoch + 1 == self.config.epochs {
                debug!("Epoch {}: mse {:.6}", epoch, loss.clone().into_scalar().to_f64());
            }

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(self.config.learning_rate, model, grads);
        }

        Ok(LinearModel {
            net: model.valid(),
            scaler,
            y_mean,
            y_std,
        })
    }
}

impl Model for LinearModel {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.net.input_size() {
            return Err(ForecastError::Model(format!(
                "model expects {} features, got {}",
                self.net.input_size(),
                x.ncols()
            )));
        }
        if x.nrows() == 0 {
            return Ok(Array1::zeros(0));
        }

        let device = Default::default();
        let inputs = to_tensor::<InferenceBackend>(&self.scaler.transform(x), &device);
        let output = self
            .net
            .forward(inputs)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ForecastError::Model(format!("{:?}", e)))?;

        Ok(output
            .into_iter()
            .map(|v| v as f64 * self.y_std + self.y_mean)
            .collect())
    }
}
