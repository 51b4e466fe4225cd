/*!
Next-step price forecasting with a recurrent sequence regressor, written in Rust using PyTorch bindings.

The crate covers the training/prediction pipeline only: min-max scaling, supervised window construction,
an LSTM regressor, a trainer with early stopping and best-model retention, and rescaling of predictions
back into quote units. Loading quotes and shipping results somewhere are left to the caller; the
[`data::quotes`] and [`export`] modules provide CSV/JSON adapters over readers and writers.
*/
#![forbid(missing_docs)]

pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod export;
pub mod lstm;
pub mod pipeline;
pub mod train;

pub use error::{Error, Result};

/// The floating point type to be used for CPU calculations
pub type CpuFloat = f64;

/// The floating point type of tensor staging buffers and model outputs
pub type GpuFloat = f32;
