/*!
Error handling for the forecasting pipeline
*/
use thiserror::Error;

/// A `Result` carrying a pipeline [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while scaling, windowing, training or exporting
#[derive(Debug, Error)]
pub enum Error {
    /// A series (or split) has too few rows for the requested lookback
    #[error("insufficient data: {rows} rows cannot produce a window with lookback {lookback}")]
    InsufficientData {
        /// Number of rows available
        rows: usize,
        /// Requested lookback
        lookback: usize,
    },
    /// A feature has zero range, so min-max scaling would divide by zero
    #[error("feature {feature} is constant (value {value}); cannot min-max scale it")]
    DegenerateFeature {
        /// Index of the offending feature
        feature: usize,
        /// The constant value observed
        value: f64,
    },
    /// Training produced a non-finite loss
    #[error("training diverged at epoch {epoch}, batch {batch:?}: loss = {loss}")]
    NumericDivergence {
        /// Epoch index (zero based)
        epoch: usize,
        /// Batch index within the epoch, `None` for the validation pass
        batch: Option<usize>,
        /// The offending loss value
        loss: f64,
    },
    /// An observation handed to the scaler is NaN or infinite
    #[error("non-finite observation {value} at row {row}, feature {feature}")]
    NonFinite {
        /// Row index
        row: usize,
        /// Feature index
        feature: usize,
        /// The offending value
        value: f64,
    },
    /// Two inputs which must agree in shape do not
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An error raised by libtorch
    #[error("torch error: {0}")]
    Torch(#[from] tch::TchError),
    /// An error reading or writing CSV
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// An error reading or writing JSON
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// A date which failed to parse
    #[error("could not parse date {input:?}: {source}")]
    Date {
        /// The raw date field
        input: String,
        /// The underlying parse error
        source: chrono::ParseError,
    },
    /// An IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
