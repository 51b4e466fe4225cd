/*!
Supervised window construction

A window pairs `lookback` consecutive rows of a series with the first feature of the row which follows them.
*/
use super::{push_values, Series};
use crate::{CpuFloat, Error, GpuFloat, Result};
use num::NumCast;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One supervised example: a context of `lookback` rows and the target which follows it
#[derive(Debug, Clone, PartialEq)]
pub struct Window<F = CpuFloat> {
    /// The context rows, row-major, `lookback * width` values
    pub context: Vec<F>,
    /// The first feature of the row immediately after the context
    pub target: F,
}

/// An ordered sequence of windows cut from one contiguous range of a series
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet<F = CpuFloat> {
    /// The context length of every window
    pub lookback: usize,
    /// The number of features per context row
    pub width: usize,
    /// The rows of the source series these windows were built from
    pub rows: Range<usize>,
    /// The windows, in time order
    pub windows: Vec<Window<F>>,
}

impl<F: Copy> WindowSet<F> {
    /// Slide a window of length `lookback` over a series.
    ///
    /// Yields exactly `series.len() - lookback` windows; window `i` has context `series[i..i + lookback]`
    /// and target `series[i + lookback][0]`.
    pub fn build(series: &Series<F>, lookback: usize) -> Result<WindowSet<F>> {
        let len = series.len();
        if lookback == 0 || len <= lookback {
            return Err(Error::InsufficientData {
                rows: len,
                lookback,
            });
        }
        let width = series.width();
        let flat = series.as_flat();
        let windows = (0..len - lookback)
            .map(|i| Window {
                context: flat[i * width..(i + lookback) * width].to_vec(),
                target: series.row(i + lookback)[0],
            })
            .collect();
        Ok(WindowSet {
            lookback,
            width,
            rows: 0..len,
            windows,
        })
    }
    /// The number of windows
    #[inline]
    pub fn len(&self) -> usize {
        self.windows.len()
    }
    /// Whether there are no windows
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
    /// The targets of every window, in order
    pub fn targets(&self) -> Vec<F> {
        self.windows.iter().map(|window| window.target).collect()
    }
    /// The row of the source series whose target is predicted by window `i`
    #[inline]
    pub fn target_row(&self, i: usize) -> usize {
        self.rows.start + self.lookback + i
    }
}

impl<F: Copy + NumCast> WindowSet<F> {
    /// Stage the windows selected by `indices` as a `[batch, lookback, width]` input buffer and a `[batch]`
    /// target buffer
    pub fn stage(&self, indices: &[usize]) -> (Vec<GpuFloat>, Vec<GpuFloat>) {
        let mut input = Vec::with_capacity(indices.len() * self.lookback * self.width);
        let mut output = Vec::with_capacity(indices.len());
        for &i in indices {
            let window = &self.windows[i];
            push_values(&window.context, &mut input);
            push_values(&[window.target], &mut output);
        }
        (input, output)
    }
}

/// How to cut a series into training, validation and test ranges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitSpec {
    /// Explicit row boundaries: train is `[0, train_end)`, validation `[train_end, valid_end)`, test the rest
    Indices {
        /// First row after the training range
        train_end: usize,
        /// First row after the validation range
        valid_end: usize,
    },
    /// Fractions of the series given to training and validation; test gets what is left
    Proportions {
        /// Fraction of rows used for training
        train: f64,
        /// Fraction of rows used for validation
        valid: f64,
    },
}

impl Default for SplitSpec {
    fn default() -> SplitSpec {
        SplitSpec::Proportions {
            train: 0.8,
            valid: 0.1,
        }
    }
}

impl SplitSpec {
    /// Resolve this split for a series of `len` rows into `(train, valid, test)` row ranges
    pub fn ranges(&self, len: usize) -> Result<(Range<usize>, Range<usize>, Range<usize>)> {
        let (train_end, valid_end) = match *self {
            SplitSpec::Indices {
                train_end,
                valid_end,
            } => (train_end, valid_end),
            SplitSpec::Proportions { train, valid } => {
                if !(train > 0.0 && valid >= 0.0 && train + valid <= 1.0) {
                    return Err(Error::InvalidConfig(format!(
                        "split proportions train = {}, valid = {} must be positive and sum to at most one",
                        train, valid
                    )));
                }
                let train_end = (len as f64 * train) as usize;
                let valid_end = (len as f64 * (train + valid)) as usize;
                (train_end, valid_end.min(len))
            }
        };
        if train_end > valid_end || valid_end > len {
            return Err(Error::InvalidConfig(format!(
                "split boundaries {} and {} do not fit a series of {} rows",
                train_end, valid_end, len
            )));
        }
        Ok((0..train_end, train_end..valid_end, valid_end..len))
    }
}

/// Windowed training, validation and test splits of one series
#[derive(Debug, Clone, PartialEq)]
pub struct Splits<F = CpuFloat> {
    /// Training windows
    pub train: WindowSet<F>,
    /// Validation windows
    pub valid: WindowSet<F>,
    /// Test windows, `None` if the test range is too short for the lookback
    pub test: Option<WindowSet<F>>,
}

impl<F: Copy> Splits<F> {
    /// Cut a series into contiguous ranges and window each one independently, so no window crosses a boundary
    pub fn build(series: &Series<F>, lookback: usize, spec: SplitSpec) -> Result<Splits<F>> {
        let (train, valid, test) = spec.ranges(series.len())?;
        let build = |rows: Range<usize>| -> Result<WindowSet<F>> {
            let mut set = WindowSet::build(&series.slice(rows.start, rows.end), lookback)?;
            set.rows = rows;
            Ok(set)
        };
        let test = if test.len() > lookback {
            Some(build(test)?)
        } else {
            None
        };
        Ok(Splits {
            train: build(train)?,
            valid: build(valid)?,
            test,
        })
    }
}
