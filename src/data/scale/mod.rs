/*!
Input data scaling
*/
use super::Series;
use crate::{CpuFloat, Error, Result};
use itertools::{Itertools, MinMaxResult};
use num::{Float, NumCast};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What to do with a feature whose values are all equal
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Fail with [`Error::DegenerateFeature`]
    Reject,
    /// Use a range of one, so the feature is shifted to zero but not scaled
    UnitRange,
}

impl Default for DegeneratePolicy {
    fn default() -> DegeneratePolicy {
        DegeneratePolicy::Reject
    }
}

/// The min-max scaling of a single feature
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMax<F = CpuFloat> {
    /// The smallest value observed at fit time
    pub min: F,
    /// The largest value minus the smallest value; always positive
    pub range: F,
}

impl<F: Float> MinMax<F> {
    /// Scale a value into `[0, 1]` (or beyond, for values outside the fit range)
    #[inline]
    pub fn scale(&self, val: F) -> F {
        (val - self.min) / self.range
    }
    /// Undo [`MinMax::scale`]
    #[inline]
    pub fn unscale(&self, val: F) -> F {
        val * self.range + self.min
    }
}

/// A fitted min-max scaler, one [`MinMax`] per feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState<F = CpuFloat> {
    /// Per-feature scaling
    pub features: Vec<MinMax<F>>,
}

impl<F> ScalerState<F>
where
    F: Float + NumCast,
{
    /// Fit a scaler to a reference series
    pub fn fit(series: &Series<F>, policy: DegeneratePolicy) -> Result<ScalerState<F>> {
        if series.is_empty() {
            return Err(Error::InsufficientData {
                rows: 0,
                lookback: 0,
            });
        }
        for (row, values) in series.rows().enumerate() {
            if let Some(feature) = values.iter().position(|x| !x.is_finite()) {
                return Err(Error::NonFinite {
                    row,
                    feature,
                    value: NumCast::from(values[feature]).unwrap_or(f64::NAN),
                });
            }
        }
        let mut features = Vec::with_capacity(series.width());
        for feature in 0..series.width() {
            let (min, max) = match series.column(feature).minmax_by(|a, b| {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            }) {
                MinMaxResult::NoElements => unreachable!("series is not empty"),
                MinMaxResult::OneElement(x) => (x, x),
                MinMaxResult::MinMax(min, max) => (min, max),
            };
            let range = max - min;
            let range = if range > F::zero() {
                range
            } else {
                let value = NumCast::from(min).unwrap_or(f64::NAN);
                match policy {
                    DegeneratePolicy::Reject => {
                        return Err(Error::DegenerateFeature { feature, value })
                    }
                    DegeneratePolicy::UnitRange => {
                        warn!(feature, value, "constant feature, using unit range");
                        F::one()
                    }
                }
            };
            features.push(MinMax { min, range });
        }
        Ok(ScalerState { features })
    }
    /// The number of features this scaler was fit to
    #[inline]
    pub fn width(&self) -> usize {
        self.features.len()
    }
    fn check_width(&self, series: &Series<F>) -> Result<()> {
        if series.width() != self.width() {
            return Err(Error::ShapeMismatch(format!(
                "scaler was fit to {} features, series has {}",
                self.width(),
                series.width()
            )));
        }
        Ok(())
    }
    /// Scale every feature of a series
    pub fn transform(&self, series: &Series<F>) -> Result<Series<F>> {
        self.check_width(series)?;
        Ok(series.map_features(|feature, x| self.features[feature].scale(x)))
    }
    /// Map a scaled series back to original units
    pub fn inverse_transform(&self, series: &Series<F>) -> Result<Series<F>> {
        self.check_width(series)?;
        Ok(series.map_features(|feature, x| self.features[feature].unscale(x)))
    }
    /// Map scaled values of a single feature back to original units
    pub fn inverse_feature<G>(&self, values: &[G], feature: usize) -> Result<Vec<F>>
    where
        G: Copy + NumCast,
    {
        let scaling = self.features.get(feature).ok_or_else(|| {
            Error::ShapeMismatch(format!(
                "feature {} out of range for a scaler of width {}",
                feature,
                self.width()
            ))
        })?;
        Ok(values
            .iter()
            .map(|x| scaling.unscale(NumCast::from(*x).unwrap_or_else(F::nan)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_to_ten() {
        let series = Series::univariate((1..=10).map(<f64 as From<_>>::from).collect());
        let state = ScalerState::fit(&series, DegeneratePolicy::Reject).unwrap();
        assert_eq!(state.features[0], MinMax { min: 1.0, range: 9.0 });
        let scaled = state.transform(&series).unwrap();
        assert!((scaled.row(4)[0] - 4.0 / 9.0).abs() < 1e-12);
        assert_eq!(scaled.row(0)[0], 0.0);
        assert_eq!(scaled.row(9)[0], 1.0);
        let back = state.inverse_feature(&[0.444_444_444_f32], 0).unwrap();
        assert!((back[0] - 5.0).abs() < 1e-5);
    }

    #[test]
    fn round_trip() {
        let series = Series::from_rows(&[
            [102.5, 1.0e6, -3.0],
            [99.25, 2.5e6, 4.0],
            [101.0, 1.5e6, 0.5],
            [97.75, 9.0e5, -1.25],
        ])
        .unwrap();
        let state = ScalerState::fit(&series, DegeneratePolicy::Reject).unwrap();
        let scaled = state.transform(&series).unwrap();
        assert!(scaled.as_flat().iter().all(|x| (0.0..=1.0).contains(x)));
        let back = state.inverse_transform(&scaled).unwrap();
        for (a, b) in series.as_flat().iter().zip(back.as_flat()) {
            assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
        }
    }

    #[test]
    fn extrapolation_is_allowed() {
        let series = Series::univariate(vec![10.0, 20.0]);
        let state = ScalerState::fit(&series, DegeneratePolicy::Reject).unwrap();
        let outside = Series::univariate(vec![30.0, 0.0]);
        let scaled = state.transform(&outside).unwrap();
        assert_eq!(scaled.as_flat(), &[2.0, -1.0]);
        assert_eq!(state.inverse_transform(&scaled).unwrap(), outside);
    }

    #[test]
    fn constant_feature_is_rejected() {
        let series = Series::from_rows(&[[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]]).unwrap();
        match ScalerState::fit(&series, DegeneratePolicy::Reject) {
            Err(Error::DegenerateFeature { feature, value }) => {
                assert_eq!(feature, 1);
                assert_eq!(value, 5.0);
            }
            other => panic!("expected a degenerate feature error, got {:?}", other),
        }
    }

    #[test]
    fn constant_feature_with_unit_range() {
        let series = Series::from_rows(&[[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]]).unwrap();
        let state = ScalerState::fit(&series, DegeneratePolicy::UnitRange).unwrap();
        assert_eq!(state.features[1], MinMax { min: 5.0, range: 1.0 });
        let scaled = state.transform(&series).unwrap();
        assert!(scaled.column(1).all(|x| x == 0.0));
        assert_eq!(state.inverse_transform(&scaled).unwrap(), series);
    }

    #[test]
    fn nan_is_rejected() {
        let series = Series::univariate(vec![1.0, f64::NAN, 3.0]);
        assert!(matches!(
            ScalerState::fit(&series, DegeneratePolicy::UnitRange),
            Err(Error::NonFinite { row: 1, feature: 0, .. })
        ));
    }

    #[test]
    fn width_is_checked() {
        let state = ScalerState::fit(&Series::univariate(vec![1.0, 2.0]), DegeneratePolicy::Reject)
            .unwrap();
        let wide = Series::from_rows(&[[1.0, 2.0]]).unwrap();
        assert!(state.transform(&wide).is_err());
        assert!(state.inverse_feature(&[0.5], 1).is_err());
    }
}
