/*!
Series storage, scaling, windowing and IO
*/
use crate::{CpuFloat, Error, GpuFloat, Result};
use num::NumCast;
use serde::{Deserialize, Serialize};

pub mod fake;
pub mod quotes;
pub mod scale;
pub mod window;

/// An ordered, row-major table of observations: one row per time step, one column per feature.
///
/// Feature 0 is the prediction target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series<F = CpuFloat> {
    width: usize,
    data: Vec<F>,
}

impl<F: Copy> Series<F> {
    /// Build a series from row-major data of a given width
    pub fn from_flat(width: usize, data: Vec<F>) -> Result<Series<F>> {
        if width == 0 {
            return Err(Error::ShapeMismatch("a series needs at least one feature".into()));
        }
        if data.len() % width != 0 {
            return Err(Error::ShapeMismatch(format!(
                "{} values do not fill rows of width {}",
                data.len(),
                width
            )));
        }
        Ok(Series { width, data })
    }
    /// Build a single-feature series
    pub fn univariate(values: Vec<F>) -> Series<F> {
        Series {
            width: 1,
            data: values,
        }
    }
    /// Build a series from rows, which must all have the same non-zero width
    pub fn from_rows<R: AsRef<[F]>>(rows: &[R]) -> Result<Series<F>> {
        let width = rows.first().map(|row| row.as_ref().len()).unwrap_or(1);
        let mut data = Vec::with_capacity(rows.len() * width);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != width {
                return Err(Error::ShapeMismatch(format!(
                    "row {} has {} features, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
            data.extend_from_slice(row);
        }
        Series::from_flat(width, data)
    }
    /// The number of features per row
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }
    /// The number of rows (time steps)
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.width
    }
    /// Whether this series has no rows
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    /// Get a row of this series
    #[inline]
    pub fn row(&self, i: usize) -> &[F] {
        &self.data[i * self.width..(i + 1) * self.width]
    }
    /// Iterate over the rows of this series
    pub fn rows(&self) -> impl Iterator<Item = &[F]> + '_ {
        self.data.chunks(self.width)
    }
    /// Iterate over a single feature
    pub fn column(&self, feature: usize) -> impl Iterator<Item = F> + '_ {
        self.rows().map(move |row| row[feature])
    }
    /// The raw row-major data
    #[inline]
    pub fn as_flat(&self) -> &[F] {
        &self.data
    }
    /// Copy a contiguous range of rows into a new series
    pub fn slice(&self, start: usize, end: usize) -> Series<F> {
        Series {
            width: self.width,
            data: self.data[start * self.width..end * self.width].to_vec(),
        }
    }
    /// Apply a function to every value, given its feature index
    pub fn map_features<G: Copy>(&self, mut f: impl FnMut(usize, F) -> G) -> Series<G> {
        let width = self.width;
        Series {
            width,
            data: self
                .data
                .iter()
                .enumerate()
                .map(|(i, x)| f(i % width, *x))
                .collect(),
        }
    }
}

/// Push values to a tensor staging buffer, zero filling anything which does not fit in a [`GpuFloat`]
pub fn push_values<F: Copy + NumCast>(values: &[F], input: &mut Vec<GpuFloat>) {
    input.extend(values.iter().map(|x| NumCast::from(*x).unwrap_or(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_and_columns() {
        let series = Series::from_rows(&[[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]]).unwrap();
        assert_eq!(series.width(), 2);
        assert_eq!(series.len(), 3);
        assert_eq!(series.row(1), &[2.0, 20.0]);
        assert_eq!(series.column(1).collect::<Vec<_>>(), vec![10.0, 20.0, 30.0]);
        assert_eq!(series.slice(1, 3).as_flat(), &[2.0, 20.0, 3.0, 30.0]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let rows: &[&[f64]] = &[&[1.0, 2.0], &[3.0]];
        assert!(matches!(
            Series::from_rows(rows),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(Series::from_flat(2, vec![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn values_are_staged_as_f32() {
        let mut staged = Vec::new();
        push_values(&[1.5f64, 2.25], &mut staged);
        assert_eq!(staged, vec![1.5f32, 2.25]);
    }
}
