/*!
Mapping predictions back to quote units, and writing them out
*/
use crate::data::scale::ScalerState;
use crate::{CpuFloat, Error, Result};
use chrono::{Duration, NaiveDate};
use num::NumCast;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// The feature predictions are made for
pub const TARGET_FEATURE: usize = 0;

/// One dated forecast, in original units
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// The date the forecast is for
    pub date: NaiveDate,
    /// The quote actually observed on `date`
    #[serde(rename = "quote")]
    pub observed: CpuFloat,
    /// The predicted quote
    #[serde(rename = "predict")]
    pub predicted: CpuFloat,
}

fn rescale<P, T>(
    predictions: &[P],
    ground_truth: &[T],
    state: &ScalerState,
) -> Result<(Vec<CpuFloat>, Vec<CpuFloat>)>
where
    P: Copy + NumCast,
    T: Copy + NumCast,
{
    if predictions.len() != ground_truth.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} predictions for {} observations",
            predictions.len(),
            ground_truth.len()
        )));
    }
    let predicted = state.inverse_feature(predictions, TARGET_FEATURE)?;
    let observed = state.inverse_feature(ground_truth, TARGET_FEATURE)?;
    Ok((predicted, observed))
}

/// Inverse-scale predictions and ground truth and label them with consecutive dates.
///
/// Record `k` (zero based) is dated `start_date + (k + 1) * step`.
pub fn rescale_and_label<P, T>(
    predictions: &[P],
    ground_truth: &[T],
    start_date: NaiveDate,
    step: Duration,
    state: &ScalerState,
) -> Result<Vec<ForecastRecord>>
where
    P: Copy + NumCast,
    T: Copy + NumCast,
{
    let (predicted, observed) = rescale(predictions, ground_truth, state)?;
    let mut date = start_date;
    let mut records = Vec::with_capacity(observed.len());
    for (observed, predicted) in observed.into_iter().zip(predicted) {
        date = date.checked_add_signed(step).ok_or_else(|| {
            Error::InvalidConfig(format!("no date {:?} after {}", step, date))
        })?;
        records.push(ForecastRecord {
            date,
            observed,
            predicted,
        });
    }
    Ok(records)
}

/// Inverse-scale predictions and ground truth and label record `k` with `dates[k]`, for calendars with gaps
pub fn rescale_with_dates<P, T>(
    predictions: &[P],
    ground_truth: &[T],
    dates: &[NaiveDate],
    state: &ScalerState,
) -> Result<Vec<ForecastRecord>>
where
    P: Copy + NumCast,
    T: Copy + NumCast,
{
    if dates.len() != predictions.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} dates for {} predictions",
            dates.len(),
            predictions.len()
        )));
    }
    let (predicted, observed) = rescale(predictions, ground_truth, state)?;
    Ok(dates
        .iter()
        .zip(observed.into_iter().zip(predicted))
        .map(|(&date, (observed, predicted))| ForecastRecord {
            date,
            observed,
            predicted,
        })
        .collect())
}

/// Write forecast records as CSV with a `date,quote,predict` header.
/// On success, return how many records were written
pub fn write_csv<W: Write>(wtr: W, records: &[ForecastRecord]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(wtr);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(records.len())
}

/// The JSON document written by [`write_json`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// The forecasts, in time order
    pub result: Vec<ForecastRecord>,
}

/// Write forecast records as a `{"result": [...]}` JSON document
pub fn write_json<W: Write>(wtr: W, records: &[ForecastRecord]) -> Result<()> {
    let document = ResultDocument {
        result: records.to_vec(),
    };
    serde_json::to_writer_pretty(wtr, &document)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{scale::DegeneratePolicy, Series};

    fn state() -> ScalerState {
        ScalerState::fit(
            &Series::univariate((1..=10).map(<f64 as From<_>>::from).collect()),
            DegeneratePolicy::Reject,
        )
        .unwrap()
    }

    #[test]
    fn dates_start_after_the_start_date() {
        let records = rescale_and_label(
            &[0.0f32, 0.5, 1.0],
            &[1.0 / 9.0, 5.0 / 9.0, 8.0 / 9.0],
            NaiveDate::from_ymd(2018, 4, 15),
            Duration::days(1),
            &state(),
        )
        .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].date, NaiveDate::from_ymd(2018, 4, 16));
        assert_eq!(records[2].date, NaiveDate::from_ymd(2018, 4, 18));
        assert!((records[0].predicted - 1.0).abs() < 1e-6);
        assert!((records[1].predicted - 5.5).abs() < 1e-6);
        assert!((records[1].observed - 6.0).abs() < 1e-9);
        assert!((records[2].observed - 9.0).abs() < 1e-9);
    }

    #[test]
    fn length_mismatch() {
        assert!(rescale_and_label(
            &[0.0f32],
            &[0.0f64, 1.0],
            NaiveDate::from_ymd(2020, 1, 1),
            Duration::days(1),
            &state(),
        )
        .is_err());
    }

    #[test]
    fn dates_past_the_calendar() {
        assert!(matches!(
            rescale_and_label(
                &[0.0f32],
                &[0.0f64],
                chrono::naive::MAX_DATE,
                Duration::days(1),
                &state(),
            ),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn explicit_dates_skip_weekends() {
        let dates = [NaiveDate::from_ymd(2018, 4, 13), NaiveDate::from_ymd(2018, 4, 16)];
        let records =
            rescale_with_dates(&[0.0f32, 1.0], &[1.0 / 9.0, 8.0 / 9.0], &dates, &state()).unwrap();
        assert_eq!(records[0].date, dates[0]);
        assert_eq!(records[1].date, dates[1]);
        assert!((records[1].observed - 9.0).abs() < 1e-9);
        assert!(matches!(
            rescale_with_dates(&[0.0f32], &[0.0f64], &dates, &state()),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn json_document_shape() {
        let records = vec![ForecastRecord {
            date: NaiveDate::from_ymd(2018, 4, 16),
            observed: 8000.5,
            predicted: 7990.25,
        }];
        let mut out = Vec::new();
        write_json(&mut out, &records).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["result"][0]["date"], "2018-04-16");
        assert_eq!(value["result"][0]["quote"], 8000.5);
        assert_eq!(value["result"][0]["predict"], 7990.25);
    }

    #[test]
    fn csv_header() {
        let records = vec![ForecastRecord {
            date: NaiveDate::from_ymd(2018, 4, 16),
            observed: 2.0,
            predicted: 1.5,
        }];
        let mut out = Vec::new();
        assert_eq!(write_csv(&mut out, &records).unwrap(), 1);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "date,quote,predict\n2018-04-16,2.0,1.5\n");
    }
}
