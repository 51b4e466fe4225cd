/*!
Scale, window, train, predict and rescale in one call
*/
use crate::config::PipelineConfig;
use crate::context::ExecutionContext;
use crate::data::scale::ScalerState;
use crate::data::window::{Splits, WindowSet};
use crate::data::Series;
use crate::export::{rescale_and_label, rescale_with_dates, ForecastRecord};
use crate::lstm::LstmRegressorDesc;
use crate::train::{EpochRecord, FitReport, Trainer};
use crate::{Error, Result};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

/// How rows of a series map to dates
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Calendar<'a> {
    /// One date per row
    Rows(&'a [NaiveDate]),
    /// Row 0 falls on this date, and rows are `step_days` apart
    Start(NaiveDate),
}

impl<'a> Calendar<'a> {
    fn date_of(&self, row: usize, step_days: i64) -> Result<NaiveDate> {
        match self {
            Calendar::Rows(dates) => dates.get(row).copied().ok_or_else(|| {
                Error::ShapeMismatch(format!("no date for row {} of {}", row, dates.len()))
            }),
            Calendar::Start(start) => (row as i64)
                .checked_mul(step_days)
                .filter(|days| days.abs() <= i64::from(i32::MAX))
                .and_then(|days| start.checked_add_signed(Duration::days(days)))
                .ok_or_else(|| {
                    Error::InvalidConfig(format!(
                        "row {} at {} days a step from {} is past the calendar",
                        row, step_days, start
                    ))
                }),
        }
    }
}

/// Which split the forecasts were made for
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluated {
    /// The held out test range
    Test,
    /// The validation range, used when the test range is too short for the lookback
    Validation,
}

/// Everything a pipeline run produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    /// The scaler fit to the training range
    pub scaler: ScalerState,
    /// Training history
    pub report: FitReport,
    /// The split the forecasts cover
    pub evaluated: Evaluated,
    /// Dated forecasts in original units
    pub records: Vec<ForecastRecord>,
    /// Root mean squared error of the forecasts, in original units
    pub rmse: f64,
}

/// Run the whole pipeline on a series with the default accelerator choice of `config`
pub fn run(series: &Series, calendar: Calendar, config: &PipelineConfig) -> Result<PipelineOutput> {
    run_with(
        series,
        calendar,
        config,
        ExecutionContext::new(config.use_accelerator),
        |_| {},
    )
}

/// Run the whole pipeline in a given execution context, observing every training epoch.
///
/// The scaler is fit on the training range only; validation and test rows outside that range are
/// extrapolated. With [`Calendar::Rows`] every forecast carries the date of the row it predicts.
pub fn run_with<O>(
    series: &Series,
    calendar: Calendar,
    config: &PipelineConfig,
    ctx: ExecutionContext,
    observer: O,
) -> Result<PipelineOutput>
where
    O: FnMut(&EpochRecord),
{
    config.validate()?;
    if let Calendar::Rows(dates) = calendar {
        if dates.len() != series.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} dates for {} rows",
                dates.len(),
                series.len()
            )));
        }
    }
    let (train_rows, _, _) = config.split.ranges(series.len())?;
    let scaler = ScalerState::fit(
        &series.slice(train_rows.start, train_rows.end),
        config.degenerate,
    )?;
    let scaled = scaler.transform(series)?;
    let splits = Splits::build(&scaled, config.lookback, config.split)?;
    info!(
        rows = series.len(),
        features = series.width(),
        train = splits.train.len(),
        valid = splits.valid.len(),
        test = splits.test.as_ref().map(WindowSet::len).unwrap_or(0),
        "built windows"
    );

    let desc = LstmRegressorDesc {
        inputs: series.width(),
        hidden: config.model.hidden,
        layers: config.model.layers,
        dropout: config.model.dropout,
        ctx,
    };
    let mut trainer = Trainer::new(ctx, &desc, config.train.clone())?;
    let report = trainer.fit_with(
        &splits.train,
        &splits.valid,
        config.train.max_epochs,
        config.train.patience,
        observer,
    )?;

    let (evaluated, set) = match &splits.test {
        Some(test) => (Evaluated::Test, test),
        None => {
            warn!(
                lookback = config.lookback,
                "test range too short for the lookback, forecasting the validation range"
            );
            (Evaluated::Validation, &splits.valid)
        }
    };
    let predictions = trainer.predict(set)?;
    let targets = set.targets();
    let first = set.target_row(0);
    let records = match calendar {
        Calendar::Rows(dates) => {
            let dates = dates.get(first..first + set.len()).ok_or_else(|| {
                Error::ShapeMismatch(format!("no dates for rows {} onwards", first))
            })?;
            rescale_with_dates(&predictions, &targets, dates, &scaler)?
        }
        Calendar::Start(_) => {
            let start_date = calendar.date_of(first - 1, config.step_days)?;
            let step = Duration::days(config.step_days);
            rescale_and_label(&predictions, &targets, start_date, step, &scaler)?
        }
    };
    let rmse = (records
        .iter()
        .map(|r| (r.predicted - r.observed).powi(2))
        .sum::<f64>()
        / records.len() as f64)
        .sqrt();
    info!(?evaluated, forecasts = records.len(), rmse, "forecast complete");

    Ok(PipelineOutput {
        scaler,
        report,
        evaluated,
        records,
        rmse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_STEP_DAYS;

    #[test]
    fn calendar_dates() {
        let start = NaiveDate::from_ymd(2018, 4, 15);
        assert_eq!(
            Calendar::Start(start).date_of(3, 1).unwrap(),
            NaiveDate::from_ymd(2018, 4, 18)
        );
        assert_eq!(
            Calendar::Start(start).date_of(3, 7).unwrap(),
            NaiveDate::from_ymd(2018, 5, 6)
        );
        let dates = [start, NaiveDate::from_ymd(2018, 4, 17)];
        assert_eq!(
            Calendar::Rows(&dates).date_of(1, 1).unwrap(),
            NaiveDate::from_ymd(2018, 4, 17)
        );
        assert!(Calendar::Rows(&dates).date_of(2, 1).is_err());
    }

    #[test]
    fn dates_past_the_calendar_are_errors() {
        let start = NaiveDate::from_ymd(2018, 4, 15);
        assert!(matches!(
            Calendar::Start(start).date_of(1_000_000, MAX_STEP_DAYS),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Calendar::Start(start).date_of(usize::MAX, MAX_STEP_DAYS),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn dates_must_cover_every_row() {
        let series = Series::univariate((0..30).map(f64::from).collect());
        let dates = [NaiveDate::from_ymd(2018, 4, 15)];
        assert!(matches!(
            run(&series, Calendar::Rows(&dates), &PipelineConfig::default()),
            Err(Error::ShapeMismatch(_))
        ));
    }
}
