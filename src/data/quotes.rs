/*!
Reading dated quote tables from CSV
*/
use super::Series;
use crate::export::TARGET_FEATURE;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::io::Read;
use std::str::FromStr;
use tracing::{debug, warn};

/// The default quote date format
pub const QUOTE_DATE: &str = "%Y-%m-%d";

/// Which columns of a quote table to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteColumns {
    /// The date column
    pub date: String,
    /// The feature columns; the first is the prediction target
    pub features: Vec<String>,
    /// The `chrono` format of the date column
    pub date_format: String,
    /// The field delimiter
    pub delimiter: u8,
}

impl QuoteColumns {
    /// Read `features` against a `Date` column in the default date format
    pub fn new<S: Into<String>>(features: impl IntoIterator<Item = S>) -> QuoteColumns {
        QuoteColumns {
            date: "Date".into(),
            features: features.into_iter().map(Into::into).collect(),
            date_format: QUOTE_DATE.into(),
            delimiter: b',',
        }
    }
}

/// A dated series of quotes, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteTable {
    /// One date per row of `series`
    pub dates: Vec<NaiveDate>,
    /// The selected features
    pub series: Series,
}

/// Read a quote table.
///
/// Rows are sorted oldest first. Empty or unparseable quotes are treated as missing, as are zeros in the target
/// (first) column. Missing quotes are filled forward from the previous row; leading missing quotes are filled
/// backward from the first present one.
pub fn read_quotes<R: Read>(rdr: R, columns: &QuoteColumns) -> Result<QuoteTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(columns.delimiter)
        .trim(csv::Trim::All)
        .from_reader(rdr);
    let headers = rdr.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| Error::ShapeMismatch(format!("no column named {:?}", name)))
    };
    let date_column = find(columns.date.as_str())?;
    let feature_columns = columns
        .features
        .iter()
        .map(|name| find(name.as_str()))
        .collect::<Result<Vec<_>>>()?;
    if feature_columns.is_empty() {
        return Err(Error::InvalidConfig("no feature columns selected".into()));
    }

    let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let raw_date = record.get(date_column).unwrap_or("");
        let date = NaiveDate::parse_from_str(raw_date, &columns.date_format).map_err(|source| {
            Error::Date {
                input: raw_date.into(),
                source,
            }
        })?;
        let values = feature_columns
            .iter()
            .enumerate()
            .map(|(feature, &i)| {
                record
                    .get(i)
                    .map(|field| field.replace(',', ""))
                    .and_then(|field| f64::from_str(&field).ok())
                    .filter(|x| x.is_finite())
                    .filter(|x| feature != TARGET_FEATURE || *x != 0.0)
            })
            .collect();
        rows.push((date, values));
    }
    rows.sort_by_key(|(date, _)| *date);

    let width = feature_columns.len();
    for feature in 0..width {
        let first = rows.iter().find_map(|(_, values)| values[feature]);
        let mut last = match first {
            Some(first) => first,
            None => {
                return Err(Error::ShapeMismatch(format!(
                    "column {:?} has no usable quotes",
                    columns.features[feature]
                )))
            }
        };
        let mut filled = 0;
        for (_, values) in rows.iter_mut() {
            match values[feature] {
                Some(x) => last = x,
                None => {
                    values[feature] = Some(last);
                    filled += 1;
                }
            }
        }
        if filled > 0 {
            warn!(column = %columns.features[feature], filled, "filled missing quotes");
        }
    }

    let mut dates = Vec::with_capacity(rows.len());
    let mut data = Vec::with_capacity(rows.len() * width);
    for (date, values) in rows {
        dates.push(date);
        data.extend(values.into_iter().map(|x| x.unwrap_or(f64::NAN)));
    }
    debug!(rows = dates.len(), width, "read quote table");
    Ok(QuoteTable {
        dates,
        series: Series::from_flat(width, data)?,
    })
}
