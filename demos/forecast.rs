/*!
Train an LSTM on a quote file and forecast its held out tail
*/

use anyhow::format_err;
use clap::{App, Arg};
use indicatif::{ProgressBar, ProgressStyle};
use quoteburn::config::PipelineConfig;
use quoteburn::context::ExecutionContext;
use quoteburn::data::quotes::{read_quotes, QuoteColumns};
use quoteburn::export::{write_csv, write_json};
use quoteburn::pipeline::{run_with, Calendar};
use std::fs::File;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub fn main() -> anyhow::Result<()> {
    let matches = App::new("Quoteburn Forecast")
        .version("1.0")
        .about("Trains an LSTM on a table of quotes and forecasts the held out test range")
        .arg(
            Arg::with_name("QUOTES")
                .help("Input quotes, CSV with a header row")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("columns")
                .short("c")
                .long("columns")
                .help("Comma separated feature columns to read; the first is forecast. Defaults to Close")
                .takes_value(true)
                .use_delimiter(true),
        )
        .arg(
            Arg::with_name("tsv")
                .long("tsv")
                .help("Read tab separated quotes"),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .help("JSON pipeline configuration")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("device")
                .short("d")
                .long("device")
                .help("Device to use: cuda, cpu. Overrides the configuration")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .help("Where to write forecasts; .csv writes CSV, anything else JSON. Defaults to stdout")
                .takes_value(true),
        )
        .get_matches();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match matches.value_of("config") {
        Some(path) => PipelineConfig::from_reader(File::open(Path::new(path))?)?,
        None => PipelineConfig::default(),
    };
    if let Some(device) = matches.value_of("device") {
        config.use_accelerator = match device {
            "cuda" => true,
            "cpu" => false,
            device => return Err(format_err!("Invalid value for device: {:?}", device)),
        };
    }
    let ctx = ExecutionContext::new(config.use_accelerator);

    let mut columns = QuoteColumns::new(
        matches
            .values_of("columns")
            .map(|values| values.collect::<Vec<_>>())
            .unwrap_or_else(|| vec!["Close"]),
    );
    if matches.is_present("tsv") {
        columns.delimiter = b'\t';
    }
    let input = matches.value_of("QUOTES").expect("Required");
    let table = read_quotes(File::open(Path::new(input))?, &columns)?;
    info!(rows = table.series.len(), file = input, "loaded quotes");

    let epochs_progress = ProgressBar::new(config.train.max_epochs as u64);
    epochs_progress.set_style(
        ProgressStyle::default_bar().template("[{msg:<30}] {wide_bar} {pos:>4}/{len:4}"),
    );
    let output = run_with(
        &table.series,
        Calendar::Rows(&table.dates),
        &config,
        ctx,
        |record| {
            epochs_progress.set_message(&format!(
                "train {:.5} valid {:.5}",
                record.train_cost, record.valid_cost
            ));
            epochs_progress.inc(1);
        },
    )?;
    epochs_progress.finish_and_clear();

    eprintln!(
        "Best validation cost {:?} at epoch {:?}; RMSE over {} forecasts = {:.4}",
        output.report.best_cost,
        output.report.best_epoch,
        output.records.len(),
        output.rmse
    );

    match matches.value_of("output") {
        Some(path) if path.ends_with(".csv") => {
            write_csv(File::create(Path::new(path))?, &output.records)?;
        }
        Some(path) => write_json(File::create(Path::new(path))?, &output.records)?,
        None => write_json(std::io::stdout(), &output.records)?,
    }
    Ok(())
}
