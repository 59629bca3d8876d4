use polars::prelude::*;
use pu_telemetry::{RpmBinning, TelemetryLoader, BUCKET_CHANNEL};
use std::env;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    // Path to the simulator log, "data/engine_log.csv" by default
    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("data/engine_log.csv"));
    let mut telemetry = TelemetryLoader::default().data_path(path).load()?;
    telemetry.with_ratios();

    let binned = RpmBinning::default().bin(&telemetry)?;
    println!("RPM buckets: {}", binned.len());

    // The binned medians in a polars (https://pola-rs.github.io/polars-book/user-guide/index.html) dataframe
    let mut columns = vec![
        Column::new(BUCKET_CHANNEL.into(), binned.edges()),
        Column::new(
            "samples".into(),
            binned.samples().iter().map(|&n| n as u64).collect::<Vec<u64>>(),
        ),
    ];
    columns.extend(
        binned
            .columns()
            .map(|(name, values)| Column::new(name.into(), values)),
    );
    let table = DataFrame::new(columns)?;
    println!("{}", table.head(None));

    Ok(())
}
