use pu_telemetry::{Chart, Figure, RpmBinning, Summary, TelemetryLoader};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "pu-telemetry",
    about = "Formula-1 power unit telemetry charts and summary"
)]
struct Opt {
    /// Path to the simulator CSV log
    #[structopt(default_value = "data/engine_log.csv")]
    path: String,
    /// Charts directory
    #[structopt(short, long, default_value = "data")]
    output: String,
    /// Log start time
    #[structopt(short, long)]
    start: Option<f64>,
    /// Log end time
    #[structopt(short, long)]
    end: Option<f64>,
    /// RPM bucket width
    #[structopt(long, default_value = "250")]
    step: f64,
    /// RPM binning lower bound
    #[structopt(long, default_value = "3000")]
    rpm_min: f64,
    /// RPM binning upper bound (excluded)
    #[structopt(long, default_value = "16000")]
    rpm_max: f64,
    /// Charts regular expression filter
    #[structopt(short, long)]
    charts: Option<String>,
    /// Save the RPM binned table to CSV file
    #[structopt(long)]
    csv: Option<String>,
    /// Skip the charts
    #[structopt(long)]
    no_plot: bool,
    /// Keep rendering after a failing chart
    #[structopt(long)]
    keep_going: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut loader = TelemetryLoader::default().data_path(&opt.path);
    if let Some(arg) = opt.start {
        loader = loader.start_time(arg);
    }
    if let Some(arg) = opt.end {
        loader = loader.end_time(arg);
    }
    let mut telemetry = loader.load()?;

    let binning = RpmBinning::new(opt.rpm_min, opt.rpm_max, opt.step)?;
    binning.label_buckets(&mut telemetry)?;
    telemetry.with_ratios();
    let binned = binning.bin(&telemetry)?;
    if let Some(path) = &opt.csv {
        binned.to_csv(path)?;
    }

    let rendered = if opt.no_plot {
        Ok(vec![])
    } else {
        let charts = Chart::select(opt.charts.as_deref())?;
        Figure::new(&opt.output).render_all(&charts, &telemetry, &binned, opt.keep_going)
    };

    print!("{}", Summary::new(&telemetry));
    let rendered = rendered?;
    if !opt.no_plot {
        println!("{} charts saved to {}", rendered.len(), opt.output);
    }
    Ok(())
}
