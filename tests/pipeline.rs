use pu_telemetry::{
    BinnedTable, Channels, Chart, RpmBinning, Summary, Telemetry, XAxis, BUCKET_CHANNEL,
};
use std::{fs, path::PathBuf};

const CHANNELS: [&str; 41] = [
    "time",
    "rpm",
    "omega",
    "throttle",
    "effective_throttle",
    "indicated_torque",
    "combustion_torque",
    "friction_torque",
    "pumping_torque",
    "load_torque",
    "mguk_torque",
    "mguh_torque",
    "net_torque",
    "torque_output",
    "ice_power",
    "mguk_power",
    "mguh_power",
    "total_power",
    "imep",
    "bmep",
    "fmep",
    "thermal_efficiency",
    "mechanical_efficiency",
    "bsfc",
    "volumetric_efficiency",
    "plenum_pressure",
    "intake_manifold_pressure",
    "intake_manifold_temp",
    "boost_pressure",
    "compressor_outlet_temp",
    "exhaust_manifold_pressure",
    "exhaust_temp",
    "exhaust_mass_flow",
    "na_air_flow",
    "actual_air_flow",
    "turbo_air_flow",
    "fuel_mass_flow",
    "turbo_speed",
    "turbo_speed_rpm",
    "battery_energy",
    "battery_soc",
];

fn write_log(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("pu-telemetry-pipeline");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// A ramp from 3000 to 15000 RPM with every simulator channel
fn full_log() -> String {
    let mut log = CHANNELS.join(",");
    log.push('\n');
    for i in 0..400 {
        let time = i as f64 * 0.01;
        let rpm = 3000. + 30. * i as f64;
        let record: Vec<String> = CHANNELS
            .iter()
            .enumerate()
            .map(|(k, channel)| match *channel {
                "time" => format!("{time:.2}"),
                "rpm" => format!("{rpm}"),
                _ => format!("{}", 1. + k as f64 + 1e-3 * i as f64),
            })
            .collect();
        log.push_str(&record.join(","));
        log.push('\n');
    }
    log
}

fn pipeline(path: &PathBuf) -> (Telemetry, BinnedTable) {
    let binning = RpmBinning::default();
    let mut telemetry = Telemetry::loader(path).load().unwrap();
    binning.label_buckets(&mut telemetry).unwrap();
    telemetry.with_ratios();
    let binned = binning.bin(&telemetry).unwrap();
    (telemetry, binned)
}

#[test]
fn every_chart_has_its_channels() {
    let path = write_log("full.csv", &full_log());
    let (telemetry, binned) = pipeline(&path);
    assert_eq!(telemetry.len(), 400);
    assert!(telemetry.has_channel("air_fuel_ratio"));
    assert!(telemetry.has_channel("ers_power_share"));
    assert!(telemetry.has_channel(BUCKET_CHANNEL));
    // 3000 to 14970 RPM
    assert_eq!(binned.len(), 48);
    assert_eq!(binned.samples().iter().sum::<usize>(), 400);
    for chart in Chart::select(None).unwrap() {
        let spec = chart.spec();
        let result = match spec.x {
            XAxis::Time => spec.check(&telemetry),
            XAxis::Rpm => spec.check(&binned),
        };
        assert!(result.is_ok(), "{chart}: {:?}", result);
    }
}

#[test]
fn identical_summaries() {
    let path = write_log("summary.csv", &full_log());
    let (first, _) = pipeline(&path);
    let (second, _) = pipeline(&path);
    let text = Summary::new(&first).to_string();
    assert_eq!(text, Summary::new(&second).to_string());
    assert!(text.contains(" - # of records: 400"));
    assert!(text.contains("FINAL STATE:"));
}

#[test]
fn torque_medians() {
    let path = write_log(
        "four.csv",
        "time,rpm,torque_output\n0,3100,10\n1,3100,20\n2,3349,30\n3,3350,40\n",
    );
    let (_, binned) = pipeline(&path);
    assert_eq!(binned.channel(BUCKET_CHANNEL).unwrap(), &[3000., 3250.]);
    assert_eq!(binned.channel("torque_output").unwrap(), &[15., 35.]);
    assert_eq!(binned.samples(), &[2, 2]);
}

#[test]
fn binned_csv_export() {
    let path = write_log(
        "export.csv",
        "time,rpm,torque_output\n0,3100,10\n1,3100,20\n2,3349,30\n3,3350,40\n",
    );
    let (_, binned) = pipeline(&path);
    let csv = path.with_file_name("export_binned.csv");
    binned.to_csv(&csv).unwrap();
    let contents = fs::read_to_string(&csv).unwrap();
    let mut lines = contents.lines();
    assert_eq!(
        lines.next(),
        Some("rpm_bucket,samples,time,rpm,torque_output")
    );
    assert_eq!(lines.next(), Some("3000,2,0.5,3100,15"));
    assert_eq!(lines.next(), Some("3250,2,2.5,3349.5,35"));
    assert_eq!(lines.next(), None);
}
