//! Run summary
//!
//! Scalar aggregates over the full sample table: per channel minimum, maximum
//! and last value, plus the engine state at the end of the run.

use crate::{
    telemetry::{Channels, Telemetry},
    units::Unit,
};
use itertools::{Itertools, MinMaxResult};
use std::fmt;

/// Channel aggregates
///
/// `min` and `max` are taken over the finite samples, `last` is the final sample,
/// `None` if it isn't finite.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub last: Option<f64>,
}
impl Stats {
    pub fn new(values: &[f64]) -> Self {
        let (min, max) = match values.iter().cloned().filter(|x| x.is_finite()).minmax() {
            MinMaxResult::NoElements => (None, None),
            MinMaxResult::OneElement(x) => (Some(x), Some(x)),
            MinMaxResult::MinMax(min, max) => (Some(min), Some(max)),
        };
        let last = values.last().cloned().filter(|x| x.is_finite());
        Self { min, max, last }
    }
}

/// Fixed width value, `n/a` when missing
struct Value(Option<f64>);
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(x) => write!(f, "{:>12.3}", x),
            None => write!(f, "{:>12}", "n/a"),
        }
    }
}

/// End of run state: label, channel and display unit
const FINAL_STATE: [(&str, &str, Unit); 11] = [
    ("RPM", "rpm", Unit::Identity),
    ("Total Power [kW]", "total_power", Unit::WToKw),
    ("ICE Power [kW]", "ice_power", Unit::WToKw),
    ("MGU-K Power [kW]", "mguk_power", Unit::WToKw),
    ("Brake Torque [Nm]", "torque_output", Unit::Identity),
    ("BSFC [g/kWh]", "bsfc", Unit::Identity),
    ("Thermal Efficiency [%]", "thermal_efficiency", Unit::Percent),
    ("Mechanical Efficiency [%]", "mechanical_efficiency", Unit::Percent),
    ("Boost [bar]", "boost_pressure", Unit::PaToBar),
    ("Turbo Speed [RPM]", "turbo_speed_rpm", Unit::Identity),
    ("Battery SOC [%]", "battery_soc", Unit::Percent),
];

/// Peak of a channel and the engine speed where it occurs
fn peak(telemetry: &Telemetry, channel: &str) -> Option<(f64, Option<f64>)> {
    let values = telemetry.channel(channel).ok()?;
    let rpm = telemetry.channel("rpm").ok();
    values
        .iter()
        .enumerate()
        .filter(|(_, x)| x.is_finite())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, &x)| (x, rpm.map(|rpm| rpm[i]).filter(|n| n.is_finite())))
}

fn write_peak(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    peak: Option<(f64, Option<f64>)>,
) -> fmt::Result {
    match peak {
        Some((value, rpm)) => writeln!(
            f,
            " - {:26}: {} @ {} RPM",
            label,
            Value(Some(value)),
            Value(rpm)
        ),
        None => writeln!(f, " - {:26}: {}", label, Value(None)),
    }
}

/// Text summary of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    records: usize,
    time_range: Option<(f64, f64)>,
    channels: Vec<(String, Stats)>,
    final_state: Vec<(&'static str, Option<f64>)>,
    peak_torque: Option<(f64, Option<f64>)>,
    peak_power: Option<(f64, Option<f64>)>,
    min_bsfc: Option<f64>,
}
impl Summary {
    pub fn new(telemetry: &Telemetry) -> Self {
        let time_range = telemetry.time().ok().and_then(|time| {
            let stats = Stats::new(time);
            stats.min.zip(stats.max)
        });
        let channels = telemetry
            .columns()
            .map(|(name, values)| (name.to_string(), Stats::new(values)))
            .collect();
        let final_state = FINAL_STATE
            .iter()
            .filter_map(|(label, channel, unit)| {
                telemetry
                    .channel(channel)
                    .ok()
                    .map(|values| (*label, Stats::new(values).last.map(|x| unit.apply(x))))
            })
            .collect();
        let min_bsfc = match (telemetry.channel("bsfc"), telemetry.channel("total_power")) {
            (Ok(bsfc), Ok(power)) => bsfc
                .iter()
                .zip(power)
                .filter(|(b, p)| **p > 0f64 && b.is_finite())
                .map(|(b, _)| *b)
                .min_by(|a, b| a.total_cmp(b)),
            _ => None,
        };
        Self {
            records: telemetry.len(),
            time_range,
            channels,
            final_state,
            peak_torque: peak(telemetry, "torque_output"),
            peak_power: peak(telemetry, "total_power").map(|(p, n)| (p / 1e3, n)),
            min_bsfc,
        }
    }
    /// Channel aggregates
    pub fn stats(&self, channel: &str) -> Option<&Stats> {
        self.channels
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, stats)| stats)
    }
    /// Minimum BSFC [g/kWh] while the power unit delivers power
    pub fn min_bsfc(&self) -> Option<f64> {
        self.min_bsfc
    }
}
impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SUMMARY:")?;
        writeln!(f, " - # of records: {}", self.records)?;
        match self.time_range {
            Some((start, end)) => writeln!(f, " - time range: [{:8.3}-{:8.3}]s", start, end)?,
            None => writeln!(f, " - time range: n/a")?,
        }
        writeln!(f, " - # of channels: {}", self.channels.len())?;
        writeln!(
            f,
            "    {:^24}: {:>12} {:>12} {:>12}",
            "CHANNEL", "MIN", "MAX", "LAST"
        )?;
        for (name, stats) in &self.channels {
            writeln!(
                f,
                "  - {:24}: {} {} {}",
                name,
                Value(stats.min),
                Value(stats.max),
                Value(stats.last)
            )?;
        }
        write_peak(f, "peak torque [Nm]", self.peak_torque)?;
        write_peak(f, "peak power [kW]", self.peak_power)?;
        writeln!(f, " - {:26}: {}", "min. BSFC [g/kWh]", Value(self.min_bsfc))?;
        if !self.final_state.is_empty() {
            writeln!(f, "FINAL STATE:")?;
            for (label, value) in &self.final_state {
                writeln!(f, " - {:26}: {}", label, Value(*value))?;
            }
        }
        Ok(())
    }
}
