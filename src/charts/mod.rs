//! Diagnostic charts
//!
//! Each [Chart] is a declarative [ChartSpec]: the x axis, the channels drawn on
//! the left and (optionally) right axes with their unit conversion, and the
//! horizontal reference lines.
//! The [Figure](render::Figure) renderer turns a [ChartSpec] into a PNG file.

use crate::{
    binning::BUCKET_CHANNEL,
    telemetry::{Channels, DataFormatError},
    units::Unit,
};
use regex::Regex;
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

#[cfg(feature = "plot")]
pub mod render;

#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("missing data for chart {0}")]
    Data(Chart, #[source] DataFormatError),
    #[error("chart {0} has no finite value to plot")]
    NoData(Chart),
    #[error("failed to draw chart {0}: {1}")]
    Draw(Chart, String),
}

/// Chart x axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XAxis {
    /// Raw samples against time
    Time,
    /// Bucket medians against the bucket lower edge
    Rpm,
}
impl XAxis {
    /// The channel of the x axis
    pub fn channel(&self) -> &'static str {
        match self {
            XAxis::Time => "time",
            XAxis::Rpm => BUCKET_CHANNEL,
        }
    }
    pub fn label(&self) -> &'static str {
        match self {
            XAxis::Time => "Time [s]",
            XAxis::Rpm => "RPM",
        }
    }
}

/// A plotted channel
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub channel: &'static str,
    pub label: &'static str,
    pub unit: Unit,
}
impl Series {
    pub const fn new(channel: &'static str, label: &'static str, unit: Unit) -> Self {
        Self {
            channel,
            label,
            unit,
        }
    }
}

/// A y axis and its series
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub label: &'static str,
    pub series: Vec<Series>,
}

/// Horizontal reference line, in the left axis display unit
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub value: f64,
    pub label: &'static str,
}

/// Chart description
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub chart: Chart,
    pub title: &'static str,
    pub x: XAxis,
    pub left: Axis,
    pub right: Option<Axis>,
    pub thresholds: Vec<Threshold>,
}
impl ChartSpec {
    /// Iterator over all the channels the chart reads, x axis included
    pub fn channels(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.x.channel()).chain(
            self.left
                .series
                .iter()
                .chain(self.right.iter().flat_map(|axis| axis.series.iter()))
                .map(|series| series.channel),
        )
    }
    /// Checks that every channel of the chart is available in `data`
    pub fn check<C: Channels + ?Sized>(&self, data: &C) -> Result<(), ChartError> {
        self.channels()
            .try_for_each(|name| data.channel(name).map(|_| ()))
            .map_err(|e| ChartError::Data(self.chart, e))
    }
    /// Output file name
    pub fn filename(&self) -> String {
        format!("{}.png", self.chart)
    }
}

macro_rules! axis {
    ($label:expr, [$(($channel:expr, $name:expr, $unit:ident)),+ $(,)?]) => {
        Axis {
            label: $label,
            series: vec![$(Series::new($channel, $name, Unit::$unit)),+],
        }
    };
}

/// The power unit diagnostic charts, in rendering order
#[derive(EnumIter, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Chart {
    RpmVsTime,
    TorqueCurve,
    TorqueBreakdown,
    PowerBreakdown,
    MeanEffectivePressure,
    Efficiency,
    Bsfc,
    IntakePressure,
    IntakeTemperature,
    Exhaust,
    AirFlow,
    AirFuelRatio,
    FuelFlow,
    TurboSpeed,
    ErsTorque,
    Battery,
}
impl Chart {
    /// Returns the charts which file name matches the regular expression
    ///
    /// All the charts are returned if there is no expression.
    pub fn select(pattern: Option<&str>) -> Result<Vec<Chart>, regex::Error> {
        match pattern {
            Some(pattern) => {
                let re = Regex::new(pattern)?;
                Ok(Chart::iter().filter(|c| re.is_match(&c.to_string())).collect())
            }
            None => Ok(Chart::iter().collect()),
        }
    }
    /// The chart description
    pub fn spec(&self) -> ChartSpec {
        use Chart::*;
        let (title, x, left, right, thresholds) = match self {
            RpmVsTime => (
                "Engine RPM vs Time",
                XAxis::Time,
                axis!("RPM", [("rpm", "RPM", Identity)]),
                None,
                vec![],
            ),
            TorqueCurve => (
                "Torque and Power Curve",
                XAxis::Rpm,
                axis!("Torque [Nm]", [("torque_output", "Torque", Identity)]),
                Some(axis!("Power [kW]", [("total_power", "Power", WToKw)])),
                vec![],
            ),
            TorqueBreakdown => (
                "Torque Breakdown",
                XAxis::Rpm,
                axis!(
                    "Torque [Nm]",
                    [
                        ("indicated_torque", "Indicated", Identity),
                        ("friction_torque", "Friction", Identity),
                        ("pumping_torque", "Pumping", Identity),
                        ("torque_output", "Brake", Identity),
                    ]
                ),
                None,
                vec![],
            ),
            PowerBreakdown => (
                "Power Breakdown",
                XAxis::Rpm,
                axis!(
                    "Power [kW]",
                    [
                        ("ice_power", "ICE", WToKw),
                        ("mguk_power", "MGU-K", WToKw),
                        ("mguh_power", "MGU-H", WToKw),
                        ("total_power", "Total", WToKw),
                    ]
                ),
                None,
                vec![],
            ),
            MeanEffectivePressure => (
                "Mean Effective Pressures",
                XAxis::Rpm,
                axis!(
                    "MEP [kPa]",
                    [
                        ("imep", "IMEP", Identity),
                        ("bmep", "BMEP", Identity),
                        ("fmep", "FMEP", Identity),
                    ]
                ),
                None,
                vec![],
            ),
            Efficiency => (
                "Efficiencies",
                XAxis::Rpm,
                axis!(
                    "Efficiency [%]",
                    [
                        ("thermal_efficiency", "Thermal", Percent),
                        ("mechanical_efficiency", "Mechanical", Percent),
                        ("volumetric_efficiency", "Volumetric", Percent),
                    ]
                ),
                None,
                vec![],
            ),
            Bsfc => (
                "Brake Specific Fuel Consumption",
                XAxis::Rpm,
                axis!("BSFC [g/kWh]", [("bsfc", "BSFC", Identity)]),
                None,
                vec![],
            ),
            IntakePressure => (
                "Intake Pressures",
                XAxis::Time,
                axis!(
                    "Pressure [bar]",
                    [
                        ("plenum_pressure", "Plenum", PaToBar),
                        ("intake_manifold_pressure", "Intake manifold", PaToBar),
                        ("boost_pressure", "Boost", PaToBar),
                    ]
                ),
                None,
                vec![Threshold {
                    value: 1.0,
                    label: "Ambient",
                }],
            ),
            IntakeTemperature => (
                "Intake Temperatures",
                XAxis::Time,
                axis!(
                    "Temperature [°C]",
                    [
                        ("intake_manifold_temp", "Intake manifold", KToCelsius),
                        ("compressor_outlet_temp", "Compressor outlet", KToCelsius),
                    ]
                ),
                None,
                vec![],
            ),
            Exhaust => (
                "Exhaust Temperature and Pressure",
                XAxis::Rpm,
                axis!("Temperature [°C]", [("exhaust_temp", "Temperature", KToCelsius)]),
                Some(axis!(
                    "Pressure [bar]",
                    [("exhaust_manifold_pressure", "Manifold pressure", PaToBar)]
                )),
                vec![],
            ),
            AirFlow => (
                "Air Mass Flow",
                XAxis::Rpm,
                axis!(
                    "Air flow [kg/s]",
                    [
                        ("na_air_flow", "Naturally aspirated", Identity),
                        ("actual_air_flow", "Actual", Identity),
                        ("turbo_air_flow", "Turbo", Identity),
                    ]
                ),
                None,
                vec![],
            ),
            AirFuelRatio => (
                "Air-Fuel Ratio",
                XAxis::Rpm,
                axis!("AFR", [("air_fuel_ratio", "AFR", Identity)]),
                None,
                vec![Threshold {
                    value: 14.7,
                    label: "Stoichiometric",
                }],
            ),
            FuelFlow => (
                "Fuel Mass Flow",
                XAxis::Time,
                axis!("Fuel flow [kg/h]", [("fuel_mass_flow", "Fuel flow", KgPerHour)]),
                None,
                vec![Threshold {
                    value: 100.0,
                    label: "100 kg/h limit",
                }],
            ),
            TurboSpeed => (
                "Turbocharger Speed",
                XAxis::Time,
                axis!("Turbo speed [RPM]", [("turbo_speed_rpm", "Turbo", Identity)]),
                None,
                vec![Threshold {
                    value: 125_000.0,
                    label: "125000 RPM limit",
                }],
            ),
            ErsTorque => (
                "ERS Torques",
                XAxis::Time,
                axis!(
                    "Torque [Nm]",
                    [
                        ("mguk_torque", "MGU-K", Identity),
                        ("mguh_torque", "MGU-H", Identity),
                    ]
                ),
                None,
                vec![],
            ),
            Battery => (
                "Battery State",
                XAxis::Time,
                axis!("SOC [%]", [("battery_soc", "SOC", Percent)]),
                Some(axis!("Energy [MJ]", [("battery_energy", "Energy", JToMj)])),
                vec![],
            ),
        };
        ChartSpec {
            chart: *self,
            title,
            x,
            left,
            right,
            thresholds,
        }
    }
}
impl fmt::Display for Chart {
    /// The chart file stem
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Chart::*;
        let stem = match self {
            RpmVsTime => "rpm_vs_time",
            TorqueCurve => "torque_curve",
            TorqueBreakdown => "torque_breakdown",
            PowerBreakdown => "power_breakdown",
            MeanEffectivePressure => "mean_effective_pressure",
            Efficiency => "efficiency",
            Bsfc => "bsfc",
            IntakePressure => "intake_pressure",
            IntakeTemperature => "intake_temperature",
            Exhaust => "exhaust",
            AirFlow => "air_flow",
            AirFuelRatio => "air_fuel_ratio",
            FuelFlow => "fuel_flow",
            TurboSpeed => "turbo_speed",
            ErsTorque => "ers_torque",
            Battery => "battery",
        };
        write!(f, "{}", stem)
    }
}
