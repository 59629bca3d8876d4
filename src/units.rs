//! Unit conversions from the logged SI units to the display units

/// Standard atmosphere [Pa]
pub const ATMOSPHERE: f64 = 101325.0;
/// 0°C [K]
pub const ZERO_CELSIUS: f64 = 273.15;

/// Conversion applied to a channel before plotting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// As logged
    #[default]
    Identity,
    /// Pa to bar (atmosphere)
    PaToBar,
    /// W to kW
    WToKw,
    /// K to °C
    KToCelsius,
    /// fraction to %
    Percent,
    /// kg/s to kg/h
    KgPerHour,
    /// J to MJ
    JToMj,
}
impl Unit {
    pub fn apply(&self, value: f64) -> f64 {
        use Unit::*;
        match self {
            Identity => value,
            PaToBar => value / ATMOSPHERE,
            WToKw => value / 1e3,
            KToCelsius => value - ZERO_CELSIUS,
            Percent => value * 100.,
            KgPerHour => value * 3600.,
            JToMj => value / 1e6,
        }
    }
    pub fn convert(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&x| self.apply(x)).collect()
    }
}
