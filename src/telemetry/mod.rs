use std::{collections::BTreeMap, io, num::ParseFloatError, path::PathBuf};

mod loader;
pub use loader::TelemetryLoader;

#[derive(thiserror::Error, Debug)]
pub enum DataFormatError {
    #[error("failed to read telemetry log {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to parse the CSV telemetry log")]
    Csv(#[from] csv::Error),
    #[error("telemetry log {0:?} has no data")]
    Empty(PathBuf),
    #[error("channel {0:?} is declared twice in the log header")]
    DuplicateChannel(String),
    #[error("invalid value {value:?} for channel {channel:?} in record #{record}")]
    Value {
        record: usize,
        channel: String,
        value: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("channel {0:?} not found")]
    MissingChannel(String),
    #[error("channel {0:?} has {1} samples, expected {2}")]
    Length(String, usize, usize),
}
type Result<T> = std::result::Result<T, DataFormatError>;

/// Column lookup by channel name
///
/// Implemented by both the raw [Telemetry] table and the
/// [BinnedTable](crate::BinnedTable) so the charts can draw from either.
pub trait Channels {
    /// Returns the samples of a channel
    fn channel(&self, name: &str) -> Result<&[f64]>;
    /// Returns the channel names in table order
    fn channel_names(&self) -> Vec<&str>;
    /// Checks that a channel exists
    fn has_channel(&self, name: &str) -> bool {
        self.channel(name).is_ok()
    }
}

/// Power unit telemetry samples
///
/// One column per logged channel, all of the same length, in the order of the log header.
#[derive(Debug, Default, Clone)]
pub struct Telemetry {
    names: Vec<String>,
    data: BTreeMap<String, Vec<f64>>,
    len: usize,
}
impl Telemetry {
    /// Returns a [TelemetryLoader] for the log at `path`
    pub fn loader<P: Into<PathBuf>>(path: P) -> TelemetryLoader {
        TelemetryLoader::default().data_path(path)
    }
    /// Builds a table from `(name, samples)` pairs
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut this = Self::default();
        for (name, values) in columns {
            let name: String = name.into();
            if this.data.contains_key(&name) {
                return Err(DataFormatError::DuplicateChannel(name));
            }
            this.push_column(name, values)?;
        }
        Ok(this)
    }
    /// Number of samples
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    /// The time channel [s]
    pub fn time(&self) -> Result<&[f64]> {
        self.channel("time")
    }
    /// Appends a column, replacing a column of the same name
    pub fn push_column<S: Into<String>>(&mut self, name: S, values: Vec<f64>) -> Result<&mut Self> {
        let name = name.into();
        if self.names.is_empty() {
            self.len = values.len();
        } else if values.len() != self.len {
            return Err(DataFormatError::Length(name, values.len(), self.len));
        }
        if self.data.insert(name.clone(), values).is_none() {
            self.names.push(name);
        }
        Ok(self)
    }
    /// Element-wise ratio of two channels
    ///
    /// A zero denominator gives NaN.
    pub fn ratio(&self, numerator: &str, denominator: &str) -> Result<Vec<f64>> {
        let num = self.channel(numerator)?;
        let den = self.channel(denominator)?;
        Ok(num
            .iter()
            .zip(den)
            .map(|(n, d)| if *d == 0f64 { f64::NAN } else { n / d })
            .collect())
    }
    /// Share of the total power delivered by the MGU-K and the MGU-H
    pub fn ers_power_share(&self) -> Result<Vec<f64>> {
        let mguk = self.channel("mguk_power")?;
        let mguh = self.channel("mguh_power")?;
        let total = self.channel("total_power")?;
        Ok(mguk
            .iter()
            .zip(mguh)
            .zip(total)
            .map(|((k, h), t)| if *t == 0f64 { f64::NAN } else { (k + h) / t })
            .collect())
    }
    /// Appends the derived ratio channels
    ///
    ///  - `air_fuel_ratio`: `actual_air_flow / fuel_mass_flow`
    ///  - `ers_power_share`: `(mguk_power + mguh_power) / total_power`
    ///
    /// A ratio is skipped when one of its source channels is missing.
    pub fn with_ratios(&mut self) -> &mut Self {
        let derived = [
            ("air_fuel_ratio", self.ratio("actual_air_flow", "fuel_mass_flow")),
            ("ers_power_share", self.ers_power_share()),
        ];
        for (name, values) in derived {
            match values.and_then(|values| self.push_column(name, values).map(|_| ())) {
                Ok(()) => log::debug!("derived channel: {name}"),
                Err(e) => log::debug!("skipping derived channel {name}: {e}"),
            }
        }
        self
    }
    /// Iterator over the `(name, samples)` columns in table order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        self.names
            .iter()
            .filter_map(move |name| self.data.get(name).map(|v| (name.as_str(), v.as_slice())))
    }
}
impl Channels for Telemetry {
    fn channel(&self, name: &str) -> Result<&[f64]> {
        self.data
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| DataFormatError::MissingChannel(name.to_string()))
    }
    fn channel_names(&self) -> Vec<&str> {
        self.names.iter().map(|n| n.as_str()).collect()
    }
}
