//! # Power unit telemetry
//!
//! Loads the CSV log written by the power unit simulator, bins the samples into
//! fixed-width engine speed buckets, renders the diagnostic charts and prints a
//! summary of the run.
//!
//! ```no_run
//! use pu_telemetry::{RpmBinning, Summary, TelemetryLoader};
//!
//! # fn main() -> Result<(), pu_telemetry::Error> {
//! let mut telemetry = TelemetryLoader::default()
//!     .data_path("data/engine_log.csv")
//!     .load()?;
//! let binning = RpmBinning::default();
//! binning.label_buckets(&mut telemetry)?;
//! telemetry.with_ratios();
//! let binned = binning.bin(&telemetry)?;
//! println!("{} buckets", binned.len());
//! print!("{}", Summary::new(&telemetry));
//! # Ok(())
//! # }
//! ```

pub mod binning;
pub mod charts;
mod error;
pub mod report;
pub mod telemetry;
pub mod units;

pub use binning::{median, BinnedTable, BinningError, RpmBinning, BUCKET_CHANNEL};
pub use charts::{Chart, ChartError, ChartSpec, XAxis};
#[cfg(feature = "plot")]
pub use charts::render::Figure;
pub use error::Error;
pub use report::{Stats, Summary};
pub use telemetry::{Channels, DataFormatError, Telemetry, TelemetryLoader};
pub use units::Unit;
