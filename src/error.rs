use crate::{binning::BinningError, charts::ChartError, telemetry::DataFormatError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `telemetry` module")]
    DataFormat(#[from] DataFormatError),
    #[error("Error in the `binning` module")]
    Binning(#[from] BinningError),
    #[error("Error in the `charts` module")]
    Chart(#[from] ChartError),
    #[error("invalid chart filter")]
    ChartFilter(#[from] regex::Error),
    #[error("{0} chart(s) failed to render")]
    ChartsFailed(usize),
}
