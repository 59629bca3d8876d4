use super::{DataFormatError, Result, Telemetry};
use flate2::read::GzDecoder;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::PathBuf,
    time::Instant,
};

/// [Telemetry] loader
///
/// Reads the simulator CSV log, gzip compressed if the file name ends with `.gz`.
pub struct TelemetryLoader {
    path: PathBuf,
    time_range: (f64, f64),
}
impl Default for TelemetryLoader {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/engine_log.csv"),
            time_range: (f64::NEG_INFINITY, f64::INFINITY),
        }
    }
}
impl TelemetryLoader {
    pub fn data_path<P: Into<PathBuf>>(self, data_path: P) -> Self {
        Self {
            path: data_path.into(),
            ..self
        }
    }
    pub fn start_time(self, time: f64) -> Self {
        Self {
            time_range: (time, self.time_range.1),
            ..self
        }
    }
    pub fn end_time(self, time: f64) -> Self {
        Self {
            time_range: (self.time_range.0, time),
            ..self
        }
    }
    fn reader(&self) -> Result<Box<dyn Read>> {
        let file = File::open(&self.path).map_err(|e| DataFormatError::Io(e, self.path.clone()))?;
        let buf = BufReader::new(file);
        Ok(
            match self.path.extension().and_then(|ext| ext.to_str()) {
                Some("gz") => Box::new(GzDecoder::new(buf)),
                _ => Box::new(buf),
            },
        )
    }
    pub fn load(self) -> Result<Telemetry> {
        log::info!("Loading {:?}...", self.path);
        let now = Instant::now();
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(self.reader()?);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(DataFormatError::Empty(self.path));
        }
        let time_idx = headers.iter().position(|h| h == "time");

        let mut columns: Vec<Vec<f64>> = vec![vec![]; headers.len()];
        for (k, result) in rdr.records().enumerate() {
            let record = result?;
            let values = record
                .iter()
                .zip(headers.iter())
                .map(|(data, header)| {
                    if data.is_empty() {
                        Ok(f64::NAN)
                    } else {
                        data.parse::<f64>().map_err(|source| DataFormatError::Value {
                            record: k + 1,
                            channel: header.clone(),
                            value: data.to_string(),
                            source,
                        })
                    }
                })
                .collect::<Result<Vec<f64>>>()?;
            if let Some(time) = time_idx.map(|i| values[i]) {
                if time < self.time_range.0 || time > self.time_range.1 {
                    continue;
                }
            }
            columns
                .iter_mut()
                .zip(values)
                .for_each(|(column, value)| column.push(value));
        }
        if columns.first().map_or(true, |c| c.is_empty()) {
            return Err(DataFormatError::Empty(self.path));
        }

        let telemetry = Telemetry::from_columns(headers.into_iter().zip(columns))?;
        log::info!(
            "... loaded {} records of {} channels in {:}ms",
            telemetry.len(),
            telemetry.names.len(),
            now.elapsed().as_millis()
        );
        Ok(telemetry)
    }
}
