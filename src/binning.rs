//! Engine speed binning
//!
//! Samples are grouped into fixed-width buckets `[min + k*step, min + (k+1)*step)`
//! over the domain `[min, max)` and each bucket is reduced to the median of
//! every channel. Empty buckets are absent from the [BinnedTable], consumers
//! must not assume contiguous buckets.

use crate::telemetry::{Channels, DataFormatError, Telemetry};
use std::{collections::BTreeMap, path::Path};

/// Name of the channel holding the bucket lower edge
pub const BUCKET_CHANNEL: &str = "rpm_bucket";

#[derive(thiserror::Error, Debug)]
pub enum BinningError {
    #[error("invalid binning domain [{min}, {max}) with step {step}")]
    InvalidDomain { min: f64, max: f64, step: f64 },
    #[error("binning channel not available")]
    Channel(#[from] DataFormatError),
    #[error("failed to write the binned table")]
    Csv(#[from] csv::Error),
}
type Result<T> = std::result::Result<T, BinningError>;

/// Median of the non-NaN values
///
/// The median of an even number of values is the mean of the two middle values.
pub fn median<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let mut values: Vec<f64> = values.into_iter().filter(|x| !x.is_nan()).collect();
    let n = values.len();
    if n == 0 {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    })
}

/// Fixed-width binning of a channel
#[derive(Debug, Clone, PartialEq)]
pub struct RpmBinning {
    channel: String,
    min: f64,
    max: f64,
    step: f64,
}
impl Default for RpmBinning {
    /// 250rpm buckets from 3000rpm to 16000rpm
    fn default() -> Self {
        Self {
            channel: String::from("rpm"),
            min: 3000f64,
            max: 16000f64,
            step: 250f64,
        }
    }
}
impl RpmBinning {
    /// Creates a new binning of the `rpm` channel over `[min, max)`
    pub fn new(min: f64, max: f64, step: f64) -> Result<Self> {
        let this = Self {
            min,
            max,
            step,
            ..Default::default()
        };
        this.validate()?;
        Ok(this)
    }
    /// Bins another channel
    pub fn channel<S: Into<String>>(self, channel: S) -> Self {
        Self {
            channel: channel.into(),
            ..self
        }
    }
    /// The binned channel
    pub fn channel_name(&self) -> &str {
        &self.channel
    }
    /// Domain lower bound
    pub fn min(&self) -> f64 {
        self.min
    }
    /// Domain upper bound, excluded
    pub fn max(&self) -> f64 {
        self.max
    }
    /// Bucket width
    pub fn step(&self) -> f64 {
        self.step
    }
    fn validate(&self) -> Result<()> {
        if self.min.is_finite() && self.max.is_finite() && self.step > 0f64 && self.min < self.max
        {
            Ok(())
        } else {
            Err(BinningError::InvalidDomain {
                min: self.min,
                max: self.max,
                step: self.step,
            })
        }
    }
    /// Number of buckets in the domain
    pub fn n_buckets(&self) -> usize {
        if self.validate().is_err() {
            return 0;
        }
        ((self.max - self.min) / self.step).ceil() as usize
    }
    /// Returns the bucket index of `value` or `None` if `value` is outside the domain
    pub fn bucket(&self, value: f64) -> Option<usize> {
        if !(value >= self.min && value < self.max) {
            return None;
        }
        let last = self.n_buckets().checked_sub(1)?;
        let k = ((value - self.min) / self.step).floor() as usize;
        Some(k.min(last))
    }
    /// Lower edge of a bucket
    pub fn lower_edge(&self, bucket: usize) -> f64 {
        self.min + bucket as f64 * self.step
    }
    /// Appends the [BUCKET_CHANNEL] channel to the telemetry
    ///
    /// Samples outside the domain are given NaN.
    pub fn label_buckets(&self, telemetry: &mut Telemetry) -> Result<()> {
        self.validate()?;
        let edges: Vec<f64> = telemetry
            .channel(&self.channel)?
            .iter()
            .map(|&x| {
                self.bucket(x)
                    .map_or(f64::NAN, |bucket| self.lower_edge(bucket))
            })
            .collect();
        telemetry.push_column(BUCKET_CHANNEL, edges)?;
        Ok(())
    }
    /// Bins the telemetry, reducing each bucket to its median values
    pub fn bin(&self, telemetry: &Telemetry) -> Result<BinnedTable> {
        self.validate()?;
        let buckets: BTreeMap<usize, Vec<usize>> = telemetry
            .channel(&self.channel)?
            .iter()
            .enumerate()
            .filter_map(|(i, &x)| self.bucket(x).map(|bucket| (bucket, i)))
            .fold(BTreeMap::new(), |mut buckets, (bucket, i)| {
                buckets.entry(bucket).or_insert_with(Vec::new).push(i);
                buckets
            });

        let mut table = BinnedTable {
            binning: self.clone(),
            edges: buckets.keys().map(|&bucket| self.lower_edge(bucket)).collect(),
            samples: buckets.values().map(|rows| rows.len()).collect(),
            ..Default::default()
        };
        for (name, values) in telemetry.columns().filter(|(name, _)| *name != BUCKET_CHANNEL) {
            let medians: Vec<f64> = buckets
                .values()
                .map(|rows| median(rows.iter().map(|&i| values[i])).unwrap_or(f64::NAN))
                .collect();
            table.names.push(name.to_string());
            table.data.insert(name.to_string(), medians);
        }
        log::info!(
            "binned {} samples into {} buckets of {}",
            table.samples.iter().sum::<usize>(),
            table.len(),
            self.channel
        );
        Ok(table)
    }
}

/// Telemetry binned by engine speed
///
/// One row per non-empty bucket, in increasing bucket order.
#[derive(Debug, Default, Clone)]
pub struct BinnedTable {
    binning: RpmBinning,
    edges: Vec<f64>,
    samples: Vec<usize>,
    names: Vec<String>,
    data: BTreeMap<String, Vec<f64>>,
}
impl BinnedTable {
    /// Number of non-empty buckets
    pub fn len(&self) -> usize {
        self.edges.len()
    }
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
    /// The binning that produced the table
    pub fn binning(&self) -> &RpmBinning {
        &self.binning
    }
    /// Bucket lower edges
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }
    /// Number of samples in each bucket
    pub fn samples(&self) -> &[usize] {
        &self.samples
    }
    /// Iterator over the `(name, medians)` columns in table order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        self.names
            .iter()
            .filter_map(move |name| self.data.get(name).map(|v| (name.as_str(), v.as_slice())))
    }
    /// Writes the table to a CSV file
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path.as_ref())?;
        let mut keys = vec![BUCKET_CHANNEL.to_string(), String::from("samples")];
        keys.extend(self.names.iter().cloned());
        wtr.write_record(&keys)?;
        for (k, (edge, samples)) in self.edges.iter().zip(&self.samples).enumerate() {
            let mut record = vec![format!("{}", edge), format!("{}", samples)];
            record.extend(self.columns().map(|(_, values)| format!("{}", values[k])));
            wtr.write_record(&record)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        log::info!("binned table written to {:?}", path.as_ref());
        Ok(())
    }
}
impl Channels for BinnedTable {
    /// [BUCKET_CHANNEL] returns the bucket lower edges, any other name the bucket medians
    fn channel(&self, name: &str) -> std::result::Result<&[f64], DataFormatError> {
        if name == BUCKET_CHANNEL {
            return Ok(&self.edges);
        }
        self.data
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| DataFormatError::MissingChannel(name.to_string()))
    }
    fn channel_names(&self) -> Vec<&str> {
        std::iter::once(BUCKET_CHANNEL)
            .chain(self.names.iter().map(|n| n.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    fn telemetry(rpm: Vec<f64>, torque: Vec<f64>) -> Telemetry {
        let time = (0..rpm.len()).map(|i| i as f64 * 1e-3).collect();
        Telemetry::from_columns(vec![("time", time), ("rpm", rpm), ("torque", torque)]).unwrap()
    }

    #[test]
    fn median_values() {
        assert_eq!(median(Vec::<f64>::new()), None);
        assert_eq!(median(vec![3.]), Some(3.));
        assert_eq!(median(vec![40., 30.]), Some(35.));
        assert_eq!(median(vec![5., 1., 3.]), Some(3.));
        assert_eq!(median(vec![f64::NAN, 1., 2.]), Some(1.5));
        assert_eq!(median(vec![f64::NAN]), None);
    }

    #[test]
    fn bucket_boundaries() {
        let binning = RpmBinning::default();
        assert_eq!(binning.n_buckets(), 52);
        assert_eq!(binning.bucket(2999.999), None);
        assert_eq!(binning.bucket(3000.), Some(0));
        assert_eq!(binning.bucket(3249.999), Some(0));
        assert_eq!(binning.bucket(3250.), Some(1));
        assert_eq!(binning.bucket(3350.), Some(1));
        assert_eq!(binning.bucket(15999.999), Some(51));
        assert_eq!(binning.bucket(16000.), None);
        assert_eq!(binning.bucket(f64::NAN), None);
        assert_eq!(binning.lower_edge(1), 3250.);
    }

    #[test]
    fn invalid_domain() {
        assert!(RpmBinning::new(3000., 3000., 250.).is_err());
        assert!(RpmBinning::new(3000., 16000., 0.).is_err());
        assert!(RpmBinning::new(3000., 16000., -250.).is_err());
        assert!(RpmBinning::new(f64::NEG_INFINITY, 16000., 250.).is_err());
        assert!(RpmBinning::new(0., 1000., 300.).is_ok());
    }

    #[test]
    fn unvalidated_binning_has_no_bucket() {
        let binning = RpmBinning {
            step: -250.,
            ..Default::default()
        };
        assert_eq!(binning.n_buckets(), 0);
        assert_eq!(binning.bucket(3100.), None);
        let binning = RpmBinning {
            max: 3000.,
            ..Default::default()
        };
        assert_eq!(binning.bucket(3000.), None);
    }

    #[test]
    fn binning_accessors() {
        let binning = RpmBinning::new(4000., 15000., 500.).unwrap().channel("omega");
        assert_eq!(binning.channel_name(), "omega");
        assert_eq!((binning.min(), binning.max(), binning.step()), (4000., 15000., 500.));
        assert_eq!(binning.n_buckets(), 22);
    }

    #[test]
    fn four_samples() {
        let telemetry = telemetry(vec![3100., 3100., 3349., 3350.], vec![10., 20., 30., 40.]);
        let binned = RpmBinning::default().bin(&telemetry).unwrap();
        assert_eq!(binned.edges(), &[3000., 3250.]);
        assert_eq!(binned.samples(), &[2, 2]);
        assert_eq!(binned.channel("torque").unwrap(), &[15., 35.]);
        assert_eq!(binned.channel(BUCKET_CHANNEL).unwrap(), &[3000., 3250.]);
    }

    #[test]
    fn out_of_domain_and_gaps() {
        let telemetry = telemetry(
            vec![2500., 3100., 4010., 16000., 17000., f64::NAN],
            vec![1., 2., 3., 4., 5., 6.],
        );
        let binned = RpmBinning::default().bin(&telemetry).unwrap();
        assert_eq!(binned.edges(), &[3000., 4000.]);
        assert_eq!(binned.channel("torque").unwrap(), &[2., 3.]);
        assert_eq!(binned.samples().iter().sum::<usize>(), 2);
    }

    #[test]
    fn all_nan_channel_in_bucket() {
        let telemetry = telemetry(vec![3100., 3200.], vec![f64::NAN, f64::NAN]);
        let binned = RpmBinning::default().bin(&telemetry).unwrap();
        assert!(binned.channel("torque").unwrap()[0].is_nan());
    }

    #[test]
    fn missing_channel() {
        let telemetry = Telemetry::from_columns(vec![("time", vec![0.])]).unwrap();
        assert!(matches!(
            RpmBinning::default().bin(&telemetry),
            Err(BinningError::Channel(DataFormatError::MissingChannel(_)))
        ));
        let binned = RpmBinning::default()
            .channel("time")
            .bin(&telemetry)
            .unwrap();
        assert!(binned.is_empty());
        assert!(matches!(
            binned.channel("rpm"),
            Err(DataFormatError::MissingChannel(_))
        ));
    }

    #[test]
    fn label_buckets() {
        let mut telemetry = telemetry(vec![2000., 3100., 3350.], vec![1., 2., 3.]);
        let binning = RpmBinning::default();
        binning.label_buckets(&mut telemetry).unwrap();
        let labels = telemetry.channel(BUCKET_CHANNEL).unwrap();
        assert!(labels[0].is_nan());
        assert_eq!(&labels[1..], &[3000., 3250.]);
        // the bucket labels are not binned as a channel
        let binned = binning.bin(&telemetry).unwrap();
        assert_eq!(
            binned.channel_names(),
            vec![BUCKET_CHANNEL, "time", "rpm", "torque"]
        );
    }

    #[test]
    fn csv_export() {
        let telemetry = Telemetry::from_columns(vec![
            ("rpm", vec![3100., 3100., 3349., 3350.]),
            ("torque", vec![10., 20., 30., 40.]),
        ])
        .unwrap();
        let binned = RpmBinning::default().bin(&telemetry).unwrap();
        let dir = std::env::temp_dir().join("pu-telemetry-binning");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("binned.csv");
        binned.to_csv(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("rpm_bucket,samples,rpm,torque"));
        assert_eq!(lines.next(), Some("3000,2,3100,15"));
        assert_eq!(lines.next(), Some("3250,2,3349.5,35"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn median_is_order_invariant() {
        let rpm: Vec<f64> = (0..500).map(|i| 3000. + (i * 37 % 13000) as f64).collect();
        let torque: Vec<f64> = (0..500).map(|i| ((i * 7919) % 311) as f64).collect();
        let reference = RpmBinning::default()
            .bin(&telemetry(rpm.clone(), torque.clone()))
            .unwrap();
        let mut rows: Vec<(f64, f64)> = rpm.into_iter().zip(torque).collect();
        rows.shuffle(&mut StdRng::seed_from_u64(42));
        let (rpm, torque): (Vec<f64>, Vec<f64>) = rows.into_iter().unzip();
        let shuffled = RpmBinning::default().bin(&telemetry(rpm, torque)).unwrap();
        assert_eq!(reference.edges(), shuffled.edges());
        assert_eq!(
            reference.channel("torque").unwrap(),
            shuffled.channel("torque").unwrap()
        );
    }

    proptest! {
        /// Property: a sample in the domain lands in exactly the bucket floor((v-lo)/s)
        #[test]
        fn prop_bucket_assignment(
            lo in -1e4f64..1e4,
            width in 1f64..1e4,
            step in 0.5f64..500.,
            t in 0f64..1.
        ) {
            let binning = RpmBinning::new(lo, lo + width, step).unwrap();
            let v = lo + t * width;
            prop_assume!(v < lo + width);
            let bucket = binning.bucket(v).unwrap();
            let expected = ((v - lo) / step).floor() as usize;
            prop_assert_eq!(bucket, expected.min(binning.n_buckets() - 1));
            prop_assert!(binning.lower_edge(bucket) <= v + 1e-9 * step.max(v.abs()));
            prop_assert!(v < binning.lower_edge(bucket) + step + 1e-9 * step.max(v.abs()));
        }

        /// Property: samples outside the domain are never binned
        #[test]
        fn prop_out_of_domain(v in prop_oneof![-1e5f64..3000., 16000f64..1e5]) {
            prop_assert_eq!(RpmBinning::default().bucket(v), None);
        }

        /// Property: bucket edges are strictly increasing and sample counts add up
        #[test]
        fn prop_edges_increasing(rpm in prop::collection::vec(0f64..20000., 1..400)) {
            let in_domain = rpm.iter().filter(|&&x| (3000.0..16000.).contains(&x)).count();
            let torque = vec![1f64; rpm.len()];
            let binned = RpmBinning::default().bin(&telemetry(rpm, torque)).unwrap();
            prop_assert!(binned.edges().windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(binned.samples().iter().sum::<usize>(), in_domain);
            prop_assert!(binned.samples().iter().all(|&n| n > 0));
        }
    }
}
