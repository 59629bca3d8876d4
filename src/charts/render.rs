use super::{Chart, ChartError, ChartSpec, Series, XAxis};
use crate::{
    binning::BinnedTable,
    telemetry::{Channels, DataFormatError, Telemetry},
    Error,
};
use indicatif::ProgressBar;
use itertools::{Itertools, MinMaxResult};
use plotters::prelude::*;
use std::{
    error::Error as StdError,
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

/// A plotted line
struct Trace {
    label: &'static str,
    rgb: RGBColor,
    points: Vec<(f64, f64)>,
}

/// Resolved chart data
struct Plot {
    left: Vec<Trace>,
    right: Vec<Trace>,
    x_range: Range<f64>,
    y_range: Range<f64>,
    y2_range: Range<f64>,
}

fn traces<'a, I>(
    series: &[Series],
    x: &[f64],
    data: &dyn Channels,
    colors: &mut I,
) -> Result<Vec<Trace>, DataFormatError>
where
    I: Iterator<Item = &'a colorous::Color>,
{
    series
        .iter()
        .map(|s| {
            let y = data.channel(s.channel)?;
            let rgb = colors
                .next()
                .map_or(BLACK, |color| RGBColor(color.r, color.g, color.b));
            let points = x
                .iter()
                .zip(y)
                .map(|(&x, &y)| (x, s.unit.apply(y)))
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .collect();
            Ok(Trace {
                label: s.label,
                rgb,
                points,
            })
        })
        .collect()
}

/// Axis range padded by 5%, a flat range is widened by ±1
fn padded_range<I: Iterator<Item = f64>>(values: I) -> Option<Range<f64>> {
    match values.filter(|x| x.is_finite()).minmax() {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(x) => Some(x - 1f64..x + 1f64),
        MinMaxResult::MinMax(lo, hi) if hi - lo <= f64::EPSILON * hi.abs().max(1f64) => {
            Some(lo - 1f64..hi + 1f64)
        }
        MinMaxResult::MinMax(lo, hi) => {
            let padding = 0.05 * (hi - lo);
            Some(lo - padding..hi + padding)
        }
    }
}

/// Plotting context
///
/// Owns the output directory and the canvas geometry, there is no global figure state.
#[derive(Debug, Clone)]
pub struct Figure {
    output: PathBuf,
    /// canvas size [inch]
    size: (f64, f64),
    dpi: u32,
}
impl Default for Figure {
    fn default() -> Self {
        Self {
            output: PathBuf::from("data"),
            size: (6.4, 4.8),
            dpi: 150,
        }
    }
}
impl Figure {
    /// Creates a figure writing the charts into `output`
    pub fn new<P: Into<PathBuf>>(output: P) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }
    pub fn dpi(self, dpi: u32) -> Self {
        Self { dpi, ..self }
    }
    /// Canvas size in inches
    pub fn inches(self, width: f64, height: f64) -> Self {
        Self {
            size: (width, height),
            ..self
        }
    }
    /// Canvas size in pixels
    pub fn pixels(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        (
            (self.size.0 * dpi).round() as u32,
            (self.size.1 * dpi).round() as u32,
        )
    }
    /// Typographic points to pixels
    fn px(&self, points: f64) -> u32 {
        (points * self.dpi as f64 / 72f64).round() as u32
    }
    /// Path of the chart image
    pub fn path(&self, chart: Chart) -> PathBuf {
        self.output.join(chart.spec().filename())
    }
    fn resolve(
        &self,
        spec: &ChartSpec,
        raw: &Telemetry,
        binned: &BinnedTable,
    ) -> Result<Plot, ChartError> {
        let data: &dyn Channels = match spec.x {
            XAxis::Time => raw,
            XAxis::Rpm => binned,
        };
        spec.check(data)?;
        let data_err = |e| ChartError::Data(spec.chart, e);
        let x = data.channel(spec.x.channel()).map_err(data_err)?;
        let mut colors = colorous::TABLEAU10.iter().cycle();
        let left = traces(&spec.left.series, x, data, &mut colors).map_err(data_err)?;
        let right = match &spec.right {
            Some(axis) => traces(&axis.series, x, data, &mut colors).map_err(data_err)?,
            None => vec![],
        };

        let x_range = padded_range(
            left.iter()
                .chain(&right)
                .flat_map(|trace| trace.points.iter().map(|(x, _)| *x)),
        )
        .ok_or(ChartError::NoData(spec.chart))?;
        let y_range = padded_range(
            left.iter()
                .flat_map(|trace| trace.points.iter().map(|(_, y)| *y))
                .chain(spec.thresholds.iter().map(|t| t.value)),
        )
        .unwrap_or(0f64..1f64);
        let y2_range = padded_range(
            right
                .iter()
                .flat_map(|trace| trace.points.iter().map(|(_, y)| *y)),
        )
        .unwrap_or_else(|| y_range.clone());
        Ok(Plot {
            left,
            right,
            x_range,
            y_range,
            y2_range,
        })
    }
    fn draw(&self, path: &Path, spec: &ChartSpec, plot: &Plot) -> Result<(), Box<dyn StdError>> {
        let root = BitMapBackend::new(path, self.pixels()).into_drawing_area();
        root.fill(&WHITE)?;

        let font = self.px(10f64) as f64;
        let mut chart = ChartBuilder::on(&root)
            .caption(spec.title, ("sans-serif", self.px(14f64) as f64))
            .set_label_area_size(LabelAreaPosition::Left, self.px(45f64))
            .set_label_area_size(LabelAreaPosition::Bottom, self.px(30f64))
            .set_label_area_size(
                LabelAreaPosition::Right,
                if spec.right.is_some() {
                    self.px(45f64)
                } else {
                    self.px(10f64)
                },
            )
            .margin(self.px(5f64))
            .build_cartesian_2d(plot.x_range.clone(), plot.y_range.clone())?
            .set_secondary_coord(plot.x_range.clone(), plot.y2_range.clone());
        chart
            .configure_mesh()
            .x_desc(spec.x.label())
            .y_desc(spec.left.label)
            .label_style(("sans-serif", font))
            .axis_desc_style(("sans-serif", font))
            .draw()?;
        if let Some(right) = &spec.right {
            chart
                .configure_secondary_axes()
                .y_desc(right.label)
                .label_style(("sans-serif", font))
                .axis_desc_style(("sans-serif", font))
                .draw()?;
        }

        for trace in &plot.left {
            let rgb = trace.rgb;
            chart
                .draw_series(LineSeries::new(trace.points.iter().copied(), &rgb))?
                .label(trace.label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &rgb));
        }
        for trace in &plot.right {
            let rgb = trace.rgb;
            chart
                .draw_secondary_series(LineSeries::new(trace.points.iter().copied(), &rgb))?
                .label(trace.label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &rgb));
        }
        for threshold in &spec.thresholds {
            let red = RED.mix(0.8);
            chart
                .draw_series(LineSeries::new(
                    vec![
                        (plot.x_range.start, threshold.value),
                        (plot.x_range.end, threshold.value),
                    ],
                    &red,
                ))?
                .label(threshold.label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &red));
        }

        chart
            .configure_series_labels()
            .border_style(&BLACK)
            .background_style(&WHITE.mix(0.8))
            .label_font(("sans-serif", font))
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
        root.present()?;
        Ok(())
    }
    /// Renders a chart
    ///
    /// The data are resolved before the image is created so a missing channel
    /// doesn't leave a partial file behind.
    pub fn render(
        &self,
        spec: &ChartSpec,
        raw: &Telemetry,
        binned: &BinnedTable,
    ) -> Result<PathBuf, ChartError> {
        let plot = self.resolve(spec, raw, binned)?;
        fs::create_dir_all(&self.output)
            .map_err(|e| ChartError::Draw(spec.chart, e.to_string()))?;
        let path = self.output.join(spec.filename());
        self.draw(&path, spec, &plot)
            .map_err(|e| ChartError::Draw(spec.chart, e.to_string()))?;
        log::info!("chart saved: {:?}", path);
        Ok(path)
    }
    /// Renders the charts in order
    ///
    /// Stops at the first failure unless `keep_going` is set, in which case the
    /// failures are logged and counted in [Error::ChartsFailed].
    pub fn render_all(
        &self,
        charts: &[Chart],
        raw: &Telemetry,
        binned: &BinnedTable,
        keep_going: bool,
    ) -> Result<Vec<PathBuf>, Error> {
        let pb = ProgressBar::new(charts.len() as u64);
        let mut saved = vec![];
        let mut failed = 0usize;
        for chart in charts {
            pb.set_message(chart.to_string());
            match self.render(&chart.spec(), raw, binned) {
                Ok(path) => saved.push(path),
                Err(e) if keep_going => {
                    match e.source() {
                        Some(source) => log::error!("{e}: {source}"),
                        None => log::error!("{e}"),
                    }
                    failed += 1;
                }
                Err(e) => {
                    pb.abandon();
                    return Err(e.into());
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        if failed > 0 {
            Err(Error::ChartsFailed(failed))
        } else {
            Ok(saved)
        }
    }
}
