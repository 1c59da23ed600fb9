#![cfg(not(tarpaulin_include))]
#![cfg(feature = "render")]
use plotters::element::Pie;
use plotters::prelude::*;
use std::error::Error;

use crate::charts::{CategoricalSeries, ChartSeries, ComparativeSeries, Rgba};

/// Size of the rendered charts
#[derive(Clone, Copy, Debug)]
pub struct ChartOptions {
    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// SVG documents for whichever series are present
#[derive(Clone, Debug, Default)]
pub struct RenderedCharts {
    pub pie: Option<String>,
    pub bars: Option<String>,
}

/// Renders both charts of a projection
///
/// # Arguments
/// * `series` - Output of [`crate::charts::project`]
/// * `options` - Chart dimensions
///
/// # Returns
/// * `RenderedCharts` - An absent series yields no document, not an empty chart
pub fn render_charts(
    series: &ChartSeries,
    options: &ChartOptions,
) -> Result<RenderedCharts, Box<dyn Error>> {
    Ok(RenderedCharts {
        pie: series
            .categorical
            .as_ref()
            .map(|s| render_pie(s, options))
            .transpose()?,
        bars: series
            .comparative
            .as_ref()
            .map(|s| render_bars(s, options))
            .transpose()?,
    })
}

fn rgb(color: &Rgba) -> RGBColor {
    RGBColor(color.r, color.g, color.b)
}

fn rgba(color: &Rgba) -> RGBAColor {
    RGBAColor(color.r, color.g, color.b, color.a)
}

/// Pie chart of equipment counts per type
///
/// A distribution whose counts are all zero draws only the title.
pub fn render_pie(
    series: &CategoricalSeries,
    options: &ChartOptions,
) -> Result<String, Box<dyn Error>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(series.title, ("sans-serif", 24))?;

        let sizes: Vec<f64> = series.values.iter().map(|v| *v as f64).collect();
        if sizes.iter().sum::<f64>() > 0.0 {
            let (w, h) = root.dim_in_pixel();
            let center = (w as i32 / 2, h as i32 / 2);
            let radius = f64::from(w.min(h)) * 0.35;
            let colors: Vec<RGBColor> = series.fill.iter().map(rgb).collect();

            let mut pie = Pie::new(&center, &radius, &sizes, &colors, &series.labels);
            pie.label_style(("sans-serif", 16).into_font().color(&BLACK));
            pie.percentages(("sans-serif", radius * 0.08).into_font().color(&WHITE));
            root.draw(&pie)?;
        }

        root.present()?;
    }

    Ok(svg)
}

/// Bar chart of the three averages
pub fn render_bars(
    series: &ComparativeSeries,
    options: &ChartOptions,
) -> Result<String, Box<dyn Error>> {
    let highest = series.values.iter().copied().fold(0.0_f64, f64::max);
    let lowest = series.values.iter().copied().fold(0.0_f64, f64::min);
    let top = if highest > 0.0 { highest * 1.1 } else { 1.0 };
    let bottom = lowest * 1.1;

    let labels = series.labels;
    let label_at = |x: &f64| {
        let slot = x.round();
        if (x - slot).abs() > 1e-6 || slot < 0.0 {
            return String::new();
        }
        labels
            .get(slot as usize)
            .map(|l| l.to_string())
            .unwrap_or_default()
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(series.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(-0.5_f64..2.5_f64, bottom..top)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(3)
            .x_label_formatter(&label_at)
            .draw()?;

        let fill = rgba(&series.fill);
        let border = rgb(&series.border);
        chart.draw_series(series.values.iter().enumerate().map(|(i, v)| {
            let x = i as f64;
            Rectangle::new([(x - 0.35, 0.0), (x + 0.35, *v)], fill.filled())
        }))?;
        chart.draw_series(series.values.iter().enumerate().map(|(i, v)| {
            let x = i as f64;
            Rectangle::new([(x - 0.35, 0.0), (x + 0.35, *v)], border.stroke_width(2))
        }))?;

        root.present()?;
    }

    Ok(svg)
}
