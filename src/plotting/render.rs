//! SVG rendering of trajectory charts via plotters

use crate::errors::{Result, SynthError};
use crate::plotting::chart::{ChartContent, Series, TrajectoryChart};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::fmt::Display;
use std::fs;
use std::path::Path;

/// Default canvas size in pixels
pub const DEFAULT_SIZE: (u32, u32) = (720, 480);

fn plot_err<E: Display>(e: E) -> SynthError {
    SynthError::Plot(e.to_string())
}

/// Axis ranges covering every band, padded so flat data still has extent
fn bounds(series: &[Series]) -> Option<((f64, f64), (f64, f64))> {
    let points = series.iter().flat_map(|s| s.points.iter());
    let (mut x0, mut x1, mut y0, mut y1) = (
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
    );
    for p in points {
        x0 = x0.min(p.x);
        x1 = x1.max(p.x);
        y0 = y0.min(p.lower);
        y1 = y1.max(p.upper);
    }
    if !x0.is_finite() || !y0.is_finite() {
        return None;
    }
    if x1 - x0 < f64::EPSILON {
        x0 -= 0.5;
        x1 += 0.5;
    }
    let pad = if y1 - y0 < f64::EPSILON { 1.0 } else { (y1 - y0) * 0.05 };
    Some(((x0, x1), (y0 - pad, y1 + pad)))
}

impl TrajectoryChart {
    /// Render to an SVG document
    pub fn render_svg(&self, size: (u32, u32)) -> Result<String> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
            root.fill(&WHITE).map_err(plot_err)?;

            let ranges = match &self.content {
                ChartContent::Lines(series) => bounds(series).map(|r| (series, r)),
                ChartContent::Placeholder(_) => None,
            };

            match ranges {
                Some((series, ((x0, x1), (y0, y1)))) => {
                    let mut chart = ChartBuilder::on(&root)
                        .caption(&self.title, ("sans-serif", 22))
                        .margin(12)
                        .x_label_area_size(40)
                        .y_label_area_size(56)
                        .build_cartesian_2d(x0..x1, y0..y1)
                        .map_err(plot_err)?;

                    chart
                        .configure_mesh()
                        .x_desc(self.x_label.as_str())
                        .y_desc(self.y_label.as_str())
                        .draw()
                        .map_err(plot_err)?;

                    for (i, s) in series.iter().enumerate() {
                        let color = Palette99::pick(i).to_rgba();

                        let mut band: Vec<(f64, f64)> =
                            s.points.iter().map(|p| (p.x, p.upper)).collect();
                        band.extend(s.points.iter().rev().map(|p| (p.x, p.lower)));
                        chart
                            .draw_series(std::iter::once(Polygon::new(
                                band,
                                color.mix(0.2).filled(),
                            )))
                            .map_err(plot_err)?;

                        chart
                            .draw_series(LineSeries::new(
                                s.points.iter().map(|p| (p.x, p.mean)),
                                color.stroke_width(2),
                            ))
                            .map_err(plot_err)?
                            .label(s.label.as_str())
                            .legend(move |(x, y)| {
                                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                            });
                    }

                    chart
                        .configure_series_labels()
                        .background_style(WHITE.mix(0.8))
                        .border_style(BLACK)
                        .draw()
                        .map_err(plot_err)?;
                }
                None => {
                    let message = match &self.content {
                        ChartContent::Placeholder(message) => message.as_str(),
                        ChartContent::Lines(_) => "no data",
                    };
                    let style = TextStyle::from(("sans-serif", 22).into_font())
                        .pos(Pos::new(HPos::Center, VPos::Center));
                    root.draw(&Text::new(
                        message.to_string(),
                        (size.0 as i32 / 2, size.1 as i32 / 2),
                        style,
                    ))
                    .map_err(plot_err)?;
                }
            }

            root.present().map_err(plot_err)?;
        }
        Ok(svg)
    }

    /// Render and write to `path`
    pub fn save_svg(&self, path: &Path) -> Result<()> {
        let svg = self.render_svg(DEFAULT_SIZE)?;
        fs::write(path, svg)?;
        Ok(())
    }
}
