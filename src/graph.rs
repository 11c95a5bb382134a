#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use crate::dashboard::{ChartKind, Dashboard, GraphType};
use crate::error::{DashboardError, Result};
use crate::metrics::{AggregatedView, Dimension, Indicator, KeyValue};
use plotters::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

type DrawResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Configuration options for graph generation
///
/// This structure contains all the customizable properties for drawing an
/// aggregated view.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the graph
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the graph in pixels
    pub width: u32,

    /// Height of the graph in pixels
    pub height: u32,

    /// Type of graph to generate
    pub graph_type: GraphType,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: "Graph".to_string(),
            x_label: "X Axis".to_string(),
            y_label: "Y Axis".to_string(),
            width: 800,
            height: 600,
            graph_type: GraphType::Line,
        }
    }
}

impl GraphOptions {
    /// Options for one of the dashboard's widgets, plotting `indicator`.
    pub fn for_chart(chart: ChartKind, indicator: Indicator) -> Self {
        let x_dimension = match chart {
            ChartKind::TimeSeries | ChartKind::CampaignSeries | ChartKind::AdSetSeries => {
                Dimension::Day
            }
            ChartKind::CampaignTotals => Dimension::Campaign,
            ChartKind::AdSetTotals => Dimension::AdSet,
            ChartKind::Age | ChartKind::AgeGender => Dimension::Age,
            ChartKind::Gender => Dimension::Gender,
        };
        let y_label = match chart {
            ChartKind::AgeGender => Dimension::Gender.label().to_string(),
            _ => indicator.label().to_string(),
        };

        Self {
            title: chart.title(indicator),
            x_label: x_dimension.label().to_string(),
            y_label,
            graph_type: chart.graph_type(),
            ..Self::default()
        }
    }
}

/// Draw an aggregated view as an SVG document
///
/// The value axis plots `indicator`; rows where it is not finite (zero
/// denominators) are left out of the drawing.
///
/// # Arguments
/// * `view` - Aggregated data; the first grouping dimension is the x axis
/// * `indicator` - Metric to plot
/// * `options` - Graph styling and type options
///
/// # Returns
/// * `Result<String>` - The SVG markup
pub fn create_graph(
    view: &AggregatedView,
    indicator: Indicator,
    options: &GraphOptions,
) -> Result<String> {
    let drawn = match options.graph_type {
        GraphType::Line => create_line_graph(view, indicator, options),
        GraphType::Bar => create_bar_graph(view, indicator, options),
        GraphType::HeatMap => create_heat_map(view, indicator, options),
    };
    drawn.map_err(|e| DashboardError::Render(e.to_string()))
}

/// Draw one of the dashboard's charts. `None` when the chart's dataset is
/// absent (audience charts without audience columns).
pub fn render_chart(dashboard: &Dashboard, chart: ChartKind) -> Result<Option<String>> {
    let Some(view) = dashboard.dataset(chart) else {
        return Ok(None);
    };
    let options = GraphOptions::for_chart(chart, dashboard.indicator);
    create_graph(view, dashboard.indicator, &options).map(Some)
}

/// Distinct values of key component `position`, in key order.
fn categories(view: &AggregatedView, position: usize) -> Vec<&KeyValue> {
    view.rows
        .iter()
        .filter_map(|row| row.key.get(position))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Label for a tick at `x`, blank between categories.
fn category_label(labels: &[String], x: f64) -> String {
    let index = x.round();
    if (x - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

/// Axis bounds covering zero and every value, with a little headroom.
fn value_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max > min {
        (min, max + (max - min) * 0.05)
    } else {
        (min, min + 1.0)
    }
}

/// Line graph with the first key component (the day) on the x axis and one
/// series per value of the second key component, if any.
fn create_line_graph(
    view: &AggregatedView,
    indicator: Indicator,
    options: &GraphOptions,
) -> DrawResult<String> {
    let days = categories(view, 0);
    let position: BTreeMap<&KeyValue, usize> =
        days.iter().enumerate().map(|(i, day)| (*day, i)).collect();
    let labels: Vec<String> = days.iter().map(|day| day.to_string()).collect();

    let mut series: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    for row in &view.rows {
        let value = row.value(indicator);
        let Some(x) = row.key.first().and_then(|day| position.get(day)) else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }
        let name = row
            .key
            .get(1)
            .map(|k| k.to_string())
            .unwrap_or_else(|| indicator.label().to_string());
        series.entry(name).or_default().push((*x as f64, value));
    }

    let (y_min, y_max) = value_bounds(series.values().flatten().map(|(_, y)| *y));
    let x_max = (labels.len().max(2) - 1) as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..x_max, y_min..y_max)?;

        let x_formatter = |x: &f64| category_label(&labels, *x);
        chart
            .configure_mesh()
            .x_labels(labels.len().clamp(2, 12))
            .x_label_formatter(&x_formatter)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        for (i, points) in series.values().enumerate() {
            let color = Palette99::pick(i);
            chart.draw_series(LineSeries::new(
                points.iter().copied(),
                color.stroke_width(2),
            ))?;
            chart.draw_series(
                points
                    .iter()
                    .map(|&point| Circle::new(point, 3, color.filled())),
            )?;
        }

        root.present()?;
    }

    Ok(svg)
}

/// Bar graph with one bar per value of the first key component.
fn create_bar_graph(
    view: &AggregatedView,
    indicator: Indicator,
    options: &GraphOptions,
) -> DrawResult<String> {
    let bars: Vec<(String, f64)> = view
        .rows
        .iter()
        .filter_map(|row| Some((row.key.first()?.to_string(), row.value(indicator))))
        .collect();
    let labels: Vec<String> = bars.iter().map(|(label, _)| label.clone()).collect();

    let (y_min, y_max) = value_bounds(
        bars.iter()
            .map(|(_, value)| *value)
            .filter(|value| value.is_finite()),
    );
    let x_max = bars.len().max(1) as f64 - 0.5;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5f64..x_max, y_min..y_max)?;

        let x_formatter = |x: &f64| category_label(&labels, *x);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len().max(1))
            .x_label_formatter(&x_formatter)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(
            bars.iter()
                .enumerate()
                .filter(|(_, (_, value))| value.is_finite())
                .map(|(i, (_, value))| {
                    let x = i as f64;
                    Rectangle::new(
                        [(x - 0.4, 0.0), (x + 0.4, *value)],
                        Palette99::pick(i).filled(),
                    )
                }),
        )?;

        root.present()?;
    }

    Ok(svg)
}

/// Heat map with the first key component on the x axis, the second on the
/// y axis, and cell colour scaled by value.
fn create_heat_map(
    view: &AggregatedView,
    indicator: Indicator,
    options: &GraphOptions,
) -> DrawResult<String> {
    let xs = categories(view, 0);
    let ys = categories(view, 1);
    let x_pos: BTreeMap<&KeyValue, usize> = xs.iter().enumerate().map(|(i, k)| (*k, i)).collect();
    let y_pos: BTreeMap<&KeyValue, usize> = ys.iter().enumerate().map(|(i, k)| (*k, i)).collect();
    let x_labels: Vec<String> = xs.iter().map(|k| k.to_string()).collect();
    let y_labels: Vec<String> = ys.iter().map(|k| k.to_string()).collect();

    let cells: Vec<(f64, f64, f64)> = view
        .rows
        .iter()
        .filter_map(|row| {
            let x = x_pos.get(row.key.first()?)?;
            let y = y_pos.get(row.key.get(1)?)?;
            Some((*x as f64, *y as f64, row.value(indicator)))
        })
        .collect();

    let finite = cells.iter().map(|c| c.2).filter(|v| v.is_finite());
    let lo = finite.clone().fold(f64::INFINITY, f64::min);
    let hi = finite.fold(f64::NEG_INFINITY, f64::max);
    let shade = |value: f64| -> RGBColor {
        if !value.is_finite() {
            return RGBColor(220, 220, 220);
        }
        let t = if hi > lo { (value - lo) / (hi - lo) } else { 1.0 };
        RGBColor(
            (255.0 - t * 200.0) as u8,
            (245.0 - t * 150.0) as u8,
            (235.0 - t * 60.0) as u8,
        )
    };

    let x_max = xs.len().max(1) as f64 - 0.5;
    let y_max = ys.len().max(1) as f64 - 0.5;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(-0.5f64..x_max, -0.5f64..y_max)?;

        let x_formatter = |x: &f64| category_label(&x_labels, *x);
        let y_formatter = |y: &f64| category_label(&y_labels, *y);
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(x_labels.len().max(1))
            .y_labels(y_labels.len().max(1))
            .x_label_formatter(&x_formatter)
            .y_label_formatter(&y_formatter)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(cells.iter().map(|&(x, y, value)| {
            Rectangle::new(
                [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                shade(value).filled(),
            )
        }))?;

        chart.draw_series(
            cells
                .iter()
                .filter(|(_, _, value)| value.is_finite())
                .map(|&(x, y, value)| {
                    Text::new(
                        format!("{:.2}", value),
                        (x - 0.2, y),
                        ("sans-serif", 14).into_font(),
                    )
                }),
        )?;

        root.present()?;
    }

    Ok(svg)
}
