//! Multi-series line charts over dates.

use super::plotly;
use super::svg::{Anchor, Svg, INK, MUTED, PALETTE};
use super::RenderError;
use crate::analysis::LineSeries;
use chrono::NaiveDate;
use serde_json::{json, Value};

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 520.0;
const LEFT: f64 = 70.0;
const RIGHT: f64 = 150.0;
const TOP: f64 = 60.0;
const BOTTOM: f64 = 60.0;
const Y_TICKS: usize = 5;

/// Titles and axis labels for one chart.
#[derive(Debug, Clone, Copy)]
pub struct ChartText<'a> {
    pub title: &'a str,
    pub y_label: &'a str,
    pub empty: &'a str,
}

pub const CURRENCY_TRENDS: ChartText<'static> = ChartText {
    title: "Currency closes vs USD (rebased to 100)",
    y_label: "Index (first close = 100)",
    empty: "No currency data yet",
};

pub const EVENT_TRENDS: ChartText<'static> = ChartText {
    title: "Monthly event volume (top event types)",
    y_label: "Events per month",
    empty: "No event data yet",
};

fn bounds(series: &[LineSeries]) -> Option<((NaiveDate, NaiveDate), (f64, f64))> {
    let points = series.iter().flat_map(|s| s.points.iter());
    let mut dates: Option<(NaiveDate, NaiveDate)> = None;
    let mut values: Option<(f64, f64)> = None;
    for (d, v) in points {
        dates = Some(match dates {
            Some((lo, hi)) => (lo.min(*d), hi.max(*d)),
            None => (*d, *d),
        });
        if v.is_finite() {
            values = Some(match values {
                Some((lo, hi)) => (lo.min(*v), hi.max(*v)),
                None => (*v, *v),
            });
        }
    }
    Some((dates?, values?))
}

pub fn line_chart_svg(series: &[LineSeries], text: ChartText<'_>) -> String {
    let mut svg = Svg::new(WIDTH, HEIGHT);
    svg.text(WIDTH / 2.0, 32.0, text.title, 18.0, Anchor::Middle, INK);

    let Some(((d0, d1), (mut lo, mut hi))) = bounds(series) else {
        svg.placeholder(text.empty);
        return svg.finish();
    };
    if hi - lo < f64::EPSILON {
        lo -= 1.0;
        hi += 1.0;
    }
    let plot_w = WIDTH - LEFT - RIGHT;
    let plot_h = HEIGHT - TOP - BOTTOM;
    let span_days = (d1 - d0).num_days().max(1) as f64;
    let x_of = |d: NaiveDate| LEFT + (d - d0).num_days() as f64 / span_days * plot_w;
    let y_of = |v: f64| TOP + (hi - v) / (hi - lo) * plot_h;

    // Axes and gridlines
    svg.line(LEFT, TOP + plot_h, LEFT + plot_w, TOP + plot_h, MUTED, 1.0);
    svg.line(LEFT, TOP, LEFT, TOP + plot_h, MUTED, 1.0);
    for tick in 0..=Y_TICKS {
        let v = lo + (hi - lo) * tick as f64 / Y_TICKS as f64;
        let y = y_of(v);
        svg.line(LEFT, y, LEFT + plot_w, y, "#eeeeee", 1.0);
        svg.text(LEFT - 6.0, y + 4.0, &format!("{v:.1}"), 11.0, Anchor::End, MUTED);
    }
    svg.text(LEFT, TOP + plot_h + 20.0, &d0.to_string(), 11.0, Anchor::Start, MUTED);
    svg.text(LEFT + plot_w, TOP + plot_h + 20.0, &d1.to_string(), 11.0, Anchor::End, MUTED);
    svg.vertical_text(18.0, TOP + plot_h / 2.0, text.y_label, 12.0, MUTED);

    for (i, line) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let points: Vec<(f64, f64)> = line
            .points
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(d, v)| (x_of(*d), y_of(*v)))
            .collect();
        svg.polyline(&points, color, 1.5);

        let legend_y = TOP + 10.0 + i as f64 * 18.0;
        let legend_x = LEFT + plot_w + 16.0;
        svg.line(legend_x, legend_y, legend_x + 18.0, legend_y, color, 3.0);
        svg.text(legend_x + 24.0, legend_y + 4.0, &line.name, 12.0, Anchor::Start, INK);
    }
    svg.finish()
}

pub fn line_chart_figure(series: &[LineSeries], text: ChartText<'_>) -> Value {
    let traces: Vec<Value> = series
        .iter()
        .map(|line| {
            let x: Vec<String> = line.points.iter().map(|(d, _)| d.to_string()).collect();
            let y: Vec<f64> = line.points.iter().map(|(_, v)| *v).collect();
            json!({
                "type": "scatter",
                "mode": "lines",
                "name": line.name,
                "x": x,
                "y": y,
            })
        })
        .collect();
    let mut layout = plotly::layout(text.title);
    layout["xaxis"] = json!({ "type": "date" });
    layout["yaxis"] = json!({ "title": { "text": text.y_label } });
    layout["hovermode"] = json!("x unified");

    json!({ "data": traces, "layout": layout })
}

pub fn line_chart_html(series: &[LineSeries], text: ChartText<'_>) -> Result<String, RenderError> {
    plotly::html_page(text.title, &line_chart_figure(series, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, 1).unwrap()
    }

    fn lines() -> Vec<LineSeries> {
        vec![
            LineSeries {
                name: "EUR".into(),
                points: vec![(d(1), 100.0), (d(2), 102.5), (d(3), 99.0)],
            },
            LineSeries {
                name: "JPY".into(),
                points: vec![(d(1), 100.0), (d(3), 110.0)],
            },
        ]
    }

    #[test]
    fn draws_one_polyline_per_series_with_legend() {
        let svg = line_chart_svg(&lines(), CURRENCY_TRENDS);
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains(">EUR</text>"));
        assert!(svg.contains(">2024-01-01</text>"));
        assert!(svg.contains(">2024-03-01</text>"));
        assert!(svg.contains(">110.0</text>"));
    }

    #[test]
    fn empty_series_is_a_placeholder() {
        let svg = line_chart_svg(&[], EVENT_TRENDS);
        assert!(svg.contains("No event data yet"));
        assert!(!svg.contains("<polyline"));
    }

    #[test]
    fn flat_series_still_renders() {
        let flat = vec![LineSeries {
            name: "KILL".into(),
            points: vec![(d(1), 5.0), (d(2), 5.0)],
        }];
        let svg = line_chart_svg(&flat, EVENT_TRENDS);
        assert!(svg.contains("<polyline"));
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn figure_has_scatter_traces() {
        let fig = line_chart_figure(&lines(), CURRENCY_TRENDS);
        let data = fig["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[1]["name"], "JPY");
        assert_eq!(data[1]["x"][1], "2024-03-01");
        assert_eq!(fig["layout"]["xaxis"]["type"], "date");
    }
}
