//! Event-impact treemap: squarified layout grouped by impact, area ∝ |coef|.
//!
//! When the regression is unfitted or every coefficient is zero, the map shows
//! event frequency instead.

use super::plotly;
use super::svg::{Anchor, Svg, GREEN, GREY, INK, RED};
use super::RenderError;
use crate::analysis::{Impact, RegressionResult};
use serde_json::{json, Value};

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 640.0;
const TOP: f64 = 56.0;
const PAD: f64 = 8.0;
const HEADER: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Squarified treemap layout (Bruls, Huizing, van Wijk).
///
/// `values` must be positive and sorted descending; returns one rectangle per
/// value, in the same order, tiling `bounds`.
pub fn squarify(values: &[f64], bounds: Rect) -> Vec<Rect> {
    let total: f64 = values.iter().sum();
    if values.is_empty() || total <= 0.0 || bounds.w <= 0.0 || bounds.h <= 0.0 {
        return Vec::new();
    }
    let scale = bounds.w * bounds.h / total;
    let areas: Vec<f64> = values.iter().map(|v| v * scale).collect();

    let mut out = Vec::with_capacity(areas.len());
    let mut free = bounds;
    let mut start = 0;
    while start < areas.len() {
        let side = free.w.min(free.h);
        let mut end = start + 1;
        while end < areas.len()
            && worst(&areas[start..=end], side) <= worst(&areas[start..end], side)
        {
            end += 1;
        }

        let row = &areas[start..end];
        let row_sum: f64 = row.iter().sum();
        if free.w >= free.h {
            // Column along the left edge
            let col_w = if free.h > 0.0 { row_sum / free.h } else { 0.0 };
            let mut y = free.y;
            for a in row {
                let h = if col_w > 0.0 { a / col_w } else { 0.0 };
                out.push(Rect { x: free.x, y, w: col_w, h });
                y += h;
            }
            free.x += col_w;
            free.w = (free.w - col_w).max(0.0);
        } else {
            // Row along the top edge
            let row_h = if free.w > 0.0 { row_sum / free.w } else { 0.0 };
            let mut x = free.x;
            for a in row {
                let w = if row_h > 0.0 { a / row_h } else { 0.0 };
                out.push(Rect { x, y: free.y, w, h: row_h });
                x += w;
            }
            free.y += row_h;
            free.h = (free.h - row_h).max(0.0);
        }
        start = end;
    }
    out
}

/// Worst aspect ratio of a row laid along a side of length `side`.
fn worst(row: &[f64], side: f64) -> f64 {
    let sum: f64 = row.iter().sum();
    if sum <= 0.0 || side <= 0.0 {
        return f64::INFINITY;
    }
    let max = row.iter().copied().fold(f64::MIN, f64::max);
    let min = row.iter().copied().fold(f64::MAX, f64::min);
    let s2 = side * side;
    let sum2 = sum * sum;
    (s2 * max / sum2).max(sum2 / (s2 * min))
}

fn impact_color(impact: Impact) -> &'static str {
    match impact {
        Impact::Weaken => RED,
        Impact::Strengthen => GREEN,
        Impact::Neutral => GREY,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Leaf {
    label: String,
    value: f64,
    detail: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Group {
    label: String,
    color: &'static str,
    leaves: Vec<Leaf>,
}

impl Group {
    fn total(&self) -> f64 {
        self.leaves.iter().map(|l| l.value).sum()
    }
}

/// Title plus groups, largest first.
///
/// Without usable coefficients the tiles are the stored event totals.
fn build_groups(
    regression: &RegressionResult,
    event_totals: &[(String, u64)],
    top_n: usize,
) -> (String, Vec<Group>) {
    let ranked: Vec<_> = regression
        .ranked()
        .into_iter()
        .filter(|i| i.coef != 0.0 && i.coef.is_finite())
        .take(top_n)
        .collect();

    if regression.fitted && !ranked.is_empty() {
        let mut groups: Vec<Group> = [Impact::Weaken, Impact::Strengthen]
            .into_iter()
            .map(|impact| Group {
                label: impact.label().to_string(),
                color: impact_color(impact),
                leaves: ranked
                    .iter()
                    .filter(|i| i.impact == impact)
                    .map(|i| Leaf {
                        label: i.event_type.clone(),
                        value: i.coef.abs(),
                        detail: format!("{} | coef {:+.6}", impact.label(), i.coef),
                    })
                    .collect(),
            })
            .filter(|g| !g.leaves.is_empty())
            .collect();
        groups.sort_by(|a, b| b.total().total_cmp(&a.total()));
        return (
            "Event types sized by OLS coefficient magnitude (impact on USD strength)".into(),
            groups,
        );
    }

    let leaves: Vec<Leaf> = event_totals
        .iter()
        .filter(|(_, count)| *count > 0)
        .take(top_n)
        .map(|(event_type, count)| Leaf {
            label: event_type.clone(),
            value: *count as f64,
            detail: format!("count {count}"),
        })
        .collect();
    let groups = if leaves.is_empty() {
        Vec::new()
    } else {
        vec![Group {
            label: "Events".into(),
            color: GREY,
            leaves,
        }]
    };
    ("Event frequency (fallback)".into(), groups)
}

pub fn treemap_svg(
    regression: &RegressionResult,
    event_totals: &[(String, u64)],
    top_n: usize,
) -> String {
    let (title, groups) = build_groups(regression, event_totals, top_n);
    let mut svg = Svg::new(WIDTH, HEIGHT);
    svg.text(WIDTH / 2.0, 32.0, &title, 18.0, Anchor::Middle, INK);

    if groups.is_empty() {
        svg.placeholder("No event data yet");
        return svg.finish();
    }

    let totals: Vec<f64> = groups.iter().map(Group::total).collect();
    let outer = Rect {
        x: PAD,
        y: TOP,
        w: WIDTH - 2.0 * PAD,
        h: HEIGHT - TOP - PAD,
    };
    for (group, area) in groups.iter().zip(squarify(&totals, outer)) {
        svg.rect(area.x, area.y, area.w, area.h, "#f4f4f4", None);
        svg.text(area.x + 6.0, area.y + 15.0, &group.label, 13.0, Anchor::Start, INK);

        let inner = Rect {
            x: area.x + 2.0,
            y: area.y + HEADER,
            w: (area.w - 4.0).max(0.0),
            h: (area.h - HEADER - 2.0).max(0.0),
        };
        let values: Vec<f64> = group.leaves.iter().map(|l| l.value).collect();
        for (leaf, tile) in group.leaves.iter().zip(squarify(&values, inner)) {
            let tooltip = format!("{}: {}", leaf.label, leaf.detail);
            svg.rect(tile.x, tile.y, tile.w, tile.h, group.color, Some(&tooltip));
            if tile.w > 64.0 && tile.h > 22.0 {
                svg.text(
                    tile.x + tile.w / 2.0,
                    tile.y + tile.h / 2.0 + 4.0,
                    &leaf.label,
                    12.0,
                    Anchor::Middle,
                    "#ffffff",
                );
            }
        }
    }
    svg.finish()
}

pub fn treemap_figure(
    regression: &RegressionResult,
    event_totals: &[(String, u64)],
    top_n: usize,
) -> Value {
    let (title, groups) = build_groups(regression, event_totals, top_n);

    let mut ids = Vec::new();
    let mut labels = Vec::new();
    let mut parents = Vec::new();
    let mut values = Vec::new();
    let mut colors = Vec::new();
    let mut text = Vec::new();
    for group in &groups {
        ids.push(group.label.clone());
        labels.push(group.label.clone());
        parents.push(String::new());
        values.push(group.total());
        colors.push(group.color);
        text.push(String::new());
        for leaf in &group.leaves {
            ids.push(format!("{}/{}", group.label, leaf.label));
            labels.push(leaf.label.clone());
            parents.push(group.label.clone());
            values.push(leaf.value);
            colors.push(group.color);
            text.push(leaf.detail.clone());
        }
    }

    json!({
        "data": [{
            "type": "treemap",
            "ids": ids,
            "labels": labels,
            "parents": parents,
            "values": values,
            "text": text,
            "branchvalues": "total",
            "marker": { "colors": colors },
            "hovertemplate": "<b>%{label}</b><br>%{text}<extra></extra>",
        }],
        "layout": plotly::layout(&title),
    })
}

pub fn treemap_html(
    regression: &RegressionResult,
    event_totals: &[(String, u64)],
    top_n: usize,
) -> Result<String, RenderError> {
    plotly::html_page(
        "Event impact treemap",
        &treemap_figure(regression, event_totals, top_n),
    )
}
