//! Currency correlation heatmap.

use super::plotly;
use super::svg::{diverging, Anchor, Svg, INK};
use super::RenderError;
use crate::analysis::CorrelationMatrix;
use serde_json::{json, Value};

const TITLE: &str = "Correlation of daily % changes";
const CELL: f64 = 72.0;
const LEFT: f64 = 80.0;
const TOP: f64 = 70.0;
const BOTTOM: f64 = 70.0;

pub fn heatmap_svg(matrix: &CorrelationMatrix) -> String {
    let k = matrix.labels.len() as f64;
    let side = (k * CELL).max(CELL * 3.0);
    let width = LEFT + side + 20.0;
    let height = TOP + side + BOTTOM;

    let mut svg = Svg::new(width, height);
    svg.text(width / 2.0, 32.0, TITLE, 18.0, Anchor::Middle, INK);
    if matrix.is_empty() {
        svg.placeholder("No currency data yet");
        return svg.finish();
    }

    for (i, row_label) in matrix.labels.iter().enumerate() {
        let y = TOP + i as f64 * CELL;
        svg.text(LEFT - 8.0, y + CELL / 2.0 + 4.0, row_label, 12.0, Anchor::End, INK);
        for (j, col_label) in matrix.labels.iter().enumerate() {
            let x = LEFT + j as f64 * CELL;
            let v = matrix.values[i][j];
            let tooltip = format!("{row_label} / {col_label}: {v:.3}");
            svg.rect(x, y, CELL, CELL, &diverging(v), Some(&tooltip));
            svg.text(
                x + CELL / 2.0,
                y + CELL / 2.0 + 4.0,
                &format!("{v:.3}"),
                11.0,
                Anchor::Middle,
                INK,
            );
        }
    }
    let label_y = TOP + k * CELL + 18.0;
    for (j, label) in matrix.labels.iter().enumerate() {
        let x = LEFT + j as f64 * CELL + CELL / 2.0;
        svg.text(x, label_y, label, 12.0, Anchor::Middle, INK);
    }
    svg.finish()
}

pub fn heatmap_figure(matrix: &CorrelationMatrix) -> Value {
    let text: Vec<Vec<String>> = matrix
        .values
        .iter()
        .map(|row| row.iter().map(|v| format!("{v:.3}")).collect())
        .collect();
    let mut layout = plotly::layout(TITLE);
    layout["yaxis"] = json!({ "autorange": "reversed" });

    json!({
        "data": [{
            "type": "heatmap",
            "x": matrix.labels,
            "y": matrix.labels,
            "z": matrix.values,
            "text": text,
            "texttemplate": "%{text}",
            "zmin": -1,
            "zmax": 1,
            "colorscale": "RdBu",
            "reversescale": true,
        }],
        "layout": layout,
    })
}

pub fn heatmap_html(matrix: &CorrelationMatrix) -> Result<String, RenderError> {
    plotly::html_page("Currency correlation", &heatmap_figure(matrix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> CorrelationMatrix {
        CorrelationMatrix {
            labels: vec!["EUR".into(), "JPY".into()],
            values: vec![vec![1.0, -0.27735], vec![-0.27735, 1.0]],
        }
    }

    #[test]
    fn cells_carry_three_decimal_values() {
        let svg = heatmap_svg(&matrix());
        assert!(svg.contains(">-0.277</text>"));
        assert!(svg.contains(">1.000</text>"));
        assert!(svg.contains("<title>EUR / JPY: -0.277</title>"));
        assert_eq!(svg.matches("<title>").count(), 4);
    }

    #[test]
    fn empty_matrix_is_a_placeholder() {
        let empty = CorrelationMatrix {
            labels: Vec::new(),
            values: Vec::new(),
        };
        assert!(heatmap_svg(&empty).contains("No currency data yet"));
        assert_eq!(heatmap_figure(&empty)["data"][0]["z"], json!([]));
    }

    #[test]
    fn figure_is_pinned_to_unit_range() {
        let fig = heatmap_figure(&matrix());
        assert_eq!(fig["data"][0]["zmin"], -1);
        assert_eq!(fig["data"][0]["zmax"], 1);
        assert_eq!(fig["data"][0]["text"][0][1], "-0.277");
    }
}
