//! Standalone HTML pages that draw a Plotly figure loaded from the Plotly CDN.

use super::svg::escape;
use super::RenderError;
use serde_json::Value;

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Wrap a figure (`{"data": [...], "layout": {...}}`) in an HTML page.
pub fn html_page(title: &str, figure: &Value) -> Result<String, RenderError> {
    let json = serde_json::to_string(figure).map_err(|e| RenderError::Serialize(e.to_string()))?;
    // Keep the payload from closing the script element
    let json = json.replace("</", "<\\/");

    Ok(format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<title>{title}</title>\n\
<script src=\"{cdn}\"></script>\n\
<style>html, body {{ margin: 0; height: 100%; }} #chart {{ width: 100%; height: 100vh; }}</style>\n\
</head>\n\
<body>\n\
<div id=\"chart\"></div>\n\
<script>\n\
const figure = {json};\n\
Plotly.newPlot(\"chart\", figure.data, figure.layout, {{ responsive: true }});\n\
</script>\n\
</body>\n\
</html>\n",
        title = escape(title),
        cdn = PLOTLY_CDN,
    ))
}

/// Common layout: title plus margins.
pub fn layout(title: &str) -> Value {
    serde_json::json!({
        "title": { "text": title },
        "margin": { "l": 80, "r": 40, "t": 80, "b": 80 },
        "paper_bgcolor": "#ffffff",
        "plot_bgcolor": "#ffffff",
    })
}
