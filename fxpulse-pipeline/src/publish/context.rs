//! Values substituted into the page templates.

use crate::analysis::{Analysis, SpikeKind};
use crate::render;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Rows shown in the page tables; the CSV exports carry everything.
const TABLE_ROWS: usize = 15;
const SPIKE_ROWS: usize = 20;

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.decimals$}"),
        _ => "n/a".to_string(),
    }
}

fn fmt_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    match (start, end) {
        (Some(s), Some(e)) => format!("{s} to {e}"),
        _ => "no data".to_string(),
    }
}

fn impact_table(analysis: &Analysis) -> String {
    let regression = &analysis.regression;
    if !regression.fitted {
        return "_Not enough overlapping data for the regression yet._\n".to_string();
    }
    let mut out = String::from("| Event type | Coef | Std err | p-value | Impact | Total events |\n");
    out.push_str("|---|---:|---:|---:|---|---:|\n");
    for i in regression.ranked().into_iter().take(TABLE_ROWS) {
        out.push_str(&format!(
            "| {} | {:+.6} | {} | {} | {} | {} |\n",
            i.event_type,
            i.coef,
            fmt_opt(i.std_error, 6),
            fmt_opt(i.p_value, 4),
            i.impact.label(),
            i.total_count
        ));
    }
    out
}

fn correlation_table(analysis: &Analysis) -> String {
    let m = &analysis.correlation;
    if m.is_empty() {
        return "_No currency data yet._\n".to_string();
    }
    let mut out = String::from("| |");
    for label in &m.labels {
        out.push_str(&format!(" {label} |"));
    }
    out.push_str("\n|---|");
    out.push_str(&"---:|".repeat(m.labels.len()));
    out.push('\n');
    for (label, row) in m.labels.iter().zip(&m.values) {
        out.push_str(&format!("| **{label}** |"));
        for v in row {
            out.push_str(&format!(" {v:.3} |"));
        }
        out.push('\n');
    }
    out
}

fn spike_table(analysis: &Analysis) -> String {
    let spikes = &analysis.spikes.events;
    if spikes.is_empty() {
        return "_No spikes or dips above the threshold._\n".to_string();
    }
    let mut out = String::from("| Date | Currency | Kind | % change | z | Events the day before |\n");
    out.push_str("|---|---|---|---:|---:|---|\n");
    // Most recent first
    for s in spikes.iter().rev().take(SPIKE_ROWS) {
        let preceding: Vec<String> = s
            .preceding_events
            .iter()
            .map(|(t, n)| format!("{t} ({n})"))
            .collect();
        out.push_str(&format!(
            "| {} | {} | {} | {:+.3} | {:+.2} | {} |\n",
            s.date,
            s.currency,
            s.kind.label(),
            s.pct_change,
            s.z_score,
            if preceding.is_empty() {
                "-".to_string()
            } else {
                preceding.join(", ")
            }
        ));
    }
    out
}

fn share_table(analysis: &Analysis, kind: SpikeKind) -> String {
    let shares: Vec<_> = analysis
        .spikes
        .shares
        .iter()
        .filter(|s| s.kind == kind)
        .take(TABLE_ROWS)
        .collect();
    if shares.is_empty() {
        return format!("_No events preceded any {}._\n", kind.label());
    }
    let mut out = String::from("| Event type | Occurrences | Share |\n|---|---:|---:|\n");
    for s in shares {
        out.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            s.event_type, s.occurrences, s.percentage
        ));
    }
    out
}

fn model_table(analysis: &Analysis) -> String {
    if analysis.currency_models.is_empty() {
        return "_No per-currency models could be fitted yet._\n".to_string();
    }
    let mut out = String::from(
        "| Currency | Train rows | Test rows | R² (train) | RMSE | MAE | Strongest feature |\n",
    );
    out.push_str("|---|---:|---:|---:|---:|---:|---|\n");
    for m in &analysis.currency_models {
        let strongest = m
            .weights
            .iter()
            .filter_map(|w| w.coef.map(|c| (w, c)))
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(w, c)| format!("{} ({c:+.4})", w.feature))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "| {} | {} | {} | {:.3} | {:.4} | {:.4} | {} |\n",
            m.currency, m.n_train, m.n_test, m.r_squared_train, m.rmse, m.mae, strongest
        ));
    }
    out
}

/// Every key the built-in templates use.
pub fn page_context(analysis: &Analysis, generated_on: NaiveDate) -> BTreeMap<String, String> {
    let cov = &analysis.coverage;
    let regression = &analysis.regression;
    let mut ctx = BTreeMap::new();
    let mut set = |k: &str, v: String| {
        ctx.insert(k.to_string(), v);
    };

    set("generated_on", generated_on.to_string());
    set("currency_range", fmt_range(cov.currency_start, cov.currency_end));
    set("event_range", fmt_range(cov.event_start, cov.event_end));
    set("currency_rows", cov.currency_rows.to_string());
    set("event_rows", cov.event_rows.to_string());
    set("currency_count", cov.currencies.to_string());
    set("event_type_count", cov.event_types.to_string());
    set("joined_days", cov.joined_days.to_string());

    set("r_squared", fmt_opt(regression.r_squared, 4));
    set(
        "intercept",
        fmt_opt(regression.intercept.as_ref().map(|e| e.value), 6),
    );
    set("observations", regression.observations.to_string());
    set("impact_table", impact_table(analysis));
    set("correlation_table", correlation_table(analysis));
    set("spike_count", analysis.spikes.events.len().to_string());
    set("spike_table", spike_table(analysis));
    set("spike_share_table", share_table(analysis, SpikeKind::Spike));
    set("dip_share_table", share_table(analysis, SpikeKind::Dip));
    set("model_table", model_table(analysis));

    for (key, file) in [
        ("treemap_svg", render::TREEMAP_SVG),
        ("treemap_html", render::TREEMAP_HTML),
        ("heatmap_svg", render::HEATMAP_SVG),
        ("heatmap_html", render::HEATMAP_HTML),
        ("currency_trends_svg", render::CURRENCY_TRENDS_SVG),
        ("currency_trends_html", render::CURRENCY_TRENDS_HTML),
        ("event_trends_svg", render::EVENT_TRENDS_SVG),
        ("event_trends_html", render::EVENT_TRENDS_HTML),
        ("coefficients_csv", render::COEFFICIENTS_CSV),
        ("spikes_csv", render::SPIKES_CSV),
        ("analysis_json", render::ANALYSIS_JSON),
    ] {
        set(key, format!("assets/{file}"));
    }
    ctx
}
