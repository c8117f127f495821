//! Tabular exports of the analysis: CSV for spreadsheets, JSON for everything.

use super::RenderError;
use crate::analysis::{Analysis, EventImpact, SpikeEvent};

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, RenderError> {
    let data = wtr
        .into_inner()
        .map_err(|e| RenderError::Csv(format!("failed to flush CSV writer: {e}")))?;
    String::from_utf8(data).map_err(|e| RenderError::Csv(format!("CSV output is not UTF-8: {e}")))
}

fn csv_err(e: csv::Error) -> RenderError {
    RenderError::Csv(e.to_string())
}

/// Columns: event_type, coef, std_error, t_stat, p_value, impact, estimated,
/// total_count. Rows ranked by |coef|.
pub fn coefficients_csv(impacts: &[&EventImpact]) -> Result<String, RenderError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "event_type",
        "coef",
        "std_error",
        "t_stat",
        "p_value",
        "impact",
        "estimated",
        "total_count",
    ])
    .map_err(csv_err)?;

    for i in impacts {
        wtr.write_record([
            i.event_type.as_str(),
            &format!("{:.6}", i.coef),
            &opt(i.std_error),
            &opt(i.t_stat),
            &opt(i.p_value),
            i.impact.label(),
            if i.estimated { "true" } else { "false" },
            &format!("{}", i.total_count),
        ])
        .map_err(csv_err)?;
    }
    finish(wtr)
}

/// Columns: date, currency, kind, pct_change, z_score, preceding_events.
/// Preceding events are written as `TYPE:count` joined with `;`.
pub fn spikes_csv(spikes: &[SpikeEvent]) -> Result<String, RenderError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "currency",
        "kind",
        "pct_change",
        "z_score",
        "preceding_events",
    ])
    .map_err(csv_err)?;

    for s in spikes {
        let preceding: Vec<String> = s
            .preceding_events
            .iter()
            .map(|(t, n)| format!("{t}:{n}"))
            .collect();
        wtr.write_record([
            s.date.to_string().as_str(),
            &s.currency,
            s.kind.label(),
            &format!("{:.6}", s.pct_change),
            &format!("{:.4}", s.z_score),
            &preceding.join(";"),
        ])
        .map_err(csv_err)?;
    }
    finish(wtr)
}

pub fn analysis_json(analysis: &Analysis) -> Result<String, RenderError> {
    let mut json = serde_json::to_string_pretty(analysis)
        .map_err(|e| RenderError::Serialize(format!("failed to serialize analysis: {e}")))?;
    json.push('\n');
    Ok(json)
}
