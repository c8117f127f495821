//! Renderer: turns an [`Analysis`] into static SVG charts, interactive Plotly
//! pages, and data exports at fixed paths under the assets directory.
//!
//! Every asset is rendered and written on its own; one failure is logged and
//! reported while the rest are still written. `manifest.json` is written last
//! and lists only the assets written in this run.

pub mod export;
pub mod heatmap;
pub mod manifest;
pub mod plotly;
pub mod svg;
pub mod treemap;
pub mod trends;

pub use manifest::{AssetEntry, AssetManifest, MANIFEST_FILE};

use crate::analysis::Analysis;
use std::path::{Path, PathBuf};
use thiserror::Error;
use trends::{CURRENCY_TRENDS, EVENT_TRENDS};

pub const TREEMAP_SVG: &str = "treemap_events.svg";
pub const TREEMAP_HTML: &str = "treemap_events.html";
pub const HEATMAP_SVG: &str = "corr_heatmap.svg";
pub const HEATMAP_HTML: &str = "corr_heatmap.html";
pub const CURRENCY_TRENDS_SVG: &str = "currency_trends.svg";
pub const CURRENCY_TRENDS_HTML: &str = "currency_trends.html";
pub const EVENT_TRENDS_SVG: &str = "event_trends.svg";
pub const EVENT_TRENDS_HTML: &str = "event_trends.html";
pub const COEFFICIENTS_CSV: &str = "ols_coefficients.csv";
pub const SPIKES_CSV: &str = "spike_events.csv";
pub const ANALYSIS_JSON: &str = "analysis.json";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("CSV export failed: {0}")]
    Csv(String),
}

/// Write through a sibling temp file and rename, so readers never see a
/// partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), RenderError> {
    let io = |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, contents).map_err(io)?;
    if let Err(source) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io(source));
    }
    Ok(())
}

/// Outcome of one render pass.
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Asset names written, in render order.
    pub written: Vec<String>,
    pub failed: Vec<(String, RenderError)>,
    pub manifest: AssetManifest,
}

impl RenderReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes all dashboard assets into one directory.
#[derive(Debug, Clone)]
pub struct AssetRenderer {
    assets_dir: PathBuf,
}

impl AssetRenderer {
    pub fn new(assets_dir: impl AsRef<Path>) -> Result<Self, RenderError> {
        let assets_dir = assets_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&assets_dir).map_err(|source| RenderError::Io {
            path: assets_dir.clone(),
            source,
        })?;
        Ok(Self { assets_dir })
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn render(&self, analysis: &Analysis, treemap_top_n: usize) -> RenderReport {
        let regression = &analysis.regression;
        let trends = &analysis.trends;

        let assets: Vec<(&str, Result<String, RenderError>)> = vec![
            (
                TREEMAP_SVG,
                Ok(treemap::treemap_svg(regression, &trends.event_totals, treemap_top_n)),
            ),
            (
                TREEMAP_HTML,
                treemap::treemap_html(regression, &trends.event_totals, treemap_top_n),
            ),
            (HEATMAP_SVG, Ok(heatmap::heatmap_svg(&analysis.correlation))),
            (HEATMAP_HTML, heatmap::heatmap_html(&analysis.correlation)),
            (
                CURRENCY_TRENDS_SVG,
                Ok(trends::line_chart_svg(&trends.currencies, CURRENCY_TRENDS)),
            ),
            (
                CURRENCY_TRENDS_HTML,
                trends::line_chart_html(&trends.currencies, CURRENCY_TRENDS),
            ),
            (
                EVENT_TRENDS_SVG,
                Ok(trends::line_chart_svg(&trends.events, EVENT_TRENDS)),
            ),
            (
                EVENT_TRENDS_HTML,
                trends::line_chart_html(&trends.events, EVENT_TRENDS),
            ),
            (COEFFICIENTS_CSV, export::coefficients_csv(&regression.ranked())),
            (SPIKES_CSV, export::spikes_csv(&analysis.spikes.events)),
            (ANALYSIS_JSON, export::analysis_json(analysis)),
        ];

        let mut report = RenderReport::default();
        for (name, rendered) in assets {
            let result = rendered.and_then(|contents| {
                write_atomic(&self.assets_dir.join(name), contents.as_bytes())?;
                Ok(contents)
            });
            match result {
                Ok(contents) => {
                    tracing::debug!(asset = name, bytes = contents.len(), "wrote asset");
                    report.manifest.insert(name, contents.as_bytes());
                    report.written.push(name.to_string());
                }
                Err(e) => {
                    tracing::warn!(asset = name, error = %e, "asset skipped");
                    report.failed.push((name.to_string(), e));
                }
            }
        }

        let manifest = report
            .manifest
            .to_json()
            .and_then(|json| write_atomic(&self.assets_dir.join(MANIFEST_FILE), json.as_bytes()));
        if let Err(e) = manifest {
            tracing::warn!(error = %e, "manifest not written");
            report.failed.push((MANIFEST_FILE.to_string(), e));
        }

        tracing::info!(
            written = report.written.len(),
            failed = report.failed.len(),
            dir = %self.assets_dir.display(),
            "rendered assets"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::analysis::dataset::fixtures::{reference_currencies, reference_events};
    use crate::config::PipelineConfig;

    fn analysis() -> Analysis {
        let config = PipelineConfig {
            currencies: vec!["EUR".into(), "JPY".into()],
            trend_currencies: vec!["EUR".into(), "JPY".into()],
            ..PipelineConfig::default()
        };
        analyze(&reference_currencies(), &reference_events(), &config)
    }

    #[test]
    fn writes_every_asset_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = AssetRenderer::new(dir.path().join("assets")).unwrap();
        let report = renderer.render(&analysis(), 40);

        assert!(report.is_complete(), "{:?}", report.failed);
        assert_eq!(report.written.len(), 11);
        for name in &report.written {
            assert!(renderer.assets_dir().join(name).is_file(), "{name}");
        }
        let loaded = AssetManifest::load(renderer.assets_dir()).unwrap();
        assert_eq!(loaded, report.manifest);
        assert!(loaded.assets.contains_key(TREEMAP_SVG));
        assert!(!loaded.assets.contains_key(MANIFEST_FILE));
    }

    #[test]
    fn identical_inputs_give_identical_bytes() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let input = analysis();
        let first = AssetRenderer::new(a.path()).unwrap().render(&input, 40);
        let second = AssetRenderer::new(b.path()).unwrap().render(&input, 40);

        assert_eq!(first.manifest, second.manifest);
        let ma = std::fs::read(a.path().join(MANIFEST_FILE)).unwrap();
        let mb = std::fs::read(b.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(ma, mb);
    }

    #[test]
    fn one_failed_asset_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where a file should go makes the rename fail
        std::fs::create_dir_all(dir.path().join(HEATMAP_SVG)).unwrap();

        let report = AssetRenderer::new(dir.path()).unwrap().render(&analysis(), 40);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, HEATMAP_SVG);
        assert_eq!(report.written.len(), 10);
        assert!(!report.manifest.assets.contains_key(HEATMAP_SVG));
        assert!(dir.path().join(HEATMAP_HTML).is_file());
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("x.svg");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert!(!dir.path().join("nested").join("x.svg.tmp").exists());
    }
}
