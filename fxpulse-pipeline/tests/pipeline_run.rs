//! End-to-end runs on synthetic data: fetch → analyze → render → publish.

use chrono::NaiveDate;
use fxpulse_pipeline::render::{self, AssetManifest};
use fxpulse_pipeline::{Pipeline, PipelineConfig, Providers, RunOptions};
use std::path::Path;

fn config(root: &Path) -> PipelineConfig {
    let toml = format!(
        r#"
data_dir = "{root}/data"
assets_dir = "{root}/assets"
site_dir = "{root}/site"
currencies = ["EUR", "GBP", "JPY", "INR"]
trend_currencies = ["EUR", "INR"]
initial_lookback_days = 60
max_event_days_per_run = 31
"#,
        root = root.display()
    );
    PipelineConfig::from_toml(&toml).unwrap()
}

fn options(today: NaiveDate) -> RunOptions {
    RunOptions {
        today,
        providers: Providers::Synthetic,
        skip_fetch: false,
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
}

#[test]
fn synthetic_run_builds_assets_and_site() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path())).unwrap();
    let report = pipeline.run(&options(today())).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.fetch.len(), 2);
    assert!(report.fetch.iter().all(|r| r.append.inserted > 0));

    let analysis = &report.analysis;
    assert_eq!(analysis.coverage.currencies, 4);
    assert_eq!(analysis.coverage.event_types, 8);
    assert!(analysis.coverage.joined_days > 10);
    assert!(analysis.regression.fitted);
    assert_eq!(analysis.correlation.labels, vec!["EUR", "GBP", "INR", "JPY"]);
    for (i, row) in analysis.correlation.values.iter().enumerate() {
        assert_eq!(row[i], 1.0);
    }

    // Every written asset is on disk with the hash the manifest records
    let assets = dir.path().join("assets");
    let manifest = AssetManifest::load(&assets).unwrap();
    assert_eq!(manifest.assets.len(), 11);
    for (name, entry) in &manifest.assets {
        let bytes = std::fs::read(assets.join(name)).unwrap();
        assert_eq!(blake3::hash(&bytes).to_hex().to_string(), entry.hash, "{name}");
    }

    for page in ["index.md", "analysis.md", "currencies.md"] {
        let text = std::fs::read_to_string(dir.path().join("site").join(page)).unwrap();
        assert!(!text.contains("{{"), "{page} has unfilled placeholders");
    }
    assert!(dir
        .path()
        .join("site/assets")
        .join(render::TREEMAP_HTML)
        .is_file());
}

#[test]
fn rerun_on_same_day_reproduces_assets() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path())).unwrap();

    let first = pipeline.run(&options(today())).unwrap();
    let second = pipeline.run(&options(today())).unwrap();

    assert!(second.fetch.iter().all(|r| r.append.inserted == 0));
    assert_eq!(first.render.manifest, second.render.manifest);
    assert_eq!(first.analysis, second.analysis);
}

#[test]
fn later_run_extends_the_stores() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path())).unwrap();

    let first = pipeline.run(&options(today())).unwrap();
    let later = today() + chrono::Duration::days(7);
    let second = pipeline.run(&options(later)).unwrap();

    assert!(second.analysis.coverage.currency_rows > first.analysis.coverage.currency_rows);
    assert!(second.analysis.coverage.event_rows > first.analysis.coverage.event_rows);
    assert_eq!(
        second.analysis.coverage.currency_end,
        Some(NaiveDate::from_ymd_opt(2024, 5, 27).unwrap())
    );
}

#[test]
fn skip_fetch_uses_stored_data_only() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path())).unwrap();
    let first = pipeline.run(&options(today())).unwrap();

    let skipped = pipeline
        .run(&RunOptions {
            skip_fetch: true,
            ..options(today() + chrono::Duration::days(3))
        })
        .unwrap();
    assert!(skipped.fetch.is_empty());
    assert_eq!(skipped.analysis, first.analysis);
}
