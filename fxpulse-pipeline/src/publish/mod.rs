//! Publisher: fills the page templates and assembles a self-contained site.
//!
//! Pages reference assets as `assets/<name>`; the assets listed in the
//! renderer's manifest are copied into `{site_dir}/assets/`.

pub mod context;
pub mod template;

pub use context::page_context;

use crate::analysis::Analysis;
use crate::render::{self, AssetManifest, RenderError, MANIFEST_FILE};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to read template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy asset {name}: {source}")]
    Copy {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(#[from] RenderError),
}

/// A page and its built-in template.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub name: &'static str,
    pub builtin: &'static str,
}

pub const PAGES: [Page; 3] = [
    Page {
        name: "index.md",
        builtin: include_str!("../../templates/index.md"),
    },
    Page {
        name: "analysis.md",
        builtin: include_str!("../../templates/analysis.md"),
    },
    Page {
        name: "currencies.md",
        builtin: include_str!("../../templates/currencies.md"),
    },
];

#[derive(Debug, Default)]
pub struct PublishReport {
    pub pages: Vec<PathBuf>,
    pub copied_assets: usize,
    /// `(page, key)` for every placeholder left unfilled.
    pub unknown_placeholders: Vec<(String, String)>,
    pub failed: Vec<(String, PublishError)>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Publisher {
    site_dir: PathBuf,
    template_dir: Option<PathBuf>,
}

impl Publisher {
    pub fn new(site_dir: impl Into<PathBuf>, template_dir: Option<PathBuf>) -> Self {
        Self {
            site_dir: site_dir.into(),
            template_dir,
        }
    }

    pub fn site_dir(&self) -> &Path {
        &self.site_dir
    }

    /// Template text: `{template_dir}/{name}` when present, else built-in.
    fn template(&self, page: &Page) -> Result<String, PublishError> {
        if let Some(dir) = &self.template_dir {
            let path = dir.join(page.name);
            if path.is_file() {
                return std::fs::read_to_string(&path)
                    .map_err(|source| PublishError::Template { path, source });
            }
        }
        Ok(page.builtin.to_string())
    }

    pub fn publish(
        &self,
        analysis: &Analysis,
        assets_dir: &Path,
        generated_on: NaiveDate,
    ) -> PublishReport {
        let ctx = page_context(analysis, generated_on);
        let mut report = PublishReport::default();

        for page in &PAGES {
            let rendered = match self.template(page) {
                Ok(text) => template::render(&text, &ctx),
                Err(e) => {
                    tracing::warn!(page = page.name, error = %e, "page skipped");
                    report.failed.push((page.name.to_string(), e));
                    continue;
                }
            };
            for key in &rendered.unknown {
                tracing::warn!(page = page.name, %key, "unknown placeholder left in page");
                report
                    .unknown_placeholders
                    .push((page.name.to_string(), key.clone()));
            }

            let path = self.site_dir.join(page.name);
            match render::write_atomic(&path, rendered.text.as_bytes()) {
                Ok(()) => report.pages.push(path),
                Err(e) => {
                    tracing::warn!(page = page.name, error = %e, "page skipped");
                    report.failed.push((page.name.to_string(), e.into()));
                }
            }
        }

        self.copy_assets(assets_dir, &mut report);
        tracing::info!(
            pages = report.pages.len(),
            assets = report.copied_assets,
            failed = report.failed.len(),
            dir = %self.site_dir.display(),
            "published site"
        );
        report
    }

    fn copy_assets(&self, assets_dir: &Path, report: &mut PublishReport) {
        let target = self.site_dir.join("assets");
        if same_dir(assets_dir, &target) {
            tracing::debug!(dir = %target.display(), "assets already in site");
            return;
        }
        let manifest = match AssetManifest::load(assets_dir) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "no asset manifest; assets not copied");
                report.failed.push((MANIFEST_FILE.to_string(), e.into()));
                return;
            }
        };
        if let Err(source) = std::fs::create_dir_all(&target) {
            report.failed.push((
                "assets".to_string(),
                PublishError::Copy {
                    name: "assets".to_string(),
                    source,
                },
            ));
            return;
        }

        let names = manifest
            .assets
            .keys()
            .map(String::as_str)
            .chain(std::iter::once(MANIFEST_FILE));
        for name in names {
            match std::fs::copy(assets_dir.join(name), target.join(name)) {
                Ok(_) => report.copied_assets += 1,
                Err(source) => {
                    tracing::warn!(asset = name, error = %source, "asset not copied");
                    report.failed.push((
                        name.to_string(),
                        PublishError::Copy {
                            name: name.to_string(),
                            source,
                        },
                    ));
                }
            }
        }
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::analysis::dataset::fixtures::{day, reference_currencies, reference_events};
    use crate::config::PipelineConfig;
    use crate::render::AssetRenderer;

    fn analysis() -> Analysis {
        let config = PipelineConfig {
            currencies: vec!["EUR".into(), "JPY".into()],
            trend_currencies: vec!["EUR".into()],
            ..PipelineConfig::default()
        };
        analyze(&reference_currencies(), &reference_events(), &config)
    }

    #[test]
    fn builtin_templates_have_no_unknown_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets_out");
        let input = analysis();
        AssetRenderer::new(&assets).unwrap().render(&input, 40);

        let publisher = Publisher::new(dir.path().join("site"), None);
        let report = publisher.publish(&input, &assets, day(10));

        assert!(report.is_complete(), "{:?}", report.failed);
        assert!(report.unknown_placeholders.is_empty());
        assert_eq!(report.pages.len(), 3);
        // 11 assets plus the manifest
        assert_eq!(report.copied_assets, 12);

        let index = std::fs::read_to_string(dir.path().join("site/index.md")).unwrap();
        assert!(index.contains("_Updated 2024-03-14_"));
        assert!(index.contains("](assets/treemap_events.svg)"));
        assert!(dir.path().join("site/assets/treemap_events.svg").is_file());
        assert!(dir.path().join("site/assets/manifest.json").is_file());
    }

    #[test]
    fn template_dir_overrides_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("index.md"), "R2={{ r_squared }} {{ nope }}").unwrap();

        let publisher = Publisher::new(dir.path().join("site"), Some(templates));
        let report = publisher.publish(&analysis(), &dir.path().join("missing"), day(10));

        let index = std::fs::read_to_string(dir.path().join("site/index.md")).unwrap();
        assert_eq!(index, "R2=0.5159 {{ nope }}");
        assert_eq!(
            report.unknown_placeholders,
            vec![("index.md".to_string(), "nope".to_string())]
        );
        // Other pages fall back to the built-ins
        assert_eq!(report.pages.len(), 3);
        // No manifest in the assets dir
        assert_eq!(report.copied_assets, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, MANIFEST_FILE);
    }

    #[test]
    fn assets_inside_site_are_not_copied() {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("site");
        let assets = site.join("assets");
        AssetRenderer::new(&assets).unwrap().render(&analysis(), 40);

        let report = Publisher::new(&site, None).publish(&analysis(), &assets, day(10));
        assert!(report.is_complete());
        assert_eq!(report.copied_assets, 0);
    }
}
