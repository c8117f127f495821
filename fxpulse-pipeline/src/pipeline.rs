//! The daily run: fetch → analyze → render → publish.
//!
//! Fetch failures are logged and the run continues on the stored data. Chart
//! and page failures are collected in the report. Only an unreadable config
//! or store, or an unusable assets directory, fails the run.

use crate::analysis::{analyze, Analysis};
use crate::config::{ConfigError, PipelineConfig};
use crate::publish::{PublishReport, Publisher};
use crate::render::{AssetRenderer, RenderError, RenderReport};
use chrono::NaiveDate;
use fxpulse_core::data::{
    refresh_all, refresh_currencies, refresh_events, CurrencyStore, DataError, EventProvider,
    EventStore, FetchPlan, GdeltProvider, RateProvider, SourceReport, SyntheticEvents,
    SyntheticRates, YahooProvider,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load {store} store: {source}")]
    Store {
        store: &'static str,
        #[source]
        source: DataError,
    },

    #[error("provider unavailable: {0}")]
    Provider(#[source] DataError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Which providers feed the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Providers {
    /// Yahoo Finance and GDELT.
    Live,
    /// Deterministic offline data.
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTarget {
    Currencies,
    Events,
    All,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub today: NaiveDate,
    pub providers: Providers,
    pub skip_fetch: bool,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub fetch: Vec<SourceReport>,
    pub analysis: Analysis,
    pub render: RenderReport,
    pub publish: PublishReport,
}

impl PipelineReport {
    pub fn is_clean(&self) -> bool {
        self.fetch.iter().all(SourceReport::is_clean)
            && self.render.is_complete()
            && self.publish.is_complete()
    }
}

/// Holds a validated config and runs the stages against its directories.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn currency_store(&self) -> CurrencyStore {
        CurrencyStore::new(&self.config.data_dir)
    }

    pub fn event_store(&self) -> EventStore {
        EventStore::new(&self.config.data_dir)
    }

    pub fn fetch_plan(&self, today: NaiveDate) -> FetchPlan {
        FetchPlan {
            today,
            initial_lookback_days: self.config.initial_lookback_days,
            max_event_days: self.config.max_event_days_per_run,
        }
    }

    fn rate_provider(providers: Providers) -> Result<Box<dyn RateProvider>, PipelineError> {
        Ok(match providers {
            Providers::Live => Box::new(YahooProvider::new().map_err(PipelineError::Provider)?),
            Providers::Synthetic => Box::new(SyntheticRates::new()),
        })
    }

    fn event_provider(providers: Providers) -> Result<Box<dyn EventProvider>, PipelineError> {
        Ok(match providers {
            Providers::Live => Box::new(GdeltProvider::new().map_err(PipelineError::Provider)?),
            Providers::Synthetic => Box::new(SyntheticEvents),
        })
    }

    /// Refresh the selected stores up to `today`.
    pub fn fetch(
        &self,
        providers: Providers,
        target: FetchTarget,
        today: NaiveDate,
    ) -> Result<Vec<SourceReport>, PipelineError> {
        let plan = self.fetch_plan(today);
        let pairs = self.config.pairs()?;
        let currency_store = self.currency_store();
        let event_store = self.event_store();

        let reports = match target {
            FetchTarget::Currencies => {
                let rates = Self::rate_provider(providers)?;
                vec![refresh_currencies(rates.as_ref(), &currency_store, &pairs, &plan)]
            }
            FetchTarget::Events => {
                let events = Self::event_provider(providers)?;
                vec![refresh_events(events.as_ref(), &event_store, &plan)]
            }
            FetchTarget::All => {
                let rates = Self::rate_provider(providers)?;
                let events = Self::event_provider(providers)?;
                let summary = refresh_all(
                    rates.as_ref(),
                    events.as_ref(),
                    &currency_store,
                    &event_store,
                    &pairs,
                    &plan,
                );
                if !summary.all_clean() {
                    tracing::warn!("fetch finished with errors; continuing on stored data");
                }
                vec![summary.currencies, summary.events]
            }
        };
        Ok(reports)
    }

    /// Load both stores and run the analyzer.
    pub fn analyze(&self) -> Result<Analysis, PipelineError> {
        let currencies = self
            .currency_store()
            .load()
            .map_err(|source| PipelineError::Store {
                store: "currency",
                source,
            })?;
        let events = self
            .event_store()
            .load()
            .map_err(|source| PipelineError::Store {
                store: "event",
                source,
            })?;
        Ok(analyze(&currencies, &events, &self.config))
    }

    pub fn render(&self, analysis: &Analysis) -> Result<RenderReport, PipelineError> {
        let renderer = AssetRenderer::new(&self.config.assets_dir)?;
        Ok(renderer.render(analysis, self.config.treemap_top_n))
    }

    pub fn publish(&self, analysis: &Analysis, generated_on: NaiveDate) -> PublishReport {
        Publisher::new(&self.config.site_dir, self.config.template_dir.clone()).publish(
            analysis,
            &self.config.assets_dir,
            generated_on,
        )
    }

    pub fn run(&self, options: &RunOptions) -> Result<PipelineReport, PipelineError> {
        tracing::info!(today = %options.today, providers = ?options.providers, "pipeline run");

        let fetch = if options.skip_fetch {
            tracing::info!("fetch skipped");
            Vec::new()
        } else {
            match self.fetch(options.providers, FetchTarget::All, options.today) {
                Ok(reports) => reports,
                Err(e) => {
                    tracing::warn!(error = %e, "fetch failed; continuing on stored data");
                    Vec::new()
                }
            }
        };

        let analysis = self.analyze()?;
        let render = self.render(&analysis)?;
        let publish = self.publish(&analysis, options.today);

        Ok(PipelineReport {
            fetch,
            analysis,
            render,
            publish,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            data_dir: root.join("data"),
            assets_dir: root.join("assets"),
            site_dir: root.join("site"),
            currencies: vec!["EUR".into(), "JPY".into(), "INR".into()],
            trend_currencies: vec!["EUR".into()],
            ..PipelineConfig::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = PipelineConfig {
            currencies: Vec::new(),
            ..PipelineConfig::default()
        };
        assert!(matches!(Pipeline::new(bad), Err(PipelineError::Config(_))));
    }

    #[test]
    fn fetch_single_target_touches_one_store() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config(dir.path())).unwrap();
        let reports = pipeline
            .fetch(Providers::Synthetic, FetchTarget::Currencies, today())
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].append.inserted > 0);
        assert!(pipeline.event_store().load().unwrap().is_empty());
    }

    #[test]
    fn skip_fetch_on_empty_stores_still_renders() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config(dir.path())).unwrap();
        let report = pipeline
            .run(&RunOptions {
                today: today(),
                providers: Providers::Synthetic,
                skip_fetch: true,
            })
            .unwrap();
        assert!(report.fetch.is_empty());
        assert!(!report.analysis.regression.fitted);
        assert!(report.render.is_complete());
        assert!(dir.path().join("site/index.md").is_file());
    }
}
