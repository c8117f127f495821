//! FxPulse Pipeline: analysis, rendering, and publishing on top of `fxpulse-core`.
//!
//! - Pipeline config (TOML) with validation
//! - Analyzer: USD strength OLS, currency correlation, spike detection,
//!   per-currency next-day models
//! - Renderer: SVG charts, Plotly HTML pages, CSV/JSON exports, asset manifest
//! - Publisher: markdown site from `{{ key }}` templates
//! - The daily run tying the stages together

pub mod analysis;
pub mod config;
pub mod pipeline;
pub mod publish;
pub mod render;

pub use analysis::{analyze, Analysis, CorrelationMatrix, Coverage, RegressionResult};
pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{
    FetchTarget, Pipeline, PipelineError, PipelineReport, Providers, RunOptions,
};
pub use publish::{PublishError, PublishReport, Publisher};
pub use render::{AssetManifest, AssetRenderer, RenderError, RenderReport};
