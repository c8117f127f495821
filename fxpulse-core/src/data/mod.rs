//! Data sources and storage

pub mod fetch;
pub mod frames;
pub mod gdelt;
pub mod provider;
pub mod store;
pub mod synthetic;
pub mod yahoo;

pub use fetch::{refresh_all, refresh_currencies, refresh_events, FetchPlan, FetchSummary, SourceReport};
pub use gdelt::GdeltProvider;
pub use provider::{DataError, EventProvider, RateProvider};
pub use store::{AppendSummary, ParquetStore, StoreMeta, StoreRecord, StoreStatus};
pub use synthetic::{SyntheticEvents, SyntheticRates};
pub use yahoo::YahooProvider;

use crate::domain::{CurrencyRecord, EventRecord};

pub type EventStore = ParquetStore<EventRecord>;
pub type CurrencyStore = ParquetStore<CurrencyRecord>;
