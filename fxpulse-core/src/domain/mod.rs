//! Domain records for the event and currency stores.

pub mod currency;
pub mod event;

pub use currency::{normalize_code, CurrencyKey, CurrencyPair, CurrencyRecord, PairError};
pub use event::{country_from_geo, EventKey, EventRecord};
