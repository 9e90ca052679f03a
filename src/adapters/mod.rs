// Adapters layer: concrete price sources and storage backends.

pub mod csv_source;
pub mod storage;
pub mod yahoo;

use crate::domain::model::PriceSeries;
use crate::domain::ports::PriceSource;
use crate::utils::error::Result;

pub use csv_source::CsvSource;
pub use storage::LocalStorage;
pub use yahoo::YahooSource;

/// Price source picked at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyPriceSource {
    Yahoo(YahooSource),
    Csv(CsvSource),
}

impl PriceSource for AnyPriceSource {
    async fn fetch_closes(&self, symbol: &str, window: usize) -> Result<PriceSeries> {
        match self {
            AnyPriceSource::Yahoo(source) => source.fetch_closes(symbol, window).await,
            AnyPriceSource::Csv(source) => source.fetch_closes(symbol, window).await,
        }
    }
}
