//! Clients for external market data sources

pub mod earnings;
pub mod yahoo;

pub use earnings::{
    EarningsScraper, EarningsSource, EarningsSurprise, NO_SURPRISES, parse_earnings_table,
    summarize,
};
pub use yahoo::{MarketData, Quote, StockSnapshot, YahooMarketData};

#[cfg(test)]
pub use earnings::MockEarningsSource;
#[cfg(test)]
pub use yahoo::MockMarketData;
