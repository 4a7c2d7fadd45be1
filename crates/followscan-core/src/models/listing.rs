use serde::{Deserialize, Serialize};

/// One project discovered on the listing source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// 1-based position in the source's displayed order.
    pub rank: u32,
    pub name: String,
    pub symbol: String,
    /// Canonical identifier on the listing source (e.g. `bitcoin`).
    pub source_id: String,
    /// The project's detail page on the listing source.
    pub detail_url: Option<String>,
    pub handle: Option<String>,
    pub profile_url: Option<String>,
    pub market_cap: f64,
    pub price: f64,
}

impl ListingRecord {
    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Same record with the given social link.
    pub fn with_handle(mut self, handle: impl Into<String>, profile_url: Option<String>) -> Self {
        self.handle = Some(handle.into());
        self.profile_url = profile_url;
        self
    }
}

/// Current price and market cap of one project, read from the listing alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub source_id: String,
    pub price: f64,
    pub market_cap: f64,
}
