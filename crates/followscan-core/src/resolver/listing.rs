//! Listing Resolver: ranked project discovery.

use super::extract::{listing_rows, ListingRow, SocialLinkMatcher};
use crate::error::ResolutionError;
use crate::models::{ListingRecord, MarketQuote};
use crate::network::{FetchOptions, Fetcher};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

pub struct ListingResolver {
    fetcher: Fetcher,
    options: FetchOptions,
    social: SocialLinkMatcher,
    page_param: Option<String>,
    max_pages: u32,
}

impl ListingResolver {
    pub fn new(fetcher: Fetcher, options: FetchOptions, social_domains: &[String]) -> Self {
        Self {
            fetcher,
            options,
            social: SocialLinkMatcher::new(social_domains),
            page_param: None,
            max_pages: 1,
        }
    }

    /// Follow `?<param>=N` pages until `limit` entries are found.
    pub fn with_pagination(mut self, page_param: Option<String>, max_pages: u32) -> Self {
        self.page_param = page_param;
        self.max_pages = max_pages.max(1);
        self
    }

    /// Discover up to `limit` projects from `source_url`, in displayed order.
    ///
    /// Only a failure to retrieve the first listing page is an error. Detail
    /// pages that fail or carry no social link produce records without a
    /// handle.
    pub async fn resolve_listing(
        &self,
        source_url: &str,
        limit: usize,
    ) -> Result<Vec<ListingRecord>, ResolutionError> {
        let rows = self.collect_rows(source_url, limit).await?;
        info!("Listing yielded {} projects from {}", rows.len(), source_url);

        let mut records = Vec::with_capacity(rows.len());
        for (index, (page_url, row)) in rows.into_iter().enumerate() {
            let rank = index as u32 + 1;
            records.push(self.build_record(rank, &page_url, row).await);
        }
        Ok(records)
    }

    /// Current price and market cap of up to `limit` projects, read from
    /// the listing pages only. No detail page is fetched.
    pub async fn market_quotes(
        &self,
        source_url: &str,
        limit: usize,
    ) -> Result<Vec<MarketQuote>, ResolutionError> {
        let rows = self.collect_rows(source_url, limit).await?;
        debug!("Listing yielded {} quotes from {}", rows.len(), source_url);
        Ok(rows
            .into_iter()
            .map(|(_, row)| MarketQuote {
                source_id: row.source_id,
                price: row.price,
                market_cap: row.market_cap,
            })
            .collect())
    }

    async fn collect_rows(
        &self,
        source_url: &str,
        limit: usize,
    ) -> Result<Vec<(String, ListingRow)>, ResolutionError> {
        let mut rows = Vec::new();
        let mut seen = HashSet::new();

        for page in 1..=self.max_pages {
            let page_url = match page {
                1 => source_url.to_string(),
                n => match self.page_url(source_url, n) {
                    Some(url) => url,
                    None => break,
                },
            };

            let body = match self.fetcher.fetch(&page_url, &self.options).await {
                Ok(body) => body,
                Err(source) if page == 1 => {
                    return Err(ResolutionError::ListingUnavailable {
                        url: source_url.to_string(),
                        source,
                    });
                }
                Err(e) => {
                    warn!("Stopping pagination at page {}: {}", page, e);
                    break;
                }
            };

            let page_rows = listing_rows(&body);
            debug!("Page {} yielded {} rows", page, page_rows.len());
            if page_rows.is_empty() {
                break;
            }

            for row in page_rows {
                // Pages can overlap when the ranking shifts mid-crawl
                if !seen.insert(row.source_id.clone()) {
                    continue;
                }
                rows.push((page_url.clone(), row));
                if rows.len() >= limit {
                    return Ok(rows);
                }
            }
        }

        Ok(rows)
    }

    fn page_url(&self, source_url: &str, page: u32) -> Option<String> {
        let param = self.page_param.as_deref()?;
        let mut url = Url::parse(source_url).ok()?;
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != param)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair(param, &page.to_string());
        Some(url.to_string())
    }

    async fn build_record(&self, rank: u32, page_url: &str, row: ListingRow) -> ListingRecord {
        let detail_url = Url::parse(page_url)
            .and_then(|base| base.join(&row.href))
            .map(|u| u.to_string())
            .ok();

        let mut record = ListingRecord {
            rank,
            name: row.name,
            symbol: row.symbol,
            source_id: row.source_id,
            detail_url: detail_url.clone(),
            handle: None,
            profile_url: None,
            market_cap: row.market_cap,
            price: row.price,
        };

        let Some(detail_url) = detail_url else {
            warn!("No usable detail link for {} (rank {})", record.name, rank);
            return record;
        };

        match self.fetcher.fetch(&detail_url, &self.options).await {
            Ok(body) => match self.social.find(&body) {
                Some((handle, profile_url)) => {
                    debug!("{}: found handle @{}", record.name, handle);
                    record = record.with_handle(handle, Some(profile_url));
                }
                None => debug!("{}: no social link on detail page", record.name),
            },
            Err(e) => warn!("Detail page for {} unavailable: {}", record.name, e),
        }
        record
    }
}
