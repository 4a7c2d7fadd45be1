//! Test doubles shared by unit tests across modules.

use crate::error::FetchError;
use crate::network::{Transport, TransportResponse};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

type Scripted = std::result::Result<TransportResponse, FetchError>;

/// Scripted transport: each URL yields its queued responses in order and then
/// keeps repeating the last one. Unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(self, url: &str, body: &str) -> Self {
        self.push(url, Ok(TransportResponse::ok(body)))
    }

    pub(crate) fn push(self, url: &str, response: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == url).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Scripted {
        self.calls.lock().unwrap().push(url.to_string());
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Ok(TransportResponse::status(404)),
        }
    }
}

/// Holds requests for one URL until [`GatedTransport::open`] is called.
pub(crate) struct GatedTransport {
    inner: ScriptedTransport,
    gated_url: String,
    gate: Semaphore,
}

impl GatedTransport {
    pub(crate) fn new(inner: ScriptedTransport, gated_url: &str) -> Self {
        Self {
            inner,
            gated_url: gated_url.to_string(),
            gate: Semaphore::new(0),
        }
    }

    pub(crate) fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.inner.calls_to(url)
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Scripted {
        if url == self.gated_url {
            let _permit = self.gate.acquire().await;
        }
        self.inner.get(url, timeout).await
    }
}

/// Transport that panics on every request.
pub(crate) struct PanickingTransport;

#[async_trait]
impl Transport for PanickingTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Scripted {
        panic!("transport exploded fetching {url}");
    }
}

/// Minimal listing page in the shape the listing resolver understands.
pub(crate) fn listing_page(rows: &[(&str, &str, &str, &str, &str)]) -> String {
    let mut html = String::from("<table><tbody>\n");
    for (id, name, symbol, price, cap) in rows {
        html.push_str(&format!(
            r#"<tr data-coin-id="{id}">
  <td>☆</td><td>1</td>
  <td><a href="/en/coins/{id}"><img src="/logo.png">{name} <span class="coin-symbol">{symbol}</span></a></td>
  <td data-price="{price}">${price}</td>
  <td data-market-cap="{cap}">${cap}</td>
</tr>
"#
        ));
    }
    html.push_str("</tbody></table>");
    html
}

/// Detail page with an optional social link.
pub(crate) fn detail_page(social_href: Option<&str>) -> String {
    let link = social_href
        .map(|href| format!(r#"<a href="{href}" rel="nofollow">Twitter</a>"#))
        .unwrap_or_default();
    format!(
        r#"<html><body><a href="https://github.com/org/repo">GitHub</a>{link}</body></html>"#
    )
}

/// Profile page showing a follower count in the structural position.
pub(crate) fn profile_page(handle: &str, followers: &str) -> String {
    format!(
        r#"<html><body><a href="/{handle}/following"><span><span>120</span></span> Following</a>
<a href="/{handle}/verified_followers" role="link"><span><span>{followers}</span></span> <span>Followers</span></a></body></html>"#
    )
}
