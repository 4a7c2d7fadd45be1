//! Handle Resolver: follower counts from profile pages.

use super::extract::{follower_text, FollowerText};
use crate::error::ResolutionError;
use crate::models::{FollowerCount, FollowerRecord};
use crate::network::{FetchOptions, Fetcher};
use tracing::{debug, warn};

pub struct HandleResolver {
    fetcher: Fetcher,
    options: FetchOptions,
}

impl HandleResolver {
    pub fn new(fetcher: Fetcher, options: FetchOptions) -> Self {
        Self { fetcher, options }
    }

    /// Read the current follower count for `handle` from `profile_url`.
    ///
    /// A page without a readable count gives an unresolved record; only a
    /// profile fetch that fails after retries is an error. Consecutive calls
    /// to the same host are spaced by the fetcher's pacer.
    pub async fn resolve_followers(
        &self,
        handle: &str,
        profile_url: &str,
    ) -> Result<FollowerRecord, ResolutionError> {
        let body = self
            .fetcher
            .fetch(profile_url, &self.options)
            .await
            .map_err(|source| ResolutionError::ProfileUnavailable {
                handle: handle.to_string(),
                source,
            })?;

        let record = match follower_text(&body) {
            FollowerText::Found(text) => FollowerRecord::from_display(handle, &text),
            FollowerText::Empty(text) => FollowerRecord {
                raw: Some(text.clone()),
                ..FollowerRecord::unresolved(
                    handle,
                    format!("unparseable follower count: {:?}", text),
                )
            },
            FollowerText::Missing => FollowerRecord::unresolved(handle, "follower element not found"),
        };

        match &record.followers {
            FollowerCount::Resolved { followers } => {
                debug!("@{}: {} followers", handle, followers)
            }
            FollowerCount::Unresolved { reason } => warn!("@{} unresolved: {}", handle, reason),
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{HostPacer, TransportResponse};
    use crate::testing::{profile_page, ScriptedTransport};
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver(transport: Arc<ScriptedTransport>) -> HandleResolver {
        let options = FetchOptions::default()
            .with_max_retries(2)
            .with_base_delay(Duration::from_millis(5));
        HandleResolver::new(Fetcher::new(transport, HostPacer::disabled()), options)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_suffixed_count() {
        let transport = Arc::new(
            ScriptedTransport::new().page("http://x.test/alpha", &profile_page("alpha", "2.5M")),
        );
        let record = resolver(transport)
            .resolve_followers("alpha", "http://x.test/alpha")
            .await
            .unwrap();
        assert_eq!(record.handle, "alpha");
        assert_eq!(record.followers.value(), Some(2_500_000));
        assert_eq!(record.raw.as_deref(), Some("2.5M"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_element_is_unresolved_not_error() {
        let transport =
            Arc::new(ScriptedTransport::new().page("http://x.test/ghost", "<html>gone</html>"));
        let record = resolver(transport)
            .resolve_followers("ghost", "http://x.test/ghost")
            .await
            .unwrap();
        assert_eq!(
            record.followers,
            FollowerCount::unresolved("follower element not found")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_count_is_unresolved() {
        let html = r#"<a href="/odd/followers"><span>many</span></a>"#;
        let transport = Arc::new(ScriptedTransport::new().page("http://x.test/odd", html));
        let record = resolver(transport)
            .resolve_followers("odd", "http://x.test/odd")
            .await
            .unwrap();
        assert_eq!(record.followers.value(), None);
        assert_eq!(record.raw.as_deref(), Some("many"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_profile_unavailable() {
        let transport = Arc::new(
            ScriptedTransport::new().push("http://x.test/down", Ok(TransportResponse::status(502))),
        );
        let err = resolver(transport.clone())
            .resolve_followers("down", "http://x.test/down")
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "profile_unavailable");
        assert_eq!(transport.calls_to("http://x.test/down"), 3);
    }
}
