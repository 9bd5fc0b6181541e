//! Best-effort prefetch hints, deduplicated by URL.
//!
//! The [`Prefetcher`] owns the set of URLs already hinted during one page
//! lifetime (one engine instance). Two descriptors sharing a URL never hint
//! twice, and a URL whose hint failed is not retried: hints are
//! fire-and-forget and must never block or fail the real load.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use crate::error::HintError;
use crate::resource::ResourceKind;
use crate::strategy::LoadingDecision;

/// One preload hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub url: String,
    pub kind: ResourceKind,
}

impl Hint {
    pub fn new(url: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    /// RFC 8288 `Link` header value.
    pub fn link_value(&self) -> String {
        format!("<{}>; rel=preload; as={}", self.url, self.kind.as_destination())
    }
}

/// Where hints go.
pub trait HintSink {
    fn send(&mut self, hint: &Hint) -> Result<(), HintError>;
}

impl<S: HintSink + ?Sized> HintSink for Box<S> {
    fn send(&mut self, hint: &Hint) -> Result<(), HintError> {
        (**self).send(hint)
    }
}

/// Result of one [`Prefetcher::prefetch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefetchOutcome {
    /// The decision does not grant a preload.
    NotEligible,
    AlreadyHinted,
    Issued,
    /// The sink failed; the URL still counts as hinted.
    HintFailed,
}

#[derive(Debug)]
pub struct Prefetcher<S> {
    sink: S,
    hinted: HashSet<String>,
}

impl<S: HintSink> Prefetcher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            hinted: HashSet::new(),
        }
    }

    /// Hint `url` if `decision` grants a preload and no hint for the same
    /// URL was issued before. Idempotent.
    pub fn prefetch(&mut self, url: &str, kind: ResourceKind, decision: &LoadingDecision) -> PrefetchOutcome {
        if !decision.should_preload {
            return PrefetchOutcome::NotEligible;
        }
        if !self.hinted.insert(url.to_string()) {
            return PrefetchOutcome::AlreadyHinted;
        }

        match self.sink.send(&Hint::new(url, kind)) {
            Ok(()) => {
                debug!(url, ?kind, "preload hint issued");
                PrefetchOutcome::Issued
            }
            Err(err) => {
                debug!(url, error = %err, "preload hint failed; ignoring");
                PrefetchOutcome::HintFailed
            }
        }
    }

    pub fn is_hinted(&self, url: &str) -> bool {
        self.hinted.contains(url)
    }

    pub fn hinted_count(&self) -> usize {
        self.hinted.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

/// Collects hints as `Link` header values for a server response.
#[derive(Debug, Clone, Default)]
pub struct LinkHeaderSink {
    values: Vec<String>,
}

impl LinkHeaderSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// All hints joined into one `Link` header, or `None` when empty.
    pub fn header_value(&self) -> Option<String> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.join(", "))
        }
    }
}

impl HintSink for LinkHeaderSink {
    fn send(&mut self, hint: &Hint) -> Result<(), HintError> {
        self.values.push(hint.link_value());
        Ok(())
    }
}

/// Fires each hint as a background `GET` on the ambient tokio runtime.
///
/// Responses are drained and discarded. Call [`HttpHintSink::flush`] before
/// shutting the runtime down if the requests must complete.
#[derive(Debug)]
pub struct HttpHintSink {
    client: reqwest::Client,
    base: Option<Url>,
    pending: Vec<JoinHandle<()>>,
}

impl HttpHintSink {
    /// `base` resolves relative hint URLs such as `/images/hero.avif`.
    pub fn new(base: Option<Url>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
            pending: Vec::new(),
        }
    }

    pub fn with_client(client: reqwest::Client, base: Option<Url>) -> Self {
        Self {
            client,
            base,
            pending: Vec::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every in-flight hint. Returns how many were awaited.
    pub async fn flush(&mut self) -> usize {
        let handles: Vec<_> = self.pending.drain(..).collect();
        let count = handles.len();
        for handle in handles {
            // A panicked or cancelled hint is as good as a failed one.
            let _ = handle.await;
        }
        count
    }

    fn resolve(&self, raw: &str) -> Result<Url, HintError> {
        let parsed = match (Url::parse(raw), &self.base) {
            (Ok(url), _) => Ok(url),
            (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => base.join(raw),
            (Err(err), _) => Err(err),
        };
        parsed.map_err(|err| HintError::InvalidUrl {
            url: raw.to_string(),
            message: err.to_string(),
        })
    }
}

impl HintSink for HttpHintSink {
    fn send(&mut self, hint: &Hint) -> Result<(), HintError> {
        let url = self.resolve(&hint.url)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| HintError::NoRuntime(hint.url.clone()))?;

        let request = self
            .client
            .get(url.clone())
            .header("Purpose", "prefetch")
            .header("Sec-Purpose", "prefetch");
        self.pending.push(runtime.spawn(async move {
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let _ = response.bytes().await;
                    debug!(%url, %status, "prefetch hint completed");
                }
                Err(err) => debug!(%url, error = %err, "prefetch hint failed"),
            }
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ConnectionProfile;
    use crate::resource::PriorityTier;
    use crate::strategy::{resolve, ProximitySignal};

    fn granted() -> LoadingDecision {
        resolve(
            PriorityTier::High,
            ResourceKind::Image,
            &ConnectionProfile::fast_default(),
            ProximitySignal::new(false, true),
        )
    }

    fn denied() -> LoadingDecision {
        resolve(
            PriorityTier::Low,
            ResourceKind::Image,
            &ConnectionProfile::fast_default(),
            ProximitySignal::new(false, true),
        )
    }

    struct FailingSink;

    impl HintSink for FailingSink {
        fn send(&mut self, hint: &Hint) -> Result<(), HintError> {
            Err(HintError::NoRuntime(hint.url.clone()))
        }
    }

    #[test]
    fn issues_only_when_preload_granted() {
        let mut p = Prefetcher::new(LinkHeaderSink::new());
        assert_eq!(p.prefetch("/a.avif", ResourceKind::Image, &denied()), PrefetchOutcome::NotEligible);
        assert!(!p.is_hinted("/a.avif"));
        assert_eq!(p.prefetch("/a.avif", ResourceKind::Image, &granted()), PrefetchOutcome::Issued);
        assert_eq!(p.sink().values(), ["</a.avif>; rel=preload; as=image"]);
    }

    #[test]
    fn dedups_by_url() {
        let mut p = Prefetcher::new(LinkHeaderSink::new());
        let d = granted();
        assert_eq!(p.prefetch("/a.avif", ResourceKind::Image, &d), PrefetchOutcome::Issued);
        assert_eq!(p.prefetch("/a.avif", ResourceKind::Image, &d), PrefetchOutcome::AlreadyHinted);
        assert_eq!(p.prefetch("/b.avif", ResourceKind::Image, &d), PrefetchOutcome::Issued);
        assert_eq!(p.hinted_count(), 2);
        assert_eq!(
            p.sink().header_value().as_deref(),
            Some("</a.avif>; rel=preload; as=image, </b.avif>; rel=preload; as=image")
        );
    }

    #[test]
    fn failed_hint_is_swallowed_and_not_retried() {
        let mut p = Prefetcher::new(FailingSink);
        let d = granted();
        assert_eq!(p.prefetch("/a.avif", ResourceKind::Image, &d), PrefetchOutcome::HintFailed);
        assert_eq!(p.prefetch("/a.avif", ResourceKind::Image, &d), PrefetchOutcome::AlreadyHinted);
    }

    #[test]
    fn http_sink_without_runtime_fails_softly() {
        let mut sink = HttpHintSink::new(None);
        let err = sink.send(&Hint::new("https://example.com/a.js", ResourceKind::Script));
        assert!(matches!(err, Err(HintError::NoRuntime(_))));
    }

    #[test]
    fn http_sink_rejects_relative_url_without_base() {
        let mut sink = HttpHintSink::new(None);
        let err = sink.send(&Hint::new("/a.js", ResourceKind::Script));
        assert!(matches!(err, Err(HintError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn http_sink_sends_prefetch_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/images/hero.avif")
            .match_header("purpose", "prefetch")
            .with_status(200)
            .with_body("img")
            .expect(1)
            .create_async()
            .await;

        let base = Url::parse(&server.url()).unwrap();
        let mut p = Prefetcher::new(HttpHintSink::new(Some(base)));
        let d = granted();
        assert_eq!(p.prefetch("/images/hero.avif", ResourceKind::Image, &d), PrefetchOutcome::Issued);
        assert_eq!(p.prefetch("/images/hero.avif", ResourceKind::Image, &d), PrefetchOutcome::AlreadyHinted);
        assert_eq!(p.sink_mut().flush().await, 1);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_sink_swallows_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing.js")
            .with_status(500)
            .create_async()
            .await;

        let mut sink = HttpHintSink::new(Some(Url::parse(&server.url()).unwrap()));
        assert!(sink.send(&Hint::new("/missing.js", ResourceKind::Script)).is_ok());
        sink.flush().await;
        mock.assert_async().await;
    }
}
