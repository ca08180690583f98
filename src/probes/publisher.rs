//! Publisher-site availability probe.
//!
//! Scans a work's link list for PDF-typed or PDF-suffixed links and,
//! optionally, confirms a candidate with a live fetch. A live fetch counts
//! only when the response is a success *and* the final URL equals the
//! requested one: a redirect to a different URL is treated as a paywall
//! bounce and reads as "not found".

use tracing::{debug, warn};

use crate::crossref::record::{WorkLink, WorkRecord};
use crate::retry::RetryPolicy;

use super::{ProbeError, build_probe_http_client};

/// Availability signals gathered from the publisher side of a work.
#[derive(Debug, Clone)]
pub struct AvailabilityResult {
    /// Whether a publisher PDF was found (by link scan or live check).
    pub publisher_pdf_found: bool,
    /// Whether the work carries a license marker.
    pub open_access: bool,
    /// The work's link list, passed through for downstream consumers.
    pub links: Vec<WorkLink>,
}

/// Checks whether a work's publisher exposes a reachable PDF.
#[derive(Debug)]
pub struct PublisherProbe {
    client: reqwest::Client,
    retry: RetryPolicy,
    live_check: bool,
}

/// Whether a link looks like a PDF: content-type mentions `pdf`, or the
/// URL path ends in `.pdf`.
fn is_pdf_link(link: &WorkLink) -> bool {
    let typed_pdf = link
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_lowercase().contains("pdf"));
    typed_pdf || link.url.to_lowercase().ends_with(".pdf")
}

impl PublisherProbe {
    /// Creates a probe. With `live_check`, each PDF candidate is fetched
    /// and confirmed; without it, candidate presence alone decides.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] if HTTP client construction fails.
    pub fn new(live_check: bool) -> Result<Self, ProbeError> {
        Ok(Self {
            client: build_probe_http_client()?,
            retry: RetryPolicy::default(),
            live_check,
        })
    }

    /// Replaces the retry policy (tests use a zero-delay policy).
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Probes one work. Never errors: an exhausted live check degrades the
    /// candidate to "not found".
    pub async fn check(&self, record: &WorkRecord) -> AvailabilityResult {
        let candidates: Vec<&WorkLink> = record.link.iter().filter(|link| is_pdf_link(link)).collect();

        let publisher_pdf_found = if candidates.is_empty() {
            false
        } else if self.live_check {
            self.confirm_any(&candidates).await
        } else {
            true
        };

        AvailabilityResult {
            publisher_pdf_found,
            open_access: record.is_open_access(),
            links: record.link.clone(),
        }
    }

    /// Live-checks candidates in order until one confirms.
    async fn confirm_any(&self, candidates: &[&WorkLink]) -> bool {
        for candidate in candidates {
            let url = candidate.url.as_str();
            match self
                .retry
                .run("publisher pdf check", || self.confirm_candidate(url))
                .await
            {
                Ok(true) => {
                    debug!(url, "publisher PDF confirmed");
                    return true;
                }
                Ok(false) => {
                    debug!(url, "publisher PDF candidate rejected");
                }
                Err(error) => {
                    warn!(url, error = %error, "publisher PDF check failed, treating as not found");
                }
            }
        }
        false
    }

    /// Fetches one candidate URL and decides whether it confirms.
    ///
    /// Confirms only on a success response whose final URL equals the
    /// requested URL. Redirecting away (even within the same domain) reads
    /// as "not found"; see DESIGN notes on this deliberately conservative
    /// rule.
    async fn confirm_candidate(&self, url: &str) -> Result<bool, ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ProbeError::network(url, source))?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let requested = url::Url::parse(url).ok();
        let stayed_put = requested.is_some_and(|parsed| *response.url() == parsed);
        Ok(stayed_put)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record_with_links(links: serde_json::Value) -> WorkRecord {
        serde_json::from_value(serde_json::json!({
            "DOI": "10.1/x",
            "link": links
        }))
        .unwrap()
    }

    fn test_probe(live_check: bool) -> PublisherProbe {
        PublisherProbe::new(live_check)
            .unwrap()
            .with_retry_policy(RetryPolicy::new(2, Duration::ZERO, (1.0, 1.0)))
    }

    // ==================== Link Scan Tests ====================

    #[test]
    fn test_is_pdf_link_by_content_type() {
        let link = WorkLink {
            url: "https://publisher.example/fulltext".to_string(),
            content_type: Some("application/pdf".to_string()),
        };
        assert!(is_pdf_link(&link));
    }

    #[test]
    fn test_is_pdf_link_by_suffix_case_insensitive() {
        let link = WorkLink {
            url: "https://publisher.example/Paper.PDF".to_string(),
            content_type: None,
        };
        assert!(is_pdf_link(&link));
    }

    #[test]
    fn test_is_pdf_link_rejects_html() {
        let link = WorkLink {
            url: "https://publisher.example/fulltext".to_string(),
            content_type: Some("text/html".to_string()),
        };
        assert!(!is_pdf_link(&link));
    }

    #[tokio::test]
    async fn test_scan_only_pdf_link_present() {
        let probe = test_probe(false);
        let record = record_with_links(serde_json::json!([
            {"URL": "https://publisher.example/paper.pdf"}
        ]));

        let result = probe.check(&record).await;

        assert!(result.publisher_pdf_found);
        assert!(!result.open_access);
        assert_eq!(result.links.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_only_no_pdf_link() {
        let probe = test_probe(false);
        let record = record_with_links(serde_json::json!([
            {"URL": "https://publisher.example/abstract", "content-type": "text/html"}
        ]));

        let result = probe.check(&record).await;

        assert!(!result.publisher_pdf_found);
    }

    #[tokio::test]
    async fn test_open_access_follows_license_presence() {
        let probe = test_probe(false);
        let record: WorkRecord = serde_json::from_value(serde_json::json!({
            "DOI": "10.1/x",
            "license": [{"URL": "https://creativecommons.org/licenses/by/4.0/"}]
        }))
        .unwrap();

        let result = probe.check(&record).await;

        assert!(result.open_access);
        assert!(!result.publisher_pdf_found);
    }

    // ==================== Live Check Tests ====================

    #[tokio::test]
    async fn test_live_check_confirms_direct_pdf() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_string("%PDF-1.7"))
            .mount(&server)
            .await;

        let probe = test_probe(true);
        let record = record_with_links(serde_json::json!([
            {"URL": format!("{}/paper.pdf", server.uri())}
        ]));

        let result = probe.check(&record).await;

        assert!(result.publisher_pdf_found);
    }

    #[tokio::test]
    async fn test_live_check_redirect_away_is_not_found() {
        let server = MockServer::start().await;
        // The only link redirects to a paywall page: not found.
        Mock::given(method("GET"))
            .and(path("/paper.pdf"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "/paywall"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/paywall"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>subscribe</html>"))
            .mount(&server)
            .await;

        let probe = test_probe(true);
        let record = record_with_links(serde_json::json!([
            {"URL": format!("{}/paper.pdf", server.uri())}
        ]));

        let result = probe.check(&record).await;

        assert!(!result.publisher_pdf_found);
    }

    #[tokio::test]
    async fn test_live_check_non_success_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let probe = test_probe(true);
        let record = record_with_links(serde_json::json!([
            {"URL": format!("{}/paper.pdf", server.uri())}
        ]));

        let result = probe.check(&record).await;

        assert!(!result.publisher_pdf_found);
    }

    #[tokio::test]
    async fn test_live_check_unreachable_host_degrades_to_not_found() {
        // Reserved TEST-NET address: connection fails, retries exhaust,
        // probe still answers instead of erroring.
        let probe = test_probe(true);
        let record = record_with_links(serde_json::json!([
            {"URL": "http://192.0.2.1:9/paper.pdf"}
        ]));

        let result = probe.check(&record).await;

        assert!(!result.publisher_pdf_found);
    }

    #[tokio::test]
    async fn test_live_check_second_candidate_confirms() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/good.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_string("%PDF-1.7"))
            .mount(&server)
            .await;

        let probe = test_probe(true);
        let record = record_with_links(serde_json::json!([
            {"URL": format!("{}/broken.pdf", server.uri())},
            {"URL": format!("{}/good.pdf", server.uri())}
        ]));

        let result = probe.check(&record).await;

        assert!(result.publisher_pdf_found);
    }
}
