//! Serde model of a Crossref works item.
//!
//! Field names mirror the Crossref REST API (`DOI`, `URL`, kebab-case keys)
//! on both serialize and deserialize, so the checkpoint file stays a plain
//! map of Crossref-shaped objects. Records are immutable once fetched.

use serde::{Deserialize, Serialize};

/// One bibliographic work as returned by the Crossref API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkRecord {
    /// Canonical DOI, case-preserved as received.
    #[serde(rename = "DOI", default)]
    pub doi: String,

    /// Title variants; the first entry is the display title.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title: Vec<String>,

    /// Ordered author list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<WorkAuthor>,

    /// ISSNs of the containing venue.
    #[serde(rename = "ISSN", default, skip_serializing_if = "Vec::is_empty")]
    pub issn: Vec<String>,

    /// Incoming-citation count; the authoritative count for dedup conflicts.
    #[serde(rename = "is-referenced-by-count", default)]
    pub cited_by_count: u64,

    /// Publication date hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateHint>,

    /// Online-publication date hint.
    #[serde(
        rename = "published-online",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub published_online: Option<DateHint>,

    /// Issue date hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<DateHint>,

    /// Record-creation date hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateHint>,

    /// Canonical landing-page URL.
    #[serde(rename = "URL", default)]
    pub url: String,

    /// License entries; presence marks the work as open access.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub license: Vec<WorkLicense>,

    /// Resource links published alongside the record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<WorkLink>,
}

/// An author entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkAuthor {
    /// Given name(s).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,

    /// Family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

/// A license entry; only the URL is carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkLicense {
    /// License URL, when published.
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A resource link carrying a URL and an optional content-type tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkLink {
    /// The link target. Uppercase `URL` in the Crossref response.
    #[serde(rename = "URL")]
    pub url: String,

    /// Declared content type, e.g. `application/pdf`.
    #[serde(
        rename = "content-type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,
}

/// A Crossref date field in `date-parts` form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateHint {
    /// Nested `[[year, month, day]]` array; trailing parts may be absent.
    #[serde(rename = "date-parts", default, skip_serializing_if = "Option::is_none")]
    pub date_parts: Option<Vec<Vec<Option<i32>>>>,
}

impl DateHint {
    /// Extracts the year, when present.
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.date_parts
            .as_ref()
            .and_then(|parts| parts.first())
            .and_then(|inner| inner.first())
            .copied()
            .flatten()
    }
}

impl WorkRecord {
    /// The dedup key: DOI trimmed and lower-cased.
    #[must_use]
    pub fn normalized_doi(&self) -> String {
        self.doi.trim().to_lowercase()
    }

    /// The display title, when any title variant is present.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.first().map_or("", String::as_str)
    }

    /// Publication year from the first date hint that carries one, in the
    /// order published, published-online, issued, created.
    #[must_use]
    pub fn publication_year(&self) -> Option<i32> {
        [
            self.published.as_ref(),
            self.published_online.as_ref(),
            self.issued.as_ref(),
            self.created.as_ref(),
        ]
        .into_iter()
        .flatten()
        .find_map(DateHint::year)
    }

    /// Whether a license marker is present.
    #[must_use]
    pub fn is_open_access(&self) -> bool {
        !self.license.is_empty()
    }
}
