//! Response bodies of the offers API.
use serde::{Deserialize, Serialize};

use crate::{Error, LazyOffer, Offer, Result};

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum TryParse<T> {
    Parsed(T),
    ParseFailed(serde_json::Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// Collect successfully parsed entries, logging the rest.
fn parsed<T>(entries: Vec<TryParse<T>>, what: &'static str) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(value) => {
                log::debug!(target: "annecy", entry:serde = value; "skipping malformed {what}");
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawOffersResponse {
    #[serde(default)]
    offers: Option<Vec<TryParse<Offer>>>,
    #[serde(default)]
    lazy_calls: Option<Vec<TryParse<String>>>,
    #[serde(default)]
    request_id: Option<TryParse<String>>,
}

/// Body of `GET /offers`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OffersResponse {
    pub offers: Vec<Offer>,
    pub lazy_calls: Vec<String>,
    pub request_id: Option<String>,
}

impl OffersResponse {
    /// Parse an offers response.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedResponse`] if `value` is not an object.
    /// - [`Error::Decode`] if a top-level field has the wrong shape (e.g., `offers` is not a list).
    pub fn from_value(value: serde_json::Value) -> Result<OffersResponse> {
        if !value.is_object() {
            return Err(Error::MalformedResponse);
        }

        let raw: RawOffersResponse = serde_json::from_value(value)?;

        Ok(OffersResponse {
            offers: parsed(raw.offers.unwrap_or_default(), "offer"),
            lazy_calls: parsed(raw.lazy_calls.unwrap_or_default(), "lazy call"),
            request_id: raw.request_id.and_then(Option::from),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawLazyOffersResponse {
    #[serde(default)]
    lazy_offers: Option<Vec<TryParse<LazyOffer>>>,
}

/// Parse the body of a lazy call into lazy-group resolutions.
///
/// Lazy calls are best-effort: a body that is not an object resolves nothing and malformed entries
/// are skipped.
pub(crate) fn parse_lazy_offers(value: serde_json::Value) -> Result<Vec<LazyOffer>> {
    if !value.is_object() {
        return Ok(Vec::new());
    }

    let raw: RawLazyOffersResponse = serde_json::from_value(value)?;

    Ok(parsed(raw.lazy_offers.unwrap_or_default(), "lazy offer"))
}
