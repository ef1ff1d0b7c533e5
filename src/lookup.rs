//! Postal code lookup against the external service.
//!
//! One request per key: `GET {base}/{key}?json=1`. The HTTP status decides the
//! outcome; nothing is retried.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::core::{ReconError, Result};
use crate::normalize::CanonicalKey;

/// Locality data the service returned for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalityMatch {
    pub key: CanonicalKey,
    /// The code as the service spells it.
    pub baseline_key: String,
    pub locality: String,
    pub region: String,
}

/// Result of looking up one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(LocalityMatch),
    NotFound { key: CanonicalKey },
    /// Any other status. `status` is `None` when no response arrived at all.
    OtherError {
        key: CanonicalKey,
        status: Option<u16>,
    },
}

impl LookupOutcome {
    pub fn key(&self) -> &CanonicalKey {
        match self {
            LookupOutcome::Found(m) => &m.key,
            LookupOutcome::NotFound { key } | LookupOutcome::OtherError { key, .. } => key,
        }
    }
}

/// Anything that can answer a postal code lookup.
#[async_trait]
pub trait PostalLookup: Send + Sync {
    async fn lookup(&self, key: &CanonicalKey) -> LookupOutcome;
}

#[derive(Debug, Deserialize)]
struct LocalityPayload {
    #[serde(rename = "CP")]
    cp: Option<String>,
    #[serde(rename = "Concelho")]
    concelho: String,
    #[serde(rename = "Distrito")]
    distrito: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LookupBody {
    One(LocalityPayload),
    Many(Vec<LocalityPayload>),
}

impl LookupBody {
    fn into_first(self) -> Option<LocalityPayload> {
        match self {
            LookupBody::One(payload) => Some(payload),
            LookupBody::Many(payloads) => payloads.into_iter().next(),
        }
    }
}

/// [`PostalLookup`] backed by the HTTP lookup service.
#[derive(Clone)]
pub struct HttpLookupClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpLookupClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|err| ReconError::InvalidConfiguration {
            name: "BASE_URL",
            reason: err.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ReconError::InvalidConfiguration {
                name: "BASE_URL",
                reason: format!("'{base_url}' cannot carry path segments"),
            });
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn url_for(&self, key: &CanonicalKey) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(key.as_str());
        }
        url.query_pairs_mut().append_pair("json", "1");
        url
    }
}

#[async_trait]
impl PostalLookup for HttpLookupClient {
    async fn lookup(&self, key: &CanonicalKey) -> LookupOutcome {
        let url = self.url_for(key);

        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(key = %key, error = %err, "lookup request failed");
                return LookupOutcome::OtherError {
                    key: key.clone(),
                    status: err.status().map(|s| s.as_u16()),
                };
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<LookupBody>().await {
                Ok(body) => match body.into_first() {
                    Some(payload) => LookupOutcome::Found(LocalityMatch {
                        key: key.clone(),
                        baseline_key: payload.cp.unwrap_or_else(|| key.to_string()),
                        locality: payload.concelho,
                        region: payload.distrito,
                    }),
                    None => {
                        debug!(key = %key, "lookup returned an empty result list");
                        LookupOutcome::OtherError {
                            key: key.clone(),
                            status: Some(StatusCode::OK.as_u16()),
                        }
                    }
                },
                Err(err) => {
                    debug!(key = %key, error = %err, "lookup body could not be decoded");
                    LookupOutcome::OtherError {
                        key: key.clone(),
                        status: Some(StatusCode::OK.as_u16()),
                    }
                }
            },
            StatusCode::NOT_FOUND => LookupOutcome::NotFound { key: key.clone() },
            status => LookupOutcome::OtherError {
                key: key.clone(),
                status: Some(status.as_u16()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    #[test]
    fn test_url_appends_key_and_json_flag() {
        let client = HttpLookupClient::new("http://lookup.local/cp").unwrap();
        assert_eq!(
            client.url_for(&normalize("1000-100")).as_str(),
            "http://lookup.local/cp/1000100?json=1"
        );

        let trailing = HttpLookupClient::new("http://lookup.local/cp/").unwrap();
        assert_eq!(
            trailing.url_for(&normalize("1000100")).as_str(),
            "http://lookup.local/cp/1000100?json=1"
        );
    }

    #[test]
    fn test_malformed_key_is_escaped() {
        let client = HttpLookupClient::new("http://lookup.local/cp").unwrap();
        assert_eq!(
            client.url_for(&normalize("10 0/1")).as_str(),
            "http://lookup.local/cp/10%200%2F1?json=1"
        );
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(matches!(
            HttpLookupClient::new("not a url"),
            Err(ReconError::InvalidConfiguration { name: "BASE_URL", .. })
        ));
        assert!(matches!(
            HttpLookupClient::new("mailto:someone@example.com"),
            Err(ReconError::InvalidConfiguration { name: "BASE_URL", .. })
        ));
    }

    #[test]
    fn test_body_accepts_object_or_list() {
        let one: LookupBody =
            serde_json::from_str(r#"{"CP":"1000-100","Concelho":"Lisboa","Distrito":"Lisboa"}"#)
                .unwrap();
        assert_eq!(one.into_first().unwrap().cp.as_deref(), Some("1000-100"));

        let many: LookupBody = serde_json::from_str(
            r#"[{"Concelho":"Porto","Distrito":"Porto"},{"Concelho":"Maia","Distrito":"Porto"}]"#,
        )
        .unwrap();
        let first = many.into_first().unwrap();
        assert_eq!(first.concelho, "Porto");
        assert!(first.cp.is_none());

        let empty: LookupBody = serde_json::from_str("[]").unwrap();
        assert!(empty.into_first().is_none());
    }
}
