//! Prismic REST API v2 adapter

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

use super::{ContentSource, QueryRequest, SourceError};
use crate::config::CmsConfig;
use crate::content::document::{ApiDocument, ApiSearchResponse};
use crate::content::{QueryPage, RawPost};
use crate::helpers::encode_segment;

/// API metadata (`GET {endpoint}`), only the refs are used
#[derive(Debug, Deserialize)]
struct ApiMetadata {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

/// Map a document to the site path that displays it
pub fn link_resolver(doc_type: &str, uid: Option<&str>) -> String {
    match (doc_type, uid) {
        ("posts", Some(uid)) if !uid.is_empty() => format!("/post/{}", encode_segment(uid)),
        _ => "/".to_string(),
    }
}

/// Content source backed by a Prismic repository
#[derive(Clone)]
pub struct PrismicSource {
    client: Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl PrismicSource {
    /// Create a source from CMS configuration
    pub fn new(config: &CmsConfig) -> Result<Self, SourceError> {
        if config.endpoint.trim().is_empty() {
            return Err(SourceError::NotConfigured(
                "cms.endpoint is empty".to_string(),
            ));
        }
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/')).map_err(|e| {
            SourceError::NotConfigured(format!("bad cms.endpoint {:?}: {}", config.endpoint, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("headless-blog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Current master ref of the repository
    async fn master_ref(&self) -> Result<String, SourceError> {
        let mut url = self.endpoint.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        let metadata: ApiMetadata = self.get_json(url).await?;
        metadata
            .refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or(SourceError::MissingMasterRef)
    }

    /// Build a search URL for the given ref and predicates
    fn search_url(&self, reference: &str, predicates: &str, params: &[(&str, String)]) -> Url {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map(|mut segments| {
                segments.pop_if_empty().push("documents").push("search");
            })
            .ok();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", reference);
            pairs.append_pair("q", predicates);
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            if let Some(token) = &self.access_token {
                pairs.append_pair("access_token", token);
            }
        }
        url
    }

    async fn search(&self, url: Url) -> Result<QueryPage, SourceError> {
        let response: ApiSearchResponse = self.get_json(url).await?;
        Ok(QueryPage::try_from(response)?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        tracing::debug!("GET {}", redact(&url));
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: redact(&url),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Decode {
            url: redact(&url),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ContentSource for PrismicSource {
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, SourceError> {
        let reference = match &request.preview_ref {
            Some(r) => r.clone(),
            None => self.master_ref().await?,
        };

        let mut params = vec![("pageSize", request.page_size.to_string())];
        if !request.fetch_fields.is_empty() {
            params.push(("fetch", request.fetch_fields.join(",")));
        }
        if let Some(page) = request.page {
            params.push(("page", page.to_string()));
        }

        let predicates = format!("[[at(document.type,\"{}\")]]", request.document_type);
        self.search(self.search_url(&reference, &predicates, &params))
            .await
    }

    async fn fetch_page(&self, url: &str) -> Result<QueryPage, SourceError> {
        let url = Url::parse(url).map_err(|e| SourceError::Decode {
            url: url.to_string(),
            message: format!("next_page is not a URL: {}", e),
        })?;
        self.search(url).await
    }

    async fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<RawPost>, SourceError> {
        let reference = match preview_ref {
            Some(r) => r.to_string(),
            None => self.master_ref().await?,
        };
        let predicates = format!(
            "[[at(my.{}.uid,\"{}\")]]",
            document_type,
            predicate_string(uid)
        );
        let url = self.search_url(&reference, &predicates, &[("pageSize", "1".to_string())]);
        let page = self.search(url).await?;
        Ok(page.results.into_iter().next())
    }

    async fn resolve_preview(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Option<String>, SourceError> {
        if token.is_empty() {
            return Ok(None);
        }

        let predicates = format!("[[at(document.id,\"{}\")]]", predicate_string(document_id));
        let url = self.search_url(token, &predicates, &[("pageSize", "1".to_string())]);
        let response: ApiSearchResponse = match self.get_json(url).await {
            Ok(response) => response,
            // The API rejects unknown or expired refs
            Err(SourceError::Status { status, .. })
                if StatusCode::from_u16(status).is_ok_and(|s| s.is_client_error()) =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let doc: Option<ApiDocument> = response.results.into_iter().next();
        Ok(Some(match doc {
            Some(doc) => link_resolver(&doc.doc_type, doc.uid.as_deref()),
            None => "/".to_string(),
        }))
    }
}

/// Escape a value for use inside a quoted predicate argument
fn predicate_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// URL for logs, without the access token
fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "access_token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        clean.set_query(None);
    } else {
        clean.query_pairs_mut().clear().extend_pairs(pairs);
    }
    clean.to_string()
}
