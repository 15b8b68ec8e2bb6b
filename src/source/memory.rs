//! In-memory content source
//!
//! Serves a fixed list of documents split into pages, with optional
//! draft sets keyed by preview ref. Used for offline builds from a
//! fixtures file and throughout the tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{link_resolver, ContentSource, QueryRequest, SourceError};
use crate::content::document::ApiSearchResponse;
use crate::content::{QueryPage, RawPost};

const MASTER: &str = "master";

/// Content source holding its documents in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    published: Vec<RawPost>,
    drafts: HashMap<String, Vec<RawPost>>,
}

impl MemorySource {
    pub fn new(published: Vec<RawPost>) -> Self {
        Self {
            published,
            drafts: HashMap::new(),
        }
    }

    /// Register draft content visible under a preview ref
    pub fn with_drafts(mut self, preview_ref: impl Into<String>, drafts: Vec<RawPost>) -> Self {
        self.drafts.insert(preview_ref.into(), drafts);
        self
    }

    /// Load documents from a file in the search response format
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let response: ApiSearchResponse = serde_json::from_str(&content)?;
        let page = QueryPage::try_from(response)?;
        tracing::debug!(
            "Loaded {} documents from {:?}",
            page.results.len(),
            path.as_ref()
        );
        Ok(Self::new(page.results))
    }

    fn documents(&self, reference: &str) -> Option<&[RawPost]> {
        if reference == MASTER {
            Some(&self.published)
        } else {
            self.drafts.get(reference).map(Vec::as_slice)
        }
    }

    /// Slice out one page; `page` is 1-based
    fn page(
        &self,
        reference: &str,
        doc_type: &str,
        page: usize,
        page_size: usize,
    ) -> Result<QueryPage, SourceError> {
        let docs = self
            .documents(reference)
            .ok_or_else(|| SourceError::Status {
                url: format!("memory://{}", reference),
                status: 404,
            })?;
        let matching: Vec<&RawPost> = docs.iter().filter(|d| d.doc_type == doc_type).collect();

        let page_size = page_size.max(1);
        let total_pages = matching.len().div_ceil(page_size);
        let start = (page.max(1) - 1)
            .checked_mul(page_size)
            .ok_or_else(|| {
                SourceError::UnknownPage(format!(
                    "memory://{}/{}?page={}&pageSize={}",
                    reference, doc_type, page, page_size
                ))
            })?;
        let results: Vec<RawPost> = matching
            .iter()
            .skip(start)
            .take(page_size)
            .map(|d| (*d).clone())
            .collect();

        let next_page = (page < total_pages).then(|| {
            format!(
                "memory://{}/{}?page={}&pageSize={}",
                reference,
                doc_type,
                page + 1,
                page_size
            )
        });

        Ok(QueryPage {
            results,
            next_page,
            page,
            total_pages,
            total_results_size: matching.len(),
        })
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, SourceError> {
        let reference = request.preview_ref.as_deref().unwrap_or(MASTER);
        self.page(
            reference,
            &request.document_type,
            request.page.unwrap_or(1),
            request.page_size,
        )
    }

    async fn fetch_page(&self, url: &str) -> Result<QueryPage, SourceError> {
        let unknown = || SourceError::UnknownPage(url.to_string());

        let rest = url.strip_prefix("memory://").ok_or_else(unknown)?;
        let (path, query) = rest.split_once('?').ok_or_else(unknown)?;
        let (reference, doc_type) = path.split_once('/').ok_or_else(unknown)?;

        let mut page = None;
        let mut page_size = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("page", v)) => page = v.parse::<usize>().ok(),
                Some(("pageSize", v)) => page_size = v.parse::<usize>().ok(),
                _ => {}
            }
        }

        match (page, page_size) {
            (Some(page), Some(page_size)) => self.page(reference, doc_type, page, page_size),
            _ => Err(unknown()),
        }
    }

    async fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<RawPost>, SourceError> {
        let reference = preview_ref.unwrap_or(MASTER);
        let found = self
            .documents(reference)
            .and_then(|docs| {
                docs.iter()
                    .find(|d| d.doc_type == document_type && d.uid == uid)
            })
            .cloned();
        Ok(found)
    }

    async fn resolve_preview(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Option<String>, SourceError> {
        let Some(drafts) = self.drafts.get(token) else {
            return Ok(None);
        };
        let doc = drafts
            .iter()
            .chain(self.published.iter())
            .find(|d| d.id == document_id);
        Ok(Some(match doc {
            Some(doc) => link_resolver(&doc.doc_type, Some(&doc.uid)),
            None => "/".to_string(),
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::content::PostData;

    pub(crate) fn raw(uid: &str, title: &str) -> RawPost {
        RawPost {
            id: format!("id-{}", uid),
            uid: uid.to_string(),
            doc_type: "posts".to_string(),
            first_publication_date: None,
            last_publication_date: None,
            data: PostData {
                title: title.to_string(),
                ..Default::default()
            },
        }
    }

    fn request(page_size: usize) -> QueryRequest {
        QueryRequest {
            document_type: "posts".to_string(),
            page_size,
            fetch_fields: Vec::new(),
            page: None,
            preview_ref: None,
        }
    }

    #[tokio::test]
    async fn test_pages_follow_next_page() {
        let source = MemorySource::new(vec![raw("a", "A"), raw("b", "B"), raw("c", "C")]);

        let first = source.query(&request(2)).await.unwrap();
        assert_eq!(first.results.len(), 2);
        assert_eq!(first.total_pages, 2);
        let next = first.next_page.unwrap();

        let second = source.fetch_page(&next).await.unwrap();
        assert_eq!(second.results.len(), 1);
        assert_eq!(second.results[0].uid, "c");
        assert!(second.next_page.is_none());
    }

    #[tokio::test]
    async fn test_unknown_page_url() {
        let source = MemorySource::new(vec![raw("a", "A")]);
        let err = source.fetch_page("https://elsewhere/").await.unwrap_err();
        assert!(matches!(err, SourceError::UnknownPage(_)));
    }

    #[tokio::test]
    async fn test_huge_page_number_is_unknown() {
        let source = MemorySource::new(vec![raw("a", "A")]);
        let url = format!("memory://master/posts?page={}&pageSize=20", usize::MAX);
        let err = source.fetch_page(&url).await.unwrap_err();
        assert!(matches!(err, SourceError::UnknownPage(_)));

        // Past the end but representable is just an empty page
        let page = source
            .fetch_page("memory://master/posts?page=9&pageSize=20")
            .await
            .unwrap();
        assert!(page.results.is_empty());
        assert!(page.next_page.is_none());
    }

    #[tokio::test]
    async fn test_preview_ref_serves_drafts() {
        let source = MemorySource::new(vec![raw("a", "Published")])
            .with_drafts("token-1", vec![raw("a", "Draft")]);

        let published = source.get_by_uid("posts", "a", None).await.unwrap().unwrap();
        assert_eq!(published.data.title, "Published");

        let draft = source
            .get_by_uid("posts", "a", Some("token-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(draft.data.title, "Draft");

        let mut req = request(10);
        req.preview_ref = Some("nope".to_string());
        assert!(source.query(&req).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_preview() {
        let source = MemorySource::new(vec![raw("a", "A")]).with_drafts("token-1", Vec::new());

        assert_eq!(
            source.resolve_preview("token-1", "id-a").await.unwrap(),
            Some("/post/a".to_string())
        );
        assert_eq!(
            source.resolve_preview("token-1", "missing").await.unwrap(),
            Some("/".to_string())
        );
        assert_eq!(source.resolve_preview("bad", "id-a").await.unwrap(), None);
    }
}
