//! CMS wire format and its validation into typed posts
//!
//! The search API answers with loosely typed JSON: optional uids,
//! fields that are either plain strings or rich text arrays, empty
//! objects for unset images. Everything is deserialized into the
//! permissive `Api*` structs first, then checked and converted into
//! [`RawPost`] / [`QueryPage`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::post::{is_slug, Banner, ContentSection, PostData, RawPost, RichTextBlock};

/// A document that cannot be turned into a post
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid document {id}: {reason}")]
pub struct InvalidDocument {
    pub id: String,
    pub reason: String,
}

impl InvalidDocument {
    fn new(id: &str, reason: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// One page of search results
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub results: Vec<RawPost>,
    /// Opaque URL of the next page, `None` once exhausted
    pub next_page: Option<String>,
    pub page: usize,
    pub total_pages: usize,
    pub total_results_size: usize,
}

impl QueryPage {
    /// A single page with no successor
    pub fn last(results: Vec<RawPost>) -> Self {
        let total = results.len();
        Self {
            results,
            next_page: None,
            page: 1,
            total_pages: 1,
            total_results_size: total,
        }
    }
}

/// Search endpoint response
#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub total_pages: usize,
    #[serde(default)]
    pub total_results_size: usize,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub results: Vec<ApiDocument>,
}

/// A raw document from the API
#[derive(Debug, Deserialize)]
pub struct ApiDocument {
    pub id: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    #[serde(default)]
    pub last_publication_date: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl TryFrom<ApiSearchResponse> for QueryPage {
    type Error = InvalidDocument;

    fn try_from(response: ApiSearchResponse) -> Result<Self, Self::Error> {
        let results = response
            .results
            .into_iter()
            .map(RawPost::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            results,
            next_page: response.next_page.filter(|url| !url.is_empty()),
            page: response.page,
            total_pages: response.total_pages,
            total_results_size: response.total_results_size,
        })
    }
}

impl TryFrom<ApiDocument> for RawPost {
    type Error = InvalidDocument;

    fn try_from(doc: ApiDocument) -> Result<Self, Self::Error> {
        let uid = doc
            .uid
            .filter(|uid| !uid.trim().is_empty())
            .ok_or_else(|| InvalidDocument::new(&doc.id, "missing uid"))?;
        if !is_slug(&uid) {
            return Err(InvalidDocument::new(
                &doc.id,
                format!("uid {:?} is not a slug", uid),
            ));
        }

        let first_publication_date = parse_optional_date(&doc.id, doc.first_publication_date)?;
        let last_publication_date = parse_optional_date(&doc.id, doc.last_publication_date)?;

        let data = match &doc.data {
            Value::Object(_) => parse_data(&doc.id, &doc.data)?,
            Value::Null => {
                return Err(InvalidDocument::new(&doc.id, "missing data"));
            }
            _ => return Err(InvalidDocument::new(&doc.id, "data is not an object")),
        };

        Ok(RawPost {
            id: doc.id,
            uid,
            doc_type: doc.doc_type,
            first_publication_date,
            last_publication_date,
            data,
        })
    }
}

fn parse_data(id: &str, data: &Value) -> Result<PostData, InvalidDocument> {
    let title = data
        .get("title")
        .and_then(text_of)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| InvalidDocument::new(id, "missing title"))?;

    let banner = data
        .get("banner")
        .and_then(|b| b.get("url"))
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(|url| Banner {
            url: url.to_string(),
            alt: data
                .get("banner")
                .and_then(|b| b.get("alt"))
                .and_then(Value::as_str)
                .map(str::to_string),
        });

    let content = match data.get("content") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(sections)) => sections
            .iter()
            .map(|s| parse_section(id, s))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(InvalidDocument::new(id, "content is not a list")),
    };

    Ok(PostData {
        title,
        subtitle: data.get("subtitle").and_then(text_of).unwrap_or_default(),
        author: data.get("author").and_then(text_of).unwrap_or_default(),
        banner,
        content,
    })
}

fn parse_section(id: &str, section: &Value) -> Result<ContentSection, InvalidDocument> {
    if !section.is_object() {
        return Err(InvalidDocument::new(id, "content section is not an object"));
    }

    let body = match section.get("body") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|block| {
                let text = block.get("text")?.as_str()?;
                let block_type = block
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("paragraph");
                Some(RichTextBlock {
                    block_type: block_type.to_string(),
                    text: text.to_string(),
                })
            })
            .collect(),
        Some(_) => return Err(InvalidDocument::new(id, "section body is not a list")),
    };

    Ok(ContentSection {
        heading: section.get("heading").and_then(text_of).unwrap_or_default(),
        body,
    })
}

/// Text of a key-text (string) or rich-text (array of blocks) field
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => Some(
            blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}

fn parse_optional_date(
    id: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, InvalidDocument> {
    match value {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => parse_date(&s)
            .map(Some)
            .ok_or_else(|| InvalidDocument::new(id, format!("bad date {:?}", s))),
    }
}

/// Parse a CMS timestamp (`2021-03-15T19:25:28+0000`, or RFC 3339)
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
