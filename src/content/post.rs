//! Post models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A listing entry held by the post store
///
/// Two posts are the same post when their uids match, whatever the
/// other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// CMS-assigned unique identifier
    pub uid: String,

    /// Post title
    pub title: String,

    /// Short description shown in the listing
    #[serde(default)]
    pub subtitle: String,

    /// Author name
    #[serde(default)]
    pub author: String,

    /// First publication date, absent for never-published drafts
    #[serde(default)]
    pub first_publication_date: Option<DateTime<Utc>>,
}

impl Post {
    /// Create a post with only the identifying fields
    pub fn new(uid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            title: title.into(),
            subtitle: String::new(),
            author: String::new(),
            first_publication_date: None,
        }
    }
}

impl PartialEq for Post {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for Post {}

impl From<&RawPost> for Post {
    fn from(raw: &RawPost) -> Self {
        Self {
            uid: raw.uid.clone(),
            title: raw.data.title.clone(),
            subtitle: raw.data.subtitle.clone(),
            author: raw.data.author.clone(),
            first_publication_date: raw.first_publication_date,
        }
    }
}

/// Whether `uid` can name an article page directory
///
/// Only unreserved URL characters are allowed, and `.`/`..` are refused.
pub fn is_slug(uid: &str) -> bool {
    !uid.is_empty()
        && uid != "."
        && uid != ".."
        && uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

/// A document as returned by the content source, after validation
#[derive(Debug, Clone, Serialize)]
pub struct RawPost {
    /// CMS document id (used by the preview resolver)
    pub id: String,
    pub uid: String,
    pub doc_type: String,
    pub first_publication_date: Option<DateTime<Utc>>,
    pub last_publication_date: Option<DateTime<Utc>>,
    pub data: PostData,
}

/// Custom fields of a post document
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostData {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner: Option<Banner>,
    pub content: Vec<ContentSection>,
}

/// Banner image
#[derive(Debug, Clone, Serialize)]
pub struct Banner {
    pub url: String,
    pub alt: Option<String>,
}

/// One titled section of the article body
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentSection {
    pub heading: String,
    pub body: Vec<RichTextBlock>,
}

impl ContentSection {
    /// Plain text of the section body, blocks joined by a space
    pub fn body_text(&self) -> String {
        self.body
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A rich text block (paragraph, heading, list item...)
#[derive(Debug, Clone, Serialize)]
pub struct RichTextBlock {
    pub block_type: String,
    pub text: String,
}

impl RichTextBlock {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            block_type: "paragraph".to_string(),
            text: text.into(),
        }
    }
}

impl RawPost {
    /// Estimated reading time in whole minutes, rounded up
    ///
    /// Only section bodies are counted, headings are not.
    pub fn reading_time(&self, words_per_minute: usize) -> usize {
        let words: usize = self
            .data
            .content
            .iter()
            .map(|section| section.body_text().split_whitespace().count())
            .sum();
        words.div_ceil(words_per_minute.max(1))
    }

    /// Whether the document was edited after its first publication
    pub fn was_edited(&self) -> bool {
        match (self.first_publication_date, self.last_publication_date) {
            (Some(first), Some(last)) => last > first,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw_with_body(paragraphs: &[&str]) -> RawPost {
        RawPost {
            id: "doc1".to_string(),
            uid: "hello".to_string(),
            doc_type: "posts".to_string(),
            first_publication_date: None,
            last_publication_date: None,
            data: PostData {
                title: "Hello".to_string(),
                content: vec![ContentSection {
                    heading: "Heading words never count".to_string(),
                    body: paragraphs.iter().map(|p| RichTextBlock::paragraph(*p)).collect(),
                }],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_equality_by_uid() {
        let a = Post::new("a", "First title");
        let b = Post::new("a", "Another title");
        assert_eq!(a, b);
        assert_ne!(a, Post::new("b", "First title"));
    }

    #[test]
    fn test_reading_time_rounds_up() {
        let words = vec!["word"; 201].join(" ");
        let raw = raw_with_body(&[&words]);
        assert_eq!(raw.reading_time(200), 2);
        assert_eq!(raw_with_body(&["one two three"]).reading_time(200), 1);
        assert_eq!(raw_with_body(&[]).reading_time(200), 0);
    }

    #[test]
    fn test_reading_time_joins_blocks() {
        let raw = raw_with_body(&["alpha beta", "gamma"]);
        assert_eq!(raw.data.content[0].body_text(), "alpha beta gamma");
        assert_eq!(raw.reading_time(3), 1);
        assert_eq!(raw.reading_time(2), 2);
    }

    #[test]
    fn test_was_edited() {
        let mut raw = raw_with_body(&[]);
        let first = Utc.with_ymd_and_hms(2021, 3, 15, 19, 25, 28).unwrap();
        raw.first_publication_date = Some(first);
        raw.last_publication_date = Some(first);
        assert!(!raw.was_edited());
        raw.last_publication_date = Some(Utc.with_ymd_and_hms(2021, 3, 20, 8, 0, 0).unwrap());
        assert!(raw.was_edited());
    }

    #[test]
    fn test_is_slug() {
        assert!(is_slug("como-utilizar-hooks"));
        assert!(is_slug("v1.2_final~"));
        assert!(!is_slug(""));
        assert!(!is_slug("."));
        assert!(!is_slug(".."));
        assert!(!is_slug("../../escaped"));
        assert!(!is_slug("a/b"));
        assert!(!is_slug("a b"));
        assert!(!is_slug("a\\b"));
    }

    #[test]
    fn test_post_from_raw() {
        let raw = raw_with_body(&["text"]);
        let post = Post::from(&raw);
        assert_eq!(post.uid, "hello");
        assert_eq!(post.title, "Hello");
        assert_eq!(post, Post::new("hello", "Another title"));
    }
}
