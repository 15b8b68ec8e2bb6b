//! Content module - post models and the CMS document mapping

pub mod document;
mod post;

pub use document::{InvalidDocument, QueryPage};
pub use post::{is_slug, Banner, ContentSection, Post, PostData, RawPost, RichTextBlock};
