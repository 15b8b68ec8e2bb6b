//! Built-in blog templates using the Tera template engine
//!
//! Templates are embedded in the binary. Text coming from the CMS is
//! autoescaped; nothing in the templates expects raw HTML.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{Post, RawPost};
use crate::helpers::{format_in_zone, post_url, url_for};

/// Template renderer with the embedded blog theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("blog/layout.html")),
            ("index.html", include_str!("blog/index.html")),
            ("post.html", include_str!("blog/post.html")),
            ("preview.html", include_str!("blog/preview.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("blog/partials/header.html"),
            ),
            (
                "partials/post_nav.html",
                include_str!("blog/partials/post_nav.html"),
            ),
            (
                "partials/preview_banner.html",
                include_str!("blog/partials/preview_banner.html"),
            ),
        ])?;

        tera.register_filter(
            "date_format",
            DateFormatFilter {
                tz: config.tz(),
                format: config.date_format.clone(),
                language: config.language.clone(),
            },
        );

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: format an RFC 3339 timestamp for display
///
/// Takes an optional `format` argument overriding the site date format.
struct DateFormatFilter {
    tz: Option<chrono_tz::Tz>,
    format: String,
    language: String,
}

impl tera::Filter for DateFormatFilter {
    fn filter(
        &self,
        value: &tera::Value,
        args: &HashMap<String, tera::Value>,
    ) -> tera::Result<tera::Value> {
        let s = tera::try_get_value!("date_format", "value", String, value);
        let format = match args.get("format") {
            Some(val) => tera::try_get_value!("date_format", "format", String, val),
            None => self.format.clone(),
        };

        let date = chrono::DateTime::parse_from_rfc3339(&s)
            .map_err(|e| tera::Error::msg(format!("date_format: bad date {:?}: {}", s, e)))?
            .with_timezone(&chrono::Utc);

        Ok(tera::Value::String(format_in_zone(
            &date,
            self.tz,
            &format,
            &self.language,
        )))
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub author: String,
    pub language: String,
    pub root: String,
}

impl SiteData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            author: config.author.clone(),
            language: config.language.clone(),
            root: url_for(config, ""),
        }
    }
}

/// One entry of the listing
#[derive(Debug, Clone, Serialize)]
pub struct ListingPost {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    /// RFC 3339, formatted by the `date_format` filter
    pub date: Option<String>,
    pub path: String,
}

impl ListingPost {
    pub fn new(config: &SiteConfig, post: &Post) -> Self {
        Self {
            uid: post.uid.clone(),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date: post.first_publication_date.map(|d| d.to_rfc3339()),
            path: post_url(config, &post.uid),
        }
    }
}

/// Link to a neighbouring post
#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub path: String,
}

impl NavPost {
    pub fn new(config: &SiteConfig, post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            path: post_url(config, &post.uid),
        }
    }
}

/// A full article
#[derive(Debug, Clone, Serialize)]
pub struct ArticleData {
    pub uid: String,
    pub title: String,
    pub author: String,
    pub date: Option<String>,
    /// Set only when the post changed after its first publication
    pub edited_at: Option<String>,
    pub reading_time: usize,
    pub banner_url: Option<String>,
    pub banner_alt: String,
    pub sections: Vec<SectionData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionData {
    pub heading: String,
    pub blocks: Vec<BlockData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockData {
    /// HTML element name
    pub tag: &'static str,
    pub text: String,
}

impl ArticleData {
    pub fn new(config: &SiteConfig, raw: &RawPost) -> Self {
        let sections = raw
            .data
            .content
            .iter()
            .map(|section| SectionData {
                heading: section.heading.clone(),
                blocks: section
                    .body
                    .iter()
                    .map(|block| BlockData {
                        tag: block_tag(&block.block_type),
                        text: block.text.clone(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            uid: raw.uid.clone(),
            title: raw.data.title.clone(),
            author: raw.data.author.clone(),
            date: raw.first_publication_date.map(|d| d.to_rfc3339()),
            edited_at: raw
                .last_publication_date
                .filter(|_| raw.was_edited())
                .map(|d| d.to_rfc3339()),
            reading_time: raw.reading_time(config.words_per_minute),
            banner_url: raw.data.banner.as_ref().map(|b| b.url.clone()),
            banner_alt: raw
                .data
                .banner
                .as_ref()
                .and_then(|b| b.alt.clone())
                .unwrap_or_else(|| "banner".to_string()),
            sections,
        }
    }
}

/// Element used for a rich text block type
fn block_tag(block_type: &str) -> &'static str {
    match block_type {
        "heading1" => "h1",
        "heading2" => "h2",
        "heading3" => "h3",
        "heading4" => "h4",
        "heading5" => "h5",
        "heading6" => "h6",
        "preformatted" => "pre",
        _ => "p",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentSection, PostData, RichTextBlock};
    use chrono::{TimeZone, Utc};

    fn render_with(template: &str, context: &Context) -> String {
        let renderer = TemplateRenderer::new(&SiteConfig::default()).unwrap();
        renderer.render(template, context).unwrap()
    }

    fn article() -> RawPost {
        RawPost {
            id: "X".to_string(),
            uid: "hooks".to_string(),
            doc_type: "posts".to_string(),
            first_publication_date: Some(Utc.with_ymd_and_hms(2021, 3, 15, 19, 25, 28).unwrap()),
            last_publication_date: Some(Utc.with_ymd_and_hms(2021, 3, 25, 19, 25, 28).unwrap()),
            data: PostData {
                title: "Como utilizar <Hooks>".to_string(),
                subtitle: String::new(),
                author: "Joseph".to_string(),
                banner: None,
                content: vec![ContentSection {
                    heading: "Intro".to_string(),
                    body: vec![
                        RichTextBlock::paragraph("Lorem ipsum"),
                        RichTextBlock {
                            block_type: "heading3".to_string(),
                            text: "Sub".to_string(),
                        },
                    ],
                }],
            },
        }
    }

    #[test]
    fn test_block_tag() {
        assert_eq!(block_tag("heading2"), "h2");
        assert_eq!(block_tag("list-item"), "p");
    }

    #[test]
    fn test_render_listing() {
        let config = SiteConfig::default();
        let mut post = Post::new("hooks", "Como utilizar Hooks");
        post.author = "Joseph".to_string();
        post.first_publication_date = Some(Utc.with_ymd_and_hms(2021, 3, 15, 12, 0, 0).unwrap());

        let mut context = Context::new();
        context.insert("site", &SiteData::from_config(&config));
        context.insert("preview", &false);
        context.insert("posts", &vec![ListingPost::new(&config, &post)]);
        context.insert("load_more_link", &Some("/page/2/"));
        context.insert("load_more_label", &config.load_more_label);

        let html = render_with("index.html", &context);
        assert!(html.contains(r#"href="/post/hooks/""#));
        assert!(html.contains("15 mar 2021"));
        assert!(html.contains("Carregar mais posts"));
        assert!(!html.contains("preview-banner"));
    }

    #[test]
    fn test_render_listing_without_more() {
        let config = SiteConfig::default();
        let mut context = Context::new();
        context.insert("site", &SiteData::from_config(&config));
        context.insert("preview", &true);
        context.insert("posts", &Vec::<ListingPost>::new());
        context.insert("load_more_link", &None::<String>);
        context.insert("load_more_label", &config.load_more_label);

        let html = render_with("index.html", &context);
        assert!(!html.contains("load-more"));
        assert!(html.contains("preview-banner"));
    }

    #[test]
    fn test_render_article() {
        let config = SiteConfig::default();
        let data = ArticleData::new(&config, &article());
        assert!(data.edited_at.is_some());
        assert_eq!(data.reading_time, 1);

        let mut context = Context::new();
        context.insert("site", &SiteData::from_config(&config));
        context.insert("preview", &false);
        context.insert("post", &data);
        context.insert("prev_post", &None::<NavPost>);
        context.insert(
            "next_post",
            &Some(NavPost::new(&config, &Post::new("next-one", "Next one"))),
        );

        let html = render_with("post.html", &context);
        assert!(html.contains("Como utilizar &lt;Hooks&gt;"));
        assert!(html.contains("<h3>Sub</h3>"));
        assert!(html.contains("<p>Lorem ipsum</p>"));
        assert!(html.contains("1 min"));
        assert!(html.contains("editado em"));
        assert!(html.contains("25 mar 2021, 19:25"));
        assert!(html.contains(r#"href="/post/next-one/""#));
        assert!(!html.contains("post-nav-prev"));
    }
}
