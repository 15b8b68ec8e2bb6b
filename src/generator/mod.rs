//! Generator module - renders the blog into static HTML files
//!
//! A generation run is one listing session: a fresh [`PostStore`] is
//! seeded with the first CMS page, then the pagination controller is
//! drained page by page. Every page loaded becomes a cumulative
//! listing page (`/page/N/` shows pages 1..=N, exactly what a reader
//! sees after pressing "load more" N-1 times), and once the store is
//! complete every post gets an article page whose previous/next links
//! come from the store.

use anyhow::{Context as _, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tera::Context;
use walkdir::WalkDir;

use crate::content::{is_slug, Post, RawPost};
use crate::helpers::{date_xml, encode_segment, full_url_for, listing_url, post_url};
use crate::source::ContentSource;
use crate::store::{PaginationController, PostStore};
use crate::templates::{ArticleData, ListingPost, NavPost, SiteData, TemplateRenderer};
use crate::Blog;

/// What a generation run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    pub posts: usize,
    pub listing_pages: usize,
    pub articles: usize,
    /// Listed posts whose document could not be fetched
    pub skipped: Vec<String>,
}

/// Entry of `posts.json`
#[derive(Debug, Serialize)]
struct PostIndexEntry<'a> {
    uid: &'a str,
    title: &'a str,
    subtitle: &'a str,
    author: &'a str,
    first_publication_date: Option<String>,
    url: String,
}

/// Static site generator using Tera templates
pub struct Generator {
    blog: Blog,
    source: Arc<dyn ContentSource>,
    renderer: TemplateRenderer,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog, source: Arc<dyn ContentSource>) -> Result<Self> {
        let renderer = TemplateRenderer::new(&blog.config)?;

        Ok(Self {
            blog: blog.clone(),
            source,
            renderer,
        })
    }

    /// The blog this generator renders
    pub fn blog(&self) -> &Blog {
        &self.blog
    }

    /// The content source pages are loaded from
    pub fn source(&self) -> Arc<dyn ContentSource> {
        self.source.clone()
    }

    /// Generate the entire site
    pub async fn generate(&self) -> Result<GenerateSummary> {
        let public_dir = &self.blog.public_dir;
        fs::create_dir_all(public_dir)
            .with_context(|| format!("Failed to create {:?}", public_dir))?;

        // Copy static assets (stylesheet, logo...)
        self.copy_static_assets()?;

        let store = PostStore::new();
        let controller = PaginationController::load_first_page(
            store.clone(),
            self.source.clone(),
            &self.blog.config.cms,
            None,
        )
        .await
        .context("Failed to load the first page of posts")?;

        let mut summary = GenerateSummary::default();

        // Listing pages, one per loaded CMS page
        let mut page_num = 1;
        loop {
            self.write_listing_page(&store, page_num, controller.has_more())?;
            summary.listing_pages += 1;

            if !controller.has_more() {
                break;
            }
            controller
                .load_more()
                .await
                .with_context(|| format!("Failed to load page {}", page_num + 1))?;
            page_num += 1;
        }

        // Article pages
        let posts = store.posts();
        summary.posts = posts.len();
        for post in &posts {
            // Sources built from in-memory posts skip document validation
            if !is_slug(&post.uid) {
                tracing::warn!("Post uid {:?} cannot name a page, skipping", post.uid);
                summary.skipped.push(post.uid.clone());
                continue;
            }

            let doc = self
                .source
                .get_by_uid(&self.blog.config.cms.document_type, &post.uid, None)
                .await
                .with_context(|| format!("Failed to fetch post {:?}", post.uid))?;

            match doc {
                Some(raw) => {
                    let html = self.render_article(&raw, &store, false)?;
                    self.write_page(&format!("post/{}/", encode_segment(&post.uid)), &html)?;
                    summary.articles += 1;
                }
                None => {
                    tracing::warn!("Post {:?} is listed but could not be fetched", post.uid);
                    summary.skipped.push(post.uid.clone());
                }
            }
        }

        self.write_post_index(&posts)?;

        // End of the listing session
        store.reset();

        tracing::info!(
            "Generated {} listing pages and {} articles",
            summary.listing_pages,
            summary.articles
        );
        Ok(summary)
    }

    /// Render the listing for the posts currently in `store`
    pub fn render_listing(&self, store: &PostStore, next_page: Option<usize>, preview: bool) -> Result<String> {
        let config = &self.blog.config;
        let posts: Vec<ListingPost> = store
            .posts()
            .iter()
            .map(|p| ListingPost::new(config, p))
            .collect();

        let mut context = self.create_base_context(preview);
        context.insert("posts", &posts);
        context.insert("load_more_link", &next_page.map(|n| listing_url(config, n)));
        context.insert("load_more_label", &config.load_more_label);

        self.renderer.render("index.html", &context)
    }

    /// Render an article page, with navigation taken from `store`
    pub fn render_article(&self, raw: &RawPost, store: &PostStore, preview: bool) -> Result<String> {
        let config = &self.blog.config;
        let prev_post = store
            .get_previous_post(&raw.uid)
            .map(|p| NavPost::new(config, &p));
        let next_post = store
            .get_next_post(&raw.uid)
            .map(|p| NavPost::new(config, &p));

        let mut context = self.create_base_context(preview);
        context.insert("post", &ArticleData::new(config, raw));
        context.insert("prev_post", &prev_post);
        context.insert("next_post", &next_post);

        self.renderer.render("post.html", &context)
    }

    /// Render the document that completes the preview handshake
    pub fn render_preview_redirect(&self, redirect: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("redirect", redirect);
        self.renderer.render("preview.html", &context)
    }

    /// Create a base context with common variables
    fn create_base_context(&self, preview: bool) -> Context {
        let mut context = Context::new();
        context.insert("site", &SiteData::from_config(&self.blog.config));
        context.insert("preview", &preview);
        context
    }

    fn write_listing_page(&self, store: &PostStore, page_num: usize, has_more: bool) -> Result<()> {
        let next_page = has_more.then_some(page_num + 1);
        let html = self.render_listing(store, next_page, false)?;

        let path = if page_num == 1 {
            String::new()
        } else {
            format!("{}/{}/", self.blog.config.pagination_dir, page_num)
        };
        self.write_page(&path, &html)
    }

    /// Write `html` as `{public_dir}/{path}index.html`
    fn write_page(&self, path: &str, html: &str) -> Result<()> {
        let clean_path = path.trim_start_matches('/');
        let output_path = self.blog.public_dir.join(clean_path).join("index.html");
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create dir {:?}: {}", parent, e))?;
        }
        fs::write(&output_path, html)
            .map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", output_path, e))?;
        tracing::debug!("Generated: {:?}", output_path);
        Ok(())
    }

    /// Generate the listing snapshot (JSON)
    fn write_post_index(&self, posts: &[Post]) -> Result<()> {
        let config = &self.blog.config;
        let entries: Vec<PostIndexEntry> = posts
            .iter()
            .map(|p| PostIndexEntry {
                uid: &p.uid,
                title: &p.title,
                subtitle: &p.subtitle,
                author: &p.author,
                first_publication_date: p.first_publication_date.map(|d| date_xml(&d)),
                url: full_url_for(config, &post_url(config, &p.uid)),
            })
            .collect();

        let output_path = self.blog.public_dir.join("posts.json");
        fs::write(&output_path, serde_json::to_string_pretty(&entries)?)?;
        tracing::debug!("Generated posts.json");
        Ok(())
    }

    /// Copy the static directory into the public directory
    fn copy_static_assets(&self) -> Result<()> {
        let static_dir = &self.blog.static_dir;
        if !static_dir.exists() {
            return Ok(());
        }

        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || is_hidden(path) {
                continue;
            }

            let relative = path.strip_prefix(static_dir)?;
            let dest = self.blog.public_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)?;
        }

        Ok(())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
