//! headless-blog: a static blog front-end fed by a headless CMS
//!
//! Posts are pulled from a Prismic repository (or a local fixtures
//! file), kept in an ordered [`store::PostStore`] that answers
//! previous/next queries, and loaded page by page through a
//! [`store::PaginationController`]. The generator renders the result
//! with embedded Tera templates; the server adds content preview.

pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod helpers;
pub mod server;
pub mod source;
pub mod store;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use source::{ContentSource, MemorySource, PrismicSource};

/// The blog application
#[derive(Debug, Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
    /// Static assets copied verbatim into the output
    pub static_dir: PathBuf,
}

impl Blog {
    /// Create a blog from a directory, reading `_config.yml` when present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            let mut config = config::SiteConfig::default();
            config.apply_env();
            config
        };

        Ok(Self::with_config(base_dir, config))
    }

    /// Create a blog with an explicit configuration
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let public_dir = base_dir.join(&config.public_dir);
        let static_dir = base_dir.join(&config.static_dir);

        Self {
            config,
            base_dir,
            public_dir,
            static_dir,
        }
    }

    /// Path of the configuration file
    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join("_config.yml")
    }

    /// Open the configured content source
    ///
    /// `cms.fixtures` takes precedence over `cms.endpoint`.
    pub fn source(&self) -> Result<Arc<dyn ContentSource>> {
        let cms = &self.config.cms;
        if let Some(fixtures) = cms.fixtures.as_deref().filter(|f| !f.is_empty()) {
            let path = self.base_dir.join(fixtures);
            tracing::debug!("Using fixtures from {:?}", path);
            return Ok(Arc::new(MemorySource::from_file(&path)?));
        }

        Ok(Arc::new(PrismicSource::new(cms)?))
    }

    /// Initialize a new site
    pub fn init(&self) -> Result<()> {
        commands::init::run(self)
    }

    /// Generate the static site
    pub async fn generate(&self) -> Result<()> {
        commands::generate::run(self).await.map(|_| ())
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_new_without_config() {
        let tmp = tempfile::tempdir().unwrap();
        let blog = Blog::new(tmp.path()).unwrap();
        assert_eq!(blog.public_dir, tmp.path().join("public"));
        assert_eq!(blog.static_dir, tmp.path().join("static"));
        assert_eq!(blog.config.title, "spacetraveling");
    }

    #[test]
    fn test_new_reads_config() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("_config.yml"),
            "title: Notes\npublic_dir: out\n",
        )
        .unwrap();

        let blog = Blog::new(tmp.path()).unwrap();
        assert_eq!(blog.config.title, "Notes");
        assert_eq!(blog.public_dir, tmp.path().join("out"));
    }

    #[test]
    fn test_source_requires_configuration() {
        let tmp = tempfile::tempdir().unwrap();
        let blog = Blog::with_config(tmp.path(), config::SiteConfig::default());
        assert!(blog.source().is_err());
    }

    #[tokio::test]
    async fn test_source_from_fixtures() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("posts.json"),
            r#"{"results": [{"id": "X", "uid": "hello", "type": "posts",
                "data": {"title": "Hello", "content": []}}], "next_page": null}"#,
        )
        .unwrap();

        let mut config = config::SiteConfig::default();
        config.cms.fixtures = Some("posts.json".to_string());
        let blog = Blog::with_config(tmp.path(), config);

        let source = blog.source().unwrap();
        let post = source.get_by_uid("posts", "hello", None).await.unwrap();
        assert_eq!(post.unwrap().data.title, "Hello");
    }
}
