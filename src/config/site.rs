//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable that overrides `cms.access_token`
pub const ACCESS_TOKEN_ENV: &str = "BLOG_CMS_ACCESS_TOKEN";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub author: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub public_dir: String,
    pub static_dir: String,

    // Rendering
    pub date_format: String,
    pub words_per_minute: usize,
    pub load_more_label: String,

    // Pagination
    pub pagination_dir: String,

    // Server
    pub revalidate_secs: u64,
    pub preview_cookie: String,

    // Content source
    #[serde(default)]
    pub cms: CmsConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            author: String::new(),
            language: "pt-BR".to_string(),
            timezone: String::new(),

            url: "http://localhost:4000".to_string(),
            root: "/".to_string(),

            public_dir: "public".to_string(),
            static_dir: "static".to_string(),

            date_format: "DD MMM YYYY".to_string(),
            words_per_minute: 200,
            load_more_label: "Carregar mais posts".to_string(),

            pagination_dir: "page".to_string(),

            revalidate_secs: 60 * 60 * 24,
            preview_cookie: "blog.preview".to_string(),

            cms: CmsConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {:?}", path.as_ref()))?;
        let mut config: SiteConfig = serde_yaml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                tracing::debug!("Using CMS access token from {}", ACCESS_TOKEN_ENV);
                self.cms.access_token = Some(token);
            }
        }
    }

    /// Parsed display timezone, `None` means UTC
    pub fn tz(&self) -> Option<chrono_tz::Tz> {
        if self.timezone.is_empty() {
            return None;
        }
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                tracing::warn!("Unknown timezone {:?}, falling back to UTC", self.timezone);
                None
            }
        }
    }
}

/// Headless CMS connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    /// Prismic API v2 endpoint, e.g. `https://repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: Option<String>,
    pub document_type: String,
    pub page_size: usize,
    /// Fields requested for listing queries (without the type prefix)
    pub fetch: Vec<String>,
    pub timeout_secs: u64,
    /// Serve documents from a local search-response JSON file instead
    pub fixtures: Option<String>,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "posts".to_string(),
            page_size: 20,
            fetch: vec![
                "title".to_string(),
                "subtitle".to_string(),
                "author".to_string(),
            ],
            timeout_secs: 10,
            fixtures: None,
        }
    }
}

impl CmsConfig {
    /// Fetch fields qualified with the document type (`posts.title`)
    pub fn qualified_fetch(&self) -> Vec<String> {
        self.fetch
            .iter()
            .map(|f| format!("{}.{}", self.document_type, f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.title, "spacetraveling");
        assert_eq!(config.cms.page_size, 20);
        assert_eq!(config.cms.document_type, "posts");
        assert_eq!(config.revalidate_secs, 86400);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: My Blog
author: Test User
timezone: America/Sao_Paulo
cms:
  endpoint: https://example.cdn.prismic.io/api/v2
  page_size: 5
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "My Blog");
        assert_eq!(config.author, "Test User");
        assert_eq!(config.cms.endpoint, "https://example.cdn.prismic.io/api/v2");
        assert_eq!(config.cms.page_size, 5);
        // Unset nested keys keep their defaults
        assert_eq!(config.cms.document_type, "posts");
        assert_eq!(config.tz(), Some(chrono_tz::America::Sao_Paulo));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let yaml = "title: Old Site\ntheme: landscape\nper_page: 10\n";
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "Old Site");
        assert_eq!(config.cms.page_size, 20);
    }

    #[test]
    fn test_qualified_fetch() {
        let cms = CmsConfig::default();
        assert_eq!(
            cms.qualified_fetch(),
            vec!["posts.title", "posts.subtitle", "posts.author"]
        );
    }

    #[test]
    fn test_unknown_timezone_is_utc() {
        let config = SiteConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert_eq!(config.tz(), None);
    }
}
