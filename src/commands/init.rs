//! Initialize a new blog

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::Blog;

const CONFIG: &str = r#"# Blog configuration

# Site
title: spacetraveling
author: ''
language: pt-BR
timezone: America/Sao_Paulo

# URL
url: http://localhost:4000
root: /

# Directory
public_dir: public
static_dir: static

# Rendering
date_format: DD MMM YYYY
words_per_minute: 200
load_more_label: Carregar mais posts

# Pagination
pagination_dir: page

# Server
revalidate_secs: 86400
preview_cookie: blog.preview

# Content source
cms:
  # Prismic API v2 endpoint, e.g. https://your-repo.cdn.prismic.io/api/v2
  endpoint: ''
  # Prefer the BLOG_CMS_ACCESS_TOKEN environment variable
  access_token:
  document_type: posts
  page_size: 20
  fetch: [title, subtitle, author]
  timeout_secs: 10
  # Remove to read from the endpoint above
  fixtures: fixtures/posts.json
"#;

const FIXTURES: &str = r#"{
  "page": 1,
  "total_pages": 1,
  "total_results_size": 1,
  "next_page": null,
  "results": [
    {
      "id": "YFeDrRIAACMAv0vn",
      "uid": "hello-world",
      "type": "posts",
      "first_publication_date": "2021-03-15T19:25:28+0000",
      "last_publication_date": "2021-03-15T19:25:28+0000",
      "data": {
        "title": "Hello World",
        "subtitle": "Your very first post",
        "author": "spacetraveling",
        "banner": {},
        "content": [
          {
            "heading": "Getting started",
            "body": [
              {
                "type": "paragraph",
                "text": "Point cms.endpoint at your repository and remove cms.fixtures to publish real posts.",
                "spans": []
              }
            ]
          }
        ]
      }
    }
  ]
}
"#;

const STYLE: &str = r#"* { margin: 0; padding: 0; box-sizing: border-box; }
body { background: #1a1d23; color: #d7d7d7; font-family: Inter, sans-serif; }
a { color: inherit; text-decoration: none; }
.container { max-width: 720px; margin: 0 auto; padding: 0 1rem 4rem; }
.header-content { max-width: 720px; margin: 0 auto; padding: 4rem 1rem 5rem; }
.post { display: block; margin-bottom: 3rem; }
.post h1 { color: #f8f8f8; font-size: 1.75rem; }
.post p { margin: 0.5rem 0 1.5rem; }
.info { display: flex; gap: 1.5rem; font-size: 0.875rem; color: #bbbbbb; }
.load-more { color: #ff57b2; font-weight: 600; }
.banner { width: 100%; max-height: 400px; object-fit: cover; }
.edited { font-style: italic; font-size: 0.875rem; margin-top: 1rem; }
.content section { margin-top: 4rem; }
.content h2 { color: #f8f8f8; margin-bottom: 2rem; }
.content p { line-height: 1.8; margin-bottom: 1rem; }
.post-nav { display: flex; justify-content: space-between; border-top: 1px solid #383b41; padding-top: 3rem; }
.post-nav-next { margin-left: auto; text-align: right; }
.post-nav a { display: flex; flex-direction: column; }
.post-nav small { color: #ff57b2; }
.preview-banner { margin-top: 3rem; text-align: center; }
.preview-banner a { display: inline-block; background: #ff57b2; color: #fff; padding: 1rem 2rem; border-radius: 8px; }
"#;

const LOGO: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="240" height="26" viewBox="0 0 240 26">
  <text x="0" y="20" fill="#ff57b2" font-family="Inter, sans-serif" font-size="22" font-weight="700">spacetraveling.</text>
</svg>
"##;

/// Initialize a new blog in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        anyhow::bail!("{:?} already exists", config_path);
    }

    fs::create_dir_all(target_dir.join("static/css"))?;
    fs::create_dir_all(target_dir.join("static/images"))?;
    fs::create_dir_all(target_dir.join("fixtures"))?;

    fs::write(&config_path, CONFIG)?;
    fs::write(target_dir.join("static/css/style.css"), STYLE)?;
    fs::write(target_dir.join("static/images/logo.svg"), LOGO)?;
    fs::write(target_dir.join("fixtures/posts.json"), FIXTURES)?;

    Ok(())
}

/// Run the init command with an existing blog
pub fn run(blog: &Blog) -> Result<()> {
    init_site(&blog.base_dir)
}
