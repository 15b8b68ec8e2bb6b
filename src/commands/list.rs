//! List site content

use anyhow::Result;

use crate::store::{PaginationController, PostStore};
use crate::Blog;

/// List site content by type
pub async fn run(blog: &Blog, content_type: &str) -> Result<()> {
    match content_type {
        "post" | "posts" => {
            let source = blog.source()?;
            let store = PostStore::new();
            let controller = PaginationController::load_first_page(
                store.clone(),
                source,
                &blog.config.cms,
                None,
            )
            .await?;
            controller.load_all().await?;

            let posts = store.posts();
            println!("Posts ({}):", posts.len());
            for post in posts {
                let date = post
                    .first_publication_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "----------".to_string());
                println!("  {} - {} [{}]", date, post.title, post.uid);
            }
        }
        "route" | "routes" => {
            println!("Routes:");
            let paging = format!("/{}/:n/", blog.config.pagination_dir);
            for route in ["/", &paging, "/post/:uid/", "/api/preview", "/api/exit-preview"] {
                println!("  {}", route);
            }
        }
        _ => {
            anyhow::bail!("Unknown type: {}. Available: post, route", content_type);
        }
    }

    Ok(())
}
