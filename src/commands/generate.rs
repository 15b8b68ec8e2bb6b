//! Generate static files

use anyhow::Result;

use crate::generator::{GenerateSummary, Generator};
use crate::Blog;

/// Generate the static site from the configured content source
pub async fn run(blog: &Blog) -> Result<GenerateSummary> {
    let start = std::time::Instant::now();

    let source = blog.source()?;
    let generator = Generator::new(blog, source)?;
    let summary = generator.generate().await?;

    if !summary.skipped.is_empty() {
        tracing::warn!(
            "{} listed posts were skipped: {}",
            summary.skipped.len(),
            summary.skipped.join(", ")
        );
    }

    let duration = start.elapsed();
    tracing::info!(
        "Generated {} posts in {:.2}s",
        summary.posts,
        duration.as_secs_f64()
    );

    Ok(summary)
}
