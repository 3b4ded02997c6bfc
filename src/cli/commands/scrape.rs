//! Review page scraping command.

use std::path::PathBuf;

use console::style;

use crate::config::Settings;
use crate::scrapers::{PageQuery, Requester, ReviewScraper};
use crate::storage::JsonlSink;

pub async fn cmd_scrape(
    settings: &Settings,
    app_id: u64,
    query: PageQuery,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| settings.output.clone());
    let sink = JsonlSink::open(&output).await?;

    let requester = Requester::new(settings.requester_config())?;
    let scraper = ReviewScraper::with_base_url(requester, &settings.reviews_url);

    let summary = scraper.scrape_page(app_id, &query, &sink).await?;

    eprintln!(
        "{} Saved {} reviews for app {} to {}",
        style("✓").green(),
        summary.saved,
        app_id,
        sink.path().display()
    );
    if let Some(total) = summary.total_reviews {
        eprintln!("  {} Total reviews: {}", style("→").dim(), total);
    }
    if let Some(cursor) = summary.cursor {
        eprintln!("  {} Next cursor: {}", style("→").dim(), cursor);
    }
    Ok(())
}
