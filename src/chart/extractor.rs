use super::schema::ChartTagSchema;
use crate::error::ChartError;
use crate::models::{SongList, SongRecord, UNKNOWN_ARTIST, UNKNOWN_TITLE};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use ureq::Agent;

/// Page load timeout used for chart pages
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_millis(60_000);

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Produces the fully loaded markup of a chart page
#[cfg_attr(test, mockall::automock)]
pub trait PageRenderer: Send + Sync {
    fn render(&self, url: &str) -> Result<String, ChartError>;
}

/// Renderer backed by a plain HTTP GET. Works for chart pages that are
/// server-rendered; the extractor treats a page without chart items the
/// same way as a selector wait that timed out.
pub struct HttpPageRenderer {
    agent: Agent,
}

impl HttpPageRenderer {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        HttpPageRenderer { agent }
    }
}

impl Default for HttpPageRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_TIMEOUT)
    }
}

impl PageRenderer for HttpPageRenderer {
    fn render(&self, url: &str) -> Result<String, ChartError> {
        debug!(url, "fetching chart page");
        let response = self
            .agent
            .get(url)
            .set("Accept", "text/html,application/xhtml+xml")
            .set("Accept-Language", "en-US,en;q=0.9")
            .call()
            .map_err(|e| ChartError::SourceUnavailable(format!("GET {url} failed: {e}")))?;

        response
            .into_string()
            .map_err(|e| ChartError::SourceUnavailable(format!("reading {url} failed: {e}")))
    }
}

/// Scrapes ranked (title, artist) pairs from a chart page.
///
/// Only as good as the markup its renderer hands back. The default
/// `HttpPageRenderer` does a plain GET and runs no JavaScript, so charts that
/// fill their rows client-side come back without items and extract as empty.
/// Plug a browser-backed `PageRenderer` in for those.
pub struct ChartExtractor {
    renderer: Box<dyn PageRenderer>,
}

impl ChartExtractor {
    pub fn new(renderer: Box<dyn PageRenderer>) -> Self {
        Self { renderer }
    }

    /// Best-effort extraction: any render or parse failure yields an empty list.
    /// An empty list means "source unavailable".
    pub fn extract(&self, schema: &ChartTagSchema) -> SongList {
        match self.try_extract(schema) {
            Ok(songs) => songs,
            Err(e) => {
                error!(url = schema.source_url, cause = %e, "chart extraction failed");
                SongList::empty()
            }
        }
    }

    pub fn try_extract(&self, schema: &ChartTagSchema) -> Result<SongList, ChartError> {
        info!(url = schema.source_url, "scraping chart");
        let html = self.renderer.render(schema.source_url)?;
        let songs = parse_chart(&html, schema)?;
        info!(count = songs.len(), "scraped chart entries");
        Ok(songs)
    }
}

/// Extract one record per chart item, in document order.
///
/// A missing title or artist becomes a placeholder so rank slots are never dropped.
pub fn parse_chart(html: &str, schema: &ChartTagSchema) -> Result<SongList, ChartError> {
    let item_selector = selector(schema.chart_item_selector)?;
    let title_selector = selector(schema.title_selector)?;
    let artist_selector = selector(schema.artist_selector)?;

    let document = Html::parse_document(html);
    let items: Vec<ElementRef<'_>> = document.select(&item_selector).collect();
    if items.is_empty() {
        return Err(ChartError::SourceUnavailable(format!(
            "no elements match `{}`",
            schema.chart_item_selector
        )));
    }

    let songs = items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let rank = idx + 1;
            let title = first_text(item, &title_selector).unwrap_or_else(|| {
                warn!(rank, "title missing, using placeholder");
                UNKNOWN_TITLE.to_string()
            });
            let artist = first_text(item, &artist_selector).unwrap_or_else(|| {
                warn!(rank, "artist missing, using placeholder");
                UNKNOWN_ARTIST.to_string()
            });
            debug!(rank, %title, %artist, "extracted chart entry");
            SongRecord::new(title, artist)
        })
        .collect::<Vec<_>>();

    Ok(SongList::new(songs))
}

fn selector(raw: &str) -> Result<Selector, ChartError> {
    Selector::parse(raw).map_err(|e| ChartError::InvalidSelector {
        selector: raw.to_string(),
        message: e.to_string(),
    })
}

/// Whitespace-collapsed text of the first descendant matching `selector`
fn first_text(item: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let node = item.select(selector).next()?;
    let text = node.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() { None } else { Some(text) }
}
