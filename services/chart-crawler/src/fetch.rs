//!
//! src/fetch.rs  Andrew Belles  Oct 4th, 2025
//!
//! Defines the http client used against the listing site and the
//! source providers that turn one listing page into raw candidates.
//! Parsing is tolerant: a broken row yields a partial candidate,
//! never an error for the whole page.
//!

use async_trait::async_trait;
use reqwest::{Client, header, redirect};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::config::{HttpConfig, SourceConfig};
use crate::types::RawCandidate;
use crate::CrawlerError;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn listing_client(http: &HttpConfig) -> Result<Client, CrawlerError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("text/html"));
    client_helper(http)
        .default_headers(h)
        .user_agent(http.user_agent.as_str())
        .build()
        .map_err(|e| CrawlerError::Http(format!("build client: {e}")))
}

/// Yields the raw candidates of one fetch cycle
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawCandidate>, CrawlerError>;
}

struct ListingSelectors {
    row: Selector,
    artist: Selector,
    title: Selector,
    cover: Selector,
}

impl ListingSelectors {
    fn new() -> Result<Self, CrawlerError> {
        let parse = |s: &str| Selector::parse(s)
            .map_err(|e| CrawlerError::Parse(format!("selector {s}: {e:?}")));
        Ok( Self {
            row: parse("table.list-wrap > tbody > tr")?,
            artist: parse("a.artist")?,
            title: parse("a.albumtitle")?,
            cover: parse("a.cover img")?,
        })
    }
}

fn text_of(row: &ElementRef, sel: &Selector) -> Option<String> {
    row.select(sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Protocol-relative image paths get an explicit https scheme
fn absolute_image(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{src}")
    } else {
        src.to_string()
    }
}

pub fn detail_link(detail_base: &Url, song_id: &str) -> String {
    let mut url = detail_base.clone();
    url.query_pairs_mut().clear().append_pair("xgnm", song_id);
    url.to_string()
}

/// Pulls candidates out of one newest-songs listing document
pub fn parse_listing(html: &str, detail_base: &Url) -> Result<Vec<RawCandidate>, CrawlerError> {
    let sel = ListingSelectors::new()?;
    let document = Html::parse_document(html);

    let candidates = document.select(&sel.row)
        .map(|row| {
            let identity_key = row.value().attr("songid")
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| detail_link(detail_base, id));
            let image_url = row.select(&sel.cover)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(absolute_image);

            RawCandidate {
                artist_raw: text_of(&row, &sel.artist),
                title_raw: text_of(&row, &sel.title),
                image_url,
                identity_key,
            }
        })
        .collect();

    Ok(candidates)
}

#[derive(Clone, Debug)]
pub struct GenieChartSource {
    pub http: Client,
    pub cfg: SourceConfig
}

impl GenieChartSource {
    pub fn new(http_config: &HttpConfig, cfg: &SourceConfig) -> Result<Self, CrawlerError> {
        let http = listing_client(http_config)?;
        Ok( Self { http, cfg: cfg.clone() } )
    }

    /// GET /newest/song
    pub fn listing(&self) -> reqwest::RequestBuilder {
        self.http.get(self.cfg.listing_url.clone())
    }
}

#[async_trait]
impl SourceProvider for GenieChartSource {
    async fn fetch(&self) -> Result<Vec<RawCandidate>, CrawlerError> {
        let response = self.listing().send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::Source(format!("listing returned {status}")));
        }
        let body = response.text().await?;
        debug!(bytes = body.len(), "http.fetch.body");

        let candidates = parse_listing(&body, &self.cfg.detail_base)?;
        info!(rows = candidates.len(), url = %self.cfg.listing_url, "http.fetch.done");
        Ok(candidates)
    }
}
