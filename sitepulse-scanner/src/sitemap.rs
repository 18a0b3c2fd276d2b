//! Sitemap discovery.
//!
//! A sitemap URL is fetched, decompressed when it names a `.gz` file, and
//! parsed once into a [`SitemapNode`]. Index documents are followed into
//! their child sitemaps until every leaf has been read. A failing node only
//! removes its own URLs from the result; the rest of the tree is still
//! resolved.

use crate::error::{Result, ScanError};
use flate2::read::GzDecoder;
use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use reqwest::Client;
use std::collections::HashSet;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; SEO-Monitor/1.0)";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapNode {
    /// `<sitemapindex>`: locations of child sitemaps.
    Index(Vec<String>),
    /// `<urlset>`: page locations.
    Leaf(Vec<String>),
}

impl SitemapNode {
    pub fn len(&self) -> usize {
        match self {
            SitemapNode::Index(children) => children.len(),
            SitemapNode::Leaf(urls) => urls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a full resolution, with bookkeeping for the run log.
#[derive(Debug, Default, Clone)]
pub struct ResolveReport {
    pub urls: HashSet<String>,
    pub sitemaps_fetched: usize,
    pub sitemaps_failed: usize,
    pub cycles_skipped: usize,
}

/// Parse sitemap XML into an index or leaf node.
///
/// Only direct children of the root element in the sitemaps namespace are
/// read: `<sitemap><loc>` makes the document an index, `<url><loc>` a leaf.
/// A document with neither is an empty leaf.
pub fn parse_sitemap(bytes: &[u8]) -> Result<SitemapNode> {
    let mut reader = NsReader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    // (in sitemap namespace, local name) for every open element
    let mut open: Vec<(bool, String)> = Vec::new();
    let mut saw_root = false;
    let mut is_index = false;
    let mut children = Vec::new();
    let mut pages = Vec::new();
    let mut loc_text: Option<String> = None;

    loop {
        let (ns, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| ScanError::ParseError(format!("XML parse error: {}", e)))?;

        match event {
            Event::Start(e) => {
                saw_root = true;
                let in_ns = is_sitemap_ns(&ns);
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if open.len() == 1 && in_ns && name == "sitemap" {
                    is_index = true;
                }
                if open.len() == 2 && in_ns && name == "loc" {
                    loc_text = Some(String::new());
                }
                open.push((in_ns, name));
            }
            Event::Empty(e) => {
                saw_root = true;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if open.len() == 1 && is_sitemap_ns(&ns) && name == "sitemap" {
                    is_index = true;
                }
            }
            Event::Text(e) => {
                if let Some(text) = loc_text.as_mut() {
                    let unescaped = e
                        .unescape()
                        .map_err(|e| ScanError::ParseError(e.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                if let Some(text) = loc_text.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                if open.len() == 3
                    && let Some(text) = loc_text.take()
                {
                    let text = text.trim();
                    let parent = &open[1];
                    if !text.is_empty() && parent.0 {
                        match parent.1.as_str() {
                            "sitemap" => children.push(text.to_string()),
                            "url" => pages.push(text.to_string()),
                            _ => {}
                        }
                    }
                }
                open.pop();
            }
            Event::Eof => {
                if let Some((_, name)) = open.last() {
                    return Err(ScanError::ParseError(format!(
                        "unexpected end of document inside <{}>",
                        name
                    )));
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ScanError::ParseError("document has no root element".to_string()));
    }

    if is_index {
        Ok(SitemapNode::Index(children))
    } else {
        Ok(SitemapNode::Leaf(pages))
    }
}

fn is_sitemap_ns(ns: &ResolveResult) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == SITEMAP_NAMESPACE.as_bytes())
}

/// Inflate a `.gz` sitemap body. Bodies that are not gzip streams (the
/// transport already decoded them) are returned unchanged.
pub fn decompress_if_needed(url: &str, body: Vec<u8>) -> Result<Vec<u8>> {
    if !url.to_lowercase().ends_with(".gz") || !body.starts_with(&GZIP_MAGIC) {
        return Ok(body);
    }

    let mut decoder = GzDecoder::new(body.as_slice());
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| ScanError::Decompress(format!("{}: {}", url, e)))?;
    Ok(inflated)
}

pub struct SitemapResolver {
    client: Client,
}

impl SitemapResolver {
    pub fn new() -> Result<Self> {
        Self::with_settings(DEFAULT_USER_AGENT, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_settings(user_agent: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    /// Every page URL reachable from `url`, deduplicated.
    pub async fn resolve(&self, url: &str) -> HashSet<String> {
        self.resolve_with_report(url).await.urls
    }

    pub async fn resolve_with_report(&self, url: &str) -> ResolveReport {
        let mut report = ResolveReport::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut pending = vec![url.to_string()];

        while let Some(sitemap_url) = pending.pop() {
            if !visited.insert(sitemap_url.clone()) {
                warn!("Sitemap {} already visited, skipping cyclic reference", sitemap_url);
                report.cycles_skipped += 1;
                continue;
            }

            info!("Fetching sitemap: {}", sitemap_url);
            match self.fetch_node(&sitemap_url).await {
                Ok(SitemapNode::Index(child_urls)) => {
                    report.sitemaps_fetched += 1;
                    info!(
                        "Found sitemap index with {} child sitemaps",
                        child_urls.len()
                    );
                    // Reverse so children are visited in document order
                    pending.extend(child_urls.into_iter().rev());
                }
                Ok(SitemapNode::Leaf(page_urls)) => {
                    report.sitemaps_fetched += 1;
                    if page_urls.is_empty() {
                        info!("No URLs found in {}", sitemap_url);
                    } else {
                        info!("Found sitemap with {} URLs", page_urls.len());
                    }
                    report.urls.extend(page_urls);
                }
                Err(e) => {
                    report.sitemaps_failed += 1;
                    warn!("Failed to resolve sitemap {}: {}", sitemap_url, e);
                }
            }
        }

        debug!(
            "Resolution finished: {} URLs from {} sitemaps ({} failed, {} cycles skipped)",
            report.urls.len(),
            report.sitemaps_fetched,
            report.sitemaps_failed,
            report.cycles_skipped
        );
        report
    }

    /// Fetch and parse a single sitemap document.
    pub async fn fetch_node(&self, url: &str) -> Result<SitemapNode> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?.to_vec();
        let xml = decompress_if_needed(url, body)?;
        parse_sitemap(&xml)
    }
}
