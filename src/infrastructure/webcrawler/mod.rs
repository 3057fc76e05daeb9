//! Web Crawler Module
//!
//! Browser-like page fetching with randomized headers and optional proxies

use rand::seq::IndexedRandom;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;

use crate::application::errors::ScrapeError;

const ACCEPT_LANGUAGES: &[&str] = &[
    "id-ID,id;q=0.9,en-US;q=0.8,en;q=0.7",
    "id-ID,id;q=0.9,en;q=0.8",
    "id,en-US;q=0.9,en;q=0.8",
];

/// Tags whose text never shows up on the rendered page
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub body: String,
}

impl FetchedPage {
    pub fn title(&self) -> Option<String> {
        page_title(&self.body)
    }
}

pub struct WebCrawler {
    client: Client,
    user_agents: Vec<String>,
    timeout: Duration,
}

impl WebCrawler {
    pub fn new(user_agents: Vec<String>, timeout: Duration) -> Result<Self, ScrapeError> {
        if user_agents.is_empty() {
            return Err(ScrapeError::Client("at least one user agent is required".to_string()));
        }

        let client = Self::client_builder(timeout)
            .build()
            .map_err(|e| ScrapeError::Client(e.to_string()))?;

        Ok(Self {
            client,
            user_agents,
            timeout,
        })
    }

    fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
    }

    /// Fetch a URL directly
    pub async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<FetchedPage, ScrapeError> {
        self.send(&self.client, url, referer).await
    }

    /// Fetch a URL through the given proxy (`host:port` or a full proxy URL)
    pub async fn fetch_via(
        &self,
        url: &str,
        referer: Option<&str>,
        proxy: &str,
    ) -> Result<FetchedPage, ScrapeError> {
        let proxy_url = if proxy.contains("://") {
            proxy.to_string()
        } else {
            format!("http://{}", proxy)
        };
        let proxy = reqwest::Proxy::all(&proxy_url)
            .map_err(|e| ScrapeError::Client(format!("invalid proxy {}: {}", proxy_url, e)))?;
        let client = Self::client_builder(self.timeout)
            .proxy(proxy)
            .build()
            .map_err(|e| ScrapeError::Client(e.to_string()))?;

        self.send(&client, url, referer).await
    }

    async fn send(&self, client: &Client, url: &str, referer: Option<&str>) -> Result<FetchedPage, ScrapeError> {
        let host = extract_domain(url)?;
        let headers = self.headers(url, referer);

        let response = client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| ScrapeError::network(&host, e))?;

        let status = response.status();
        tracing::debug!("GET {} -> {}", url, status.as_str());
        if !status.is_success() {
            return Err(ScrapeError::Status {
                source_name: host,
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| ScrapeError::network(&host, e))?;

        Ok(FetchedPage { url: final_url, body })
    }

    /// Browser-like headers with a random user agent and language
    fn headers(&self, url: &str, referer: Option<&str>) -> HeaderMap {
        let mut rng = rand::rng();
        let mut headers = HeaderMap::new();

        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        if let Some(language) = ACCEPT_LANGUAGES.choose(&mut rng) {
            headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(*language));
        }
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        if let Some(agent) = self.user_agents.choose(&mut rng) {
            if let Ok(value) = HeaderValue::from_str(agent) {
                headers.insert(header::USER_AGENT, value);
            }
        }

        let referer = referer.map(str::to_string).or_else(|| default_referer(url));
        if let Some(value) = referer.and_then(|r| HeaderValue::from_str(&r).ok()) {
            headers.insert(header::REFERER, value);
        }

        headers
    }
}

/// Extract domain from URL
pub fn extract_domain(url: &str) -> Result<String, ScrapeError> {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .ok_or_else(|| ScrapeError::Client(format!("invalid URL: {}", url)))
}

/// Site root, used as the referer when none is configured
fn default_referer(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    Some(format!("{}://{}/", parsed.scheme(), parsed.host_str()?))
}

pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let title = document.select(&selector).next()?.text().collect::<String>();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Visible text of a page, whitespace collapsed
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .map(|element| HIDDEN_TAGS.contains(&element.name()))
            .unwrap_or(false);
        if !hidden {
            parts.push(text);
        }
    }

    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://example.com/page").unwrap(), "example.com");
        assert_eq!(extract_domain("http://news.example.org/path?q=1").unwrap(), "news.example.org");
        assert!(extract_domain("not a url").is_err());
    }

    #[test]
    fn test_default_referer() {
        assert_eq!(
            default_referer("https://www.blibli.com/cari/iphone%2015").as_deref(),
            Some("https://www.blibli.com/")
        );
        assert_eq!(default_referer("nope"), None);
    }

    #[test]
    fn test_page_text_skips_scripts() {
        let html = "<html><head><title>Hasil</title><style>.a{}</style></head>\
            <body><p>iPhone 15</p><script>var price = 'Rp 1';</script>\
            <span>Rp 15.000.000</span></body></html>";
        let text = page_text(html);
        assert!(text.contains("iPhone 15 Rp 15.000.000"));
        assert!(!text.contains("var price"));
    }

    #[test]
    fn test_page_title() {
        assert_eq!(
            page_title("<html><head><title> Just a moment... </title></head></html>").as_deref(),
            Some("Just a moment...")
        );
        assert_eq!(page_title("<p>no title</p>"), None);
    }

    #[test]
    fn test_headers_are_browser_like() {
        let crawler = WebCrawler::new(vec!["TestAgent/1.0".to_string()], Duration::from_secs(5)).unwrap();
        let headers = crawler.headers("https://www.tokopedia.com/search?q=x", None);

        assert_eq!(headers[header::USER_AGENT], "TestAgent/1.0");
        assert_eq!(headers[header::REFERER], "https://www.tokopedia.com/");
        assert!(headers[header::ACCEPT_LANGUAGE].to_str().unwrap().starts_with("id"));

        let headers = crawler.headers("https://a.example/x", Some("https://b.example/"));
        assert_eq!(headers[header::REFERER], "https://b.example/");
    }

    #[test]
    fn test_requires_user_agents() {
        assert!(WebCrawler::new(Vec::new(), Duration::from_secs(5)).is_err());
    }
}
