//! Proxy fallback against local HTTP servers
//! Run with: cargo test --test proxy_fallback_test

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use harga_bot::application::errors::ScrapeError;
use harga_bot::application::services::{AggregatorContext, PriceAggregator, PriceOutcome};
use harga_bot::domain::entities::{NormalizedQuery, PriceSummary};
use harga_bot::domain::rules::QueryNormalizer;
use harga_bot::domain::traits::{ProxyPool, SourceScraper};
use harga_bot::infrastructure::cache::MemoryCache;
use harga_bot::infrastructure::config::{Config, SourceConfig};
use harga_bot::infrastructure::proxy::RotatingProxyPool;
use harga_bot::infrastructure::sources::{sources_from_config, SearchPageScraper};
use harga_bot::infrastructure::webcrawler::WebCrawler;

const PRICE_PAGE: &str = "<html><head><title>Hasil pencarian</title></head>\
    <body><div>iPhone 15</div><div>Rp 15.000.000</div><div>Rp 15.200.000</div></body></html>";

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Accepts connections and never answers
async fn silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Answers every request with a fixed status and body. Also serves as a
/// forward proxy: the absolute-form request line is ignored.
struct PageServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl PageServer {
    async fn start(status: &'static str, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let body = body.to_string();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let counter = Arc::clone(&counter);
                let body = body.clone();
                tokio::spawn(async move {
                    if read_request(&mut socket).await.is_empty() {
                        return;
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, hits }
    }

    fn address(&self) -> String {
        self.addr.to_string()
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                request.extend_from_slice(&chunk[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&request).into_owned()
}

/// Round-robin pool that remembers every report
struct RecordingPool {
    addresses: Vec<String>,
    next: AtomicUsize,
    reports: Mutex<Vec<(String, bool)>>,
}

impl RecordingPool {
    fn new(addresses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            addresses,
            next: AtomicUsize::new(0),
            reports: Mutex::new(Vec::new()),
        })
    }

    fn reports(&self) -> Vec<(String, bool)> {
        self.reports.lock().unwrap().clone()
    }
}

impl ProxyPool for RecordingPool {
    fn next_proxy(&self) -> Option<String> {
        if self.addresses.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::SeqCst) % self.addresses.len();
        Some(self.addresses[index].clone())
    }

    fn report(&self, address: &str, success: bool) {
        self.reports.lock().unwrap().push((address.to_string(), success));
    }
}

fn local_source(direct: SocketAddr) -> SourceConfig {
    SourceConfig {
        name: "lokal".to_string(),
        search_url: format!("http://{}/cari/{{query}}", direct),
        referer: None,
        price_selector: None,
        price_prefix: None,
        challenge_markers: vec!["captcha".to_string()],
        use_proxy: true,
        enabled: true,
    }
}

fn scraper(direct: SocketAddr, pool: Arc<dyn ProxyPool>, max_attempts: u32) -> SearchPageScraper {
    let crawler = WebCrawler::new(vec!["TestAgent/1.0".to_string()], Duration::from_millis(500)).unwrap();
    SearchPageScraper::new(local_source(direct), Arc::new(crawler))
        .unwrap()
        .with_proxies(pool, max_attempts)
}

fn query() -> NormalizedQuery {
    QueryNormalizer::default().normalize("berapa harga iphone 15")
}

fn listed_prices() -> Vec<String> {
    vec!["Rp 15.000.000".to_string(), "Rp 15.200.000".to_string()]
}

#[tokio::test]
async fn test_hanging_direct_fetch_falls_back_to_proxy() {
    ensure_init();
    let direct = silent_server().await;
    let proxy = PageServer::start("200 OK", PRICE_PAGE).await;
    let pool = RecordingPool::new(vec![proxy.address()]);

    let tokens = scraper(direct, pool.clone(), 3).fetch(&query()).await.unwrap();

    assert_eq!(tokens, listed_prices());
    assert_eq!(pool.reports(), vec![(proxy.address(), true)]);
    assert_eq!(proxy.hits(), 1);
}

#[tokio::test]
async fn test_challenge_page_falls_back_to_proxy() {
    ensure_init();
    let direct = PageServer::start(
        "200 OK",
        "<html><head><title>Verify CAPTCHA</title></head><body>Rp 99.000</body></html>",
    )
    .await;
    let proxy = PageServer::start("200 OK", PRICE_PAGE).await;
    let pool = RecordingPool::new(vec![proxy.address()]);

    let tokens = scraper(direct.addr, pool.clone(), 3).fetch(&query()).await.unwrap();

    assert_eq!(tokens, listed_prices());
    assert_eq!(direct.hits(), 1);
    assert_eq!(pool.reports(), vec![(proxy.address(), true)]);
}

#[tokio::test]
async fn test_each_proxy_attempt_is_reported() {
    ensure_init();
    let direct = PageServer::start("503 Service Unavailable", "busy").await;
    let bad_gateway = PageServer::start("502 Bad Gateway", "").await;
    let stripped = PageServer::start("200 OK", "<html><body>Produk tidak ditemukan</body></html>").await;
    let good = PageServer::start("200 OK", PRICE_PAGE).await;
    let pool = RecordingPool::new(vec![bad_gateway.address(), stripped.address(), good.address()]);

    let tokens = scraper(direct.addr, pool.clone(), 5).fetch(&query()).await.unwrap();

    assert_eq!(tokens, listed_prices());
    assert_eq!(
        pool.reports(),
        vec![
            (bad_gateway.address(), false),
            (stripped.address(), false),
            (good.address(), true),
        ]
    );
}

#[tokio::test]
async fn test_failing_proxies_stop_at_max_attempts() {
    ensure_init();
    let direct = PageServer::start("503 Service Unavailable", "busy").await;
    let first = PageServer::start("502 Bad Gateway", "").await;
    let second = PageServer::start("502 Bad Gateway", "").await;
    let pool = RecordingPool::new(vec![first.address(), second.address()]);

    let err = scraper(direct.addr, pool.clone(), 3).fetch(&query()).await.unwrap_err();

    assert!(matches!(err, ScrapeError::ProxyExhausted { attempts: 3, .. }), "{:?}", err);
    let reports = pool.reports();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|(_, success)| !success));
    assert_eq!((first.hits(), second.hits()), (2, 1));
}

#[tokio::test]
async fn test_no_proxy_traffic_when_direct_fetch_succeeds() {
    ensure_init();
    let direct = PageServer::start("200 OK", PRICE_PAGE).await;
    let proxy = PageServer::start("200 OK", PRICE_PAGE).await;
    let pool = RecordingPool::new(vec![proxy.address()]);

    let tokens = scraper(direct.addr, pool.clone(), 3).fetch(&query()).await.unwrap();

    assert_eq!(tokens, listed_prices());
    assert!(pool.reports().is_empty());
    assert_eq!(proxy.hits(), 0);
}

#[tokio::test]
async fn test_configured_timeouts_leave_room_for_proxies() {
    ensure_init();
    let direct = silent_server().await;
    let proxy = PageServer::start("200 OK", PRICE_PAGE).await;

    let mut config = Config::default();
    config.sources = vec![local_source(direct)];
    config.scraping.source_timeout_secs = 3;
    config.scraping.request_timeout_secs = 1;
    config.scraping.max_proxy_attempts = 2;
    config.scraping.overall_timeout_secs = 10;
    config.validate().unwrap();

    let pool: Arc<dyn ProxyPool> = Arc::new(RotatingProxyPool::new(vec![proxy.address()], 3));
    let scrapers: Vec<Arc<dyn SourceScraper>> = sources_from_config(&config, Some(pool)).unwrap();
    let prices = PriceAggregator::new(
        AggregatorContext::new(Arc::new(MemoryCache::new(config.cache_ttl())))
            .with_normalizer(config.normalizer())
            .with_cleaner(config.cleaner())
            .with_filter(config.outlier_filter())
            .with_scrapers(scrapers)
            .with_timeouts(config.source_timeout(), config.overall_timeout()),
    );

    let outcome = prices.resolve("berapa harga iphone 15").await;
    assert_eq!(
        outcome.summary(),
        Some(&PriceSummary {
            min: 15_000_000,
            max: 15_200_000,
            avg: 15_100_000,
        })
    );
    assert!(matches!(outcome, PriceOutcome::Found { cached: false, .. }));
    assert_eq!(proxy.hits(), 1);

    // A request budget as long as the source budget is refused up front
    config.scraping.request_timeout_secs = config.scraping.source_timeout_secs;
    assert!(config.validate().is_err());
}
