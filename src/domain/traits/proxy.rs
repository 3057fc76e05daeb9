/// ProxyPool trait - rotating egress addresses
///
/// Implementations synchronize internally; scrapers for different sources
/// call into the same pool concurrently.
pub trait ProxyPool: Send + Sync {
    /// Next address to try (`host:port` or a full proxy URL), `None` when empty
    fn next_proxy(&self) -> Option<String>;

    /// Feedback after using an address
    fn report(&self, address: &str, success: bool);
}
