//! Rotating proxy pool
//!
//! Addresses are handed out round-robin: the head of the queue is popped and
//! put back at the tail. An address that fails `max_failures` times in a row
//! is dropped from the pool.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::application::errors::ConfigError;
use crate::domain::traits::ProxyPool;

#[derive(Debug, Clone)]
struct ProxyEntry {
    address: String,
    failures: u32,
}

pub struct RotatingProxyPool {
    entries: Mutex<VecDeque<ProxyEntry>>,
    max_failures: u32,
}

impl RotatingProxyPool {
    pub fn new(addresses: impl IntoIterator<Item = String>, max_failures: u32) -> Self {
        let mut entries: VecDeque<ProxyEntry> = VecDeque::new();
        for address in addresses {
            let address = address.trim().to_string();
            if address.is_empty() || entries.iter().any(|e| e.address == address) {
                continue;
            }
            entries.push_back(ProxyEntry { address, failures: 0 });
        }

        Self {
            entries: Mutex::new(entries),
            max_failures: max_failures.max(1),
        }
    }

    pub fn from_file(path: impl AsRef<Path>, max_failures: u32) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let pool = Self::new(read_list(path)?, max_failures);
        tracing::info!("Loaded {} proxies from {}", pool.len(), path.display());
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<ProxyEntry>> {
        // The queue stays consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One address per line; blank lines and `#` comments are skipped
pub fn read_list(path: impl AsRef<Path>) -> Result<Vec<String>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Parse(format!("Failed to read proxy list {}: {}", path.display(), e))
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

impl ProxyPool for RotatingProxyPool {
    fn next_proxy(&self) -> Option<String> {
        let mut entries = self.entries();
        let entry = entries.pop_front()?;
        let address = entry.address.clone();
        entries.push_back(entry);
        Some(address)
    }

    fn report(&self, address: &str, success: bool) {
        let mut entries = self.entries();
        let Some(index) = entries.iter().position(|e| e.address == address) else {
            return;
        };

        if success {
            entries[index].failures = 0;
            return;
        }

        entries[index].failures += 1;
        if entries[index].failures >= self.max_failures {
            entries.remove(index);
            tracing::warn!(
                "Dropping proxy {} after {} failures, {} left",
                address,
                self.max_failures,
                entries.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    fn pool(addresses: &[&str], max_failures: u32) -> RotatingProxyPool {
        RotatingProxyPool::new(addresses.iter().map(|a| a.to_string()), max_failures)
    }

    #[test]
    fn test_round_robin_rotation() {
        let pool = pool(&["a:1", "b:2", "c:3"], 3);
        let order: Vec<_> = (0..5).filter_map(|_| pool.next_proxy()).collect();
        assert_eq!(order, vec!["a:1", "b:2", "c:3", "a:1", "b:2"]);
    }

    #[test]
    fn test_empty_pool() {
        let pool = pool(&[], 3);
        assert!(pool.is_empty());
        assert_eq!(pool.next_proxy(), None);
        pool.report("nope:1", false);
    }

    #[test]
    fn test_drops_after_repeated_failures() {
        let pool = pool(&["a:1", "b:2"], 2);
        pool.report("a:1", false);
        assert_eq!(pool.len(), 2);
        pool.report("a:1", false);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.next_proxy().as_deref(), Some("b:2"));
    }

    #[test]
    fn test_success_resets_failures() {
        let pool = pool(&["a:1"], 2);
        pool.report("a:1", false);
        pool.report("a:1", true);
        pool.report("a:1", false);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_from_file_skips_comments_and_duplicates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# free list\n10.0.0.1:8080\n\n10.0.0.2:3128\n10.0.0.1:8080").unwrap();

        let pool = RotatingProxyPool::from_file(file.path(), 3).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(RotatingProxyPool::from_file("/no/such/list.txt", 3).is_err());
    }

    #[test]
    fn test_shared_across_threads() {
        let pool = Arc::new(pool(&["a:1", "b:2", "c:3"], 3));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(pool.next_proxy().is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.len(), 3);
    }
}
