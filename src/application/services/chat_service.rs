use std::sync::Arc;
use std::time::Duration;

use crate::application::services::price_service::{PriceAggregator, PriceOutcome};

/// Keywords that mark a message as a price question
pub const DEFAULT_PRICE_KEYWORDS: &[&str] = &[
    "harga",
    "berapa harga",
    "cari harga",
    "harga terbaru",
    "diskon",
    "best price",
    "murah",
    "mahal",
];

pub const NOT_A_PRICE_QUESTION: &str = "Ini bukan pertanyaan harga. Fitur lain segera ditambahkan!";

pub const USAGE: &str = "Kirim pertanyaan harga, misalnya \"berapa harga iphone 15\".\n\
/lupa <pertanyaan> - hapus harga tersimpan untuk pertanyaan itu\n\
/help - tampilkan pesan ini";

/// Service for turning chat text into replies
pub struct ChatService {
    aggregator: Arc<PriceAggregator>,
    keywords: Vec<String>,
}

impl ChatService {
    pub fn new(aggregator: Arc<PriceAggregator>) -> Self {
        Self::with_keywords(aggregator, DEFAULT_PRICE_KEYWORDS.iter().map(|k| k.to_string()))
    }

    pub fn with_keywords(aggregator: Arc<PriceAggregator>, keywords: impl IntoIterator<Item = String>) -> Self {
        Self {
            aggregator,
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Substring match against the keyword list
    pub fn is_price_question(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|keyword| text.contains(keyword.as_str()))
    }

    /// Process an incoming message and return the reply
    pub async fn handle(&self, text: &str) -> String {
        let text = text.trim();
        if let Some(command) = text.strip_prefix('/') {
            return self.handle_command(command).await;
        }

        if !self.is_price_question(text) {
            return NOT_A_PRICE_QUESTION.to_string();
        }

        tracing::info!("Price question: {}", text);
        let outcome = self.aggregator.resolve(text).await;
        render_outcome(&outcome)
    }

    async fn handle_command(&self, command: &str) -> String {
        let (name, args) = match command.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (command, ""),
        };

        match name.to_lowercase().as_str() {
            "start" | "help" => USAGE.to_string(),
            "lupa" | "forget" => {
                if args.is_empty() {
                    return "Gunakan: /lupa <pertanyaan>".to_string();
                }
                let query = self.aggregator.normalize(args);
                match self.aggregator.forget(args).await {
                    Ok(true) => format!("🗑️ Harga tersimpan untuk '{}' dihapus.", query),
                    Ok(false) => format!("ℹ️ Tidak ada harga tersimpan untuk '{}'.", query),
                    Err(e) => {
                        tracing::error!("Failed to invalidate '{}': {}", query, e);
                        format!("❌ Gagal menghapus cache: {}", e)
                    }
                }
            }
            other => format!("Perintah tidak dikenal: /{}", other),
        }
    }
}

/// User-facing text for a lookup result
pub fn render_outcome(outcome: &PriceOutcome) -> String {
    match outcome {
        PriceOutcome::Found { summary, .. } => format!("Kisaran Harga:\n{}", summary),
        PriceOutcome::NotFound { query } => {
            format!("❌ Tidak dapat menemukan harga untuk '{}'.", query)
        }
        PriceOutcome::TimedOut { query, after } => format!(
            "❌ Bot tidak bisa menemukan harga dari barang '{}' dalam {}.",
            query,
            describe_duration(*after)
        ),
    }
}

fn describe_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{} menit", secs.div_ceil(60))
    } else {
        format!("{} detik", secs.max(1))
    }
}
