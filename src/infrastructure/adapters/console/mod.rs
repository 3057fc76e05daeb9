//! Console adapter for local development

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::application::errors::BotError;
use crate::application::services::ChatService;

/// Lines that end the session
pub const EXIT_WORDS: &[&str] = &["/keluar", "exit", "quit"];

/// Reads questions from stdin and prints replies
pub struct ConsoleAdapter {
    name: String,
    chat: Arc<ChatService>,
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleAdapter {
    pub fn new(name: impl Into<String>, chat: Arc<ChatService>) -> Self {
        Self {
            name: name.into(),
            chat,
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// `None` on end of input
    pub async fn read_line(&self, prompt: &str) -> Option<String> {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(prompt.as_bytes()).await;
        let _ = stdout.flush().await;

        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(Some(line)) => Some(line.trim().to_string()),
            Ok(None) => None,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                None
            }
        }
    }

    pub async fn send_message(&self, text: &str) -> Result<(), BotError> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("[{}] {}\n", self.name, text).as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }

    /// Interactive loop until an exit word or end of input
    pub async fn run(&self) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");
        self.send_message(crate::application::services::chat_service::USAGE).await?;

        while let Some(line) = self.read_line("> ").await {
            if line.is_empty() {
                continue;
            }
            if is_exit(&line) {
                break;
            }

            let reply = self.chat.handle(&line).await;
            self.send_message(&reply).await?;
        }

        tracing::info!("Console session ended");
        Ok(())
    }
}

pub fn is_exit(line: &str) -> bool {
    let line = line.trim().to_lowercase();
    EXIT_WORDS.contains(&line.as_str())
}
