use std::path::Path;

use reqwest::blocking::{multipart, Client};

use crate::config::Telegram;
use crate::error::NotificationError;

pub const DEFAULT_CAPTION: &str = "\u{26a0}\u{fe0f} Suspicious person detected";

const API_BASE: &str = "https://api.telegram.org";

/// Delivers an alert image somewhere a person will see it.
///
/// Delivery is fire-and-forget: callers log a failure and move on.
pub trait NotificationSink {
    fn send_photo(&self, path: &Path, caption: &str) -> Result<(), NotificationError>;
}

/// Telegram bot `sendPhoto`.
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
    base_url: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            chat_id: chat_id.into(),
            base_url: API_BASE.to_string(),
        }
    }

    pub fn from_config(cfg: &Telegram) -> Self {
        Self::new(cfg.token.clone(), cfg.chat_id.clone())
    }

    /// Point at another Bot API server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendPhoto",
            self.base_url.trim_end_matches('/'),
            self.token
        )
    }
}

impl NotificationSink for TelegramNotifier {
    fn send_photo(&self, path: &Path, caption: &str) -> Result<(), NotificationError> {
        if self.token.is_empty() || self.chat_id.is_empty() {
            return Err(NotificationError::NotConfigured);
        }

        let form = multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .file("photo", path)
            .map_err(|source| NotificationError::Attach {
                path: path.to_path_buf(),
                source,
            })?;

        let response = self.client.post(self.endpoint()).multipart(form).send()?;
        log::debug!("telegram sendPhoto: {}", response.status());
        Ok(())
    }
}
