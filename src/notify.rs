//! Push notification from the process that runs migrations.
//!
//! Delivery is best effort. The receiving side's signature check is what keeps the
//! mapping correct; this only shortens the time until it refreshes.

use reqwest::blocking::Client;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::Result;
use crate::settings::{normalize_api_prefix, Settings};

pub const REFRESH_PATH: &str = "/_internal/refresh-mapping";
pub const TOKEN_HEADER: &str = "x-internal-token";

#[derive(Clone, Debug)]
pub struct RefreshNotifier {
    url: String,
    token: String,
    timeout: Duration,
}

impl RefreshNotifier {
    pub fn new(url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let url = format!(
            "{}{}{}",
            settings.internal.internal_url.trim_end_matches('/'),
            normalize_api_prefix(&settings.api_prefix),
            REFRESH_PATH
        );
        Self::new(
            url,
            settings.internal.refresh_token.clone(),
            settings.internal.notify_timeout(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends the notification from a separate thread. Failures are logged, never
    /// returned; the handle can be dropped to detach.
    pub fn notify(&self) -> JoinHandle<()> {
        let notifier = self.clone();
        thread::spawn(move || match notifier.deliver() {
            Ok((status, body)) if (200..300).contains(&status) => {
                tracing::info!(status, %body, "notified query side to refresh mapping");
            }
            Ok((status, body)) => {
                tracing::warn!(status, %body, "refresh notification rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %notifier.url, "failed to notify query side to refresh mapping");
            }
        })
    }

    fn deliver(&self) -> Result<(u16, String)> {
        let client = Client::builder().timeout(self.timeout).build()?;

        let mut request = client.post(&self.url);
        if !self.token.is_empty() {
            request = request.header(TOKEN_HEADER, &self.token);
        }

        let response = request.send()?;
        let status = response.status().as_u16();
        let body: String = response.text()?.chars().take(200).collect();

        Ok((status, body))
    }
}
