//! HTTP collaborators: responsibility calendars, week labels and TimeSend.

use std::borrow::Cow;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::{CoreError, Result};
use crate::ical::{Calendar, parse_calendar};
use crate::rotation::{HistoryUnavailable, ResponsibleWeek, extract_history};
use crate::summary::SummaryFormat;

/// First `<time>` element of a page, the way vecka.nu presents its label.
static TIME_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<time.{0,30}>(.+?)</time>").expect("time element pattern is valid")
});

pub fn pritbot_reqwest_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("pritbot/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| CoreError::http("client", e))
}

/// Extract the text of the first `<time>` element.
pub fn extract_time_label(html: &str) -> Option<String> {
    TIME_ELEMENT
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|label| label.as_str().trim().to_string())
        .filter(|label| !label.is_empty())
}

/// The `https` address behind a `webcal` subscription link.
pub fn calendar_fetch_url(url: &str) -> Cow<'_, str> {
    const WEBCAL: &str = "webcal://";
    match url.get(..WEBCAL.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(WEBCAL) => {
            Cow::Owned(format!("https://{}", &url[WEBCAL.len()..]))
        }
        _ => Cow::Borrowed(url),
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Client for the web services the bot reads from.
#[derive(Debug, Clone)]
pub struct WebClient {
    http: reqwest::Client,
    services: ServiceConfig,
}

impl WebClient {
    pub fn new(services: ServiceConfig) -> Result<Self> {
        Ok(Self {
            http: pritbot_reqwest_client()?,
            services,
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn services(&self) -> &ServiceConfig {
        &self.services
    }

    /// Download and parse an iCalendar feed. `webcal` links are fetched over `https`.
    pub async fn fetch_calendar(&self, url: &str) -> std::result::Result<Calendar, HistoryUnavailable> {
        let url = calendar_fetch_url(url);
        let url = url.as_ref();
        let fetch = |cause| HistoryUnavailable::Fetch {
            url: url.to_string(),
            cause,
        };
        let text = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(fetch)?
            .text()
            .await
            .map_err(fetch)?;

        debug!(url, bytes = text.len(), "fetched calendar");
        parse_calendar(&text).map_err(|cause| HistoryUnavailable::Parse { cause })
    }

    /// Responsibility weeks from a guild's calendar, oldest first.
    pub async fn history(
        &self,
        url: Option<&str>,
        format: &SummaryFormat,
    ) -> std::result::Result<Vec<ResponsibleWeek>, HistoryUnavailable> {
        let url = url
            .filter(|url| !url.trim().is_empty())
            .ok_or(HistoryUnavailable::NotConfigured)?;
        let calendar = self.fetch_calendar(url).await?;
        Ok(extract_history(&calendar, format))
    }

    /// Fetch a page and read the label of its first `<time>` element.
    pub async fn scrape_week(&self, url: &str) -> Result<String> {
        let html = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| CoreError::http(url, e))?
            .text()
            .await
            .map_err(|e| CoreError::http(url, e))?;

        extract_time_label(&html)
            .ok_or_else(|| CoreError::unexpected_response(url, "no <time> element"))
    }

    /// The calendar week label, `None` when the page cannot be read.
    pub async fn week(&self) -> Option<String> {
        self.scrape_logged(&self.services.week_url).await
    }

    /// The study week label, `None` when the page cannot be read.
    pub async fn study_week(&self) -> Option<String> {
        self.scrape_logged(&self.services.study_week_url).await
    }

    async fn scrape_logged(&self, url: &str) -> Option<String> {
        match self.scrape_week(url).await {
            Ok(label) => Some(label),
            Err(e) => {
                warn!("Could not read week label: {:?}", e);
                None
            }
        }
    }

    /// Upload a calendar to TimeSend and return the shareable link.
    pub async fn upload_calendar(&self, calendar: &Calendar) -> Result<String> {
        let url = format!("{}/api/upload", self.services.timesend_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/calendar")
            .body(calendar.serialize())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| CoreError::http(&url, e))?;

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| CoreError::http(&url, e))?;
        Ok(body.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_time_element() {
        let html = r#"<html><body><time datetime="2026-W42">Vecka 42</time><time>43</time></body></html>"#;
        assert_eq!(extract_time_label(html).as_deref(), Some("Vecka 42"));
        assert_eq!(extract_time_label("<p>inget här</p>"), None);
        assert_eq!(extract_time_label("<time>  </time>"), None);
    }

    #[test]
    fn webcal_links_are_fetched_over_https() {
        assert_eq!(
            calendar_fetch_url("webcal://calendar.google.com/calendar/ical/x/basic.ics"),
            "https://calendar.google.com/calendar/ical/x/basic.ics"
        );
        assert_eq!(calendar_fetch_url("WEBCAL://example.org/a.ics"), "https://example.org/a.ics");
        assert!(matches!(
            calendar_fetch_url("https://example.org/a.ics"),
            Cow::Borrowed("https://example.org/a.ics")
        ));
        assert_eq!(calendar_fetch_url("webcal:"), "webcal:");
    }

    #[tokio::test]
    async fn missing_calendar_is_not_configured() {
        let client = WebClient::new(ServiceConfig::default()).unwrap();
        let format = SummaryFormat::default();
        assert!(matches!(
            client.history(None, &format).await,
            Err(HistoryUnavailable::NotConfigured)
        ));
        assert!(matches!(
            client.history(Some("  "), &format).await,
            Err(HistoryUnavailable::NotConfigured)
        ));
    }
}
