//! Room bookings from BookIT.
//!
//! The bot never logs in: it is handed an opaque session cookie and sends it
//! with every GraphQL request.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{CoreError, Result};

const EVENTS_QUERY: &str = "query Events($from: DateTime!, $to: DateTime!) {
  eventsFT(from: $from, to: $to) {
    id
    title
    room
    start
    end
  }
}";

/// How far ahead `/events` looks.
pub const LOOKAHEAD: TimeDelta = TimeDelta::weeks(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingEvent {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub room: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// `room` is a list in newer API versions and a single string in older ones.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(room)) => vec![room],
        Some(OneOrMany::Many(rooms)) => rooms,
        None => Vec::new(),
    })
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<EventsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsData {
    #[serde(rename = "eventsFT")]
    events_ft: Vec<BookingEvent>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Upcoming events, soonest first, capped at `count`.
pub fn upcoming(mut events: Vec<BookingEvent>, now: DateTime<Utc>, count: usize) -> Vec<BookingEvent> {
    events.retain(|event| event.end > now);
    events.sort_by_key(|event| event.start);
    events.truncate(count);
    events
}

#[derive(Debug, Clone)]
pub struct BookitClient {
    http: reqwest::Client,
    url: String,
    cookie: String,
}

impl BookitClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            cookie: cookie.into(),
        }
    }

    /// Events overlapping `[from, to)`.
    pub async fn events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<BookingEvent>> {
        let body = json!({
            "query": EVENTS_QUERY,
            "variables": { "from": from.to_rfc3339(), "to": to.to_rfc3339() },
        });

        let response: GraphQlResponse = self
            .http
            .post(&self.url)
            .header(reqwest::header::COOKIE, &self.cookie)
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| CoreError::http(&self.url, e))?
            .json()
            .await
            .map_err(|e| CoreError::http(&self.url, e))?;

        if let Some(error) = response.errors.first() {
            return Err(CoreError::unexpected_response(&self.url, error.message.clone()));
        }
        let events = response
            .data
            .map(|data| data.events_ft)
            .ok_or_else(|| CoreError::unexpected_response(&self.url, "no data in response"))?;

        debug!(count = events.len(), "fetched BookIT events");
        Ok(events)
    }

    /// The next `count` events within [`LOOKAHEAD`].
    pub async fn future_events(&self, count: usize) -> Result<Vec<BookingEvent>> {
        let now = Utc::now();
        let events = self.events(now, now + LOOKAHEAD).await?;
        Ok(upcoming(events, now, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_graphql_events() {
        let text = r#"{"data":{"eventsFT":[
            {"id":"1","title":"Pubrunda","room":["HUBBEN","GROUP_ROOM"],"start":"2026-10-16T16:00:00Z","end":"2026-10-16T23:00:00Z"},
            {"id":"2","title":"Spelkväll","room":"HUBBEN","start":"2026-10-15T17:00:00.000Z","end":"2026-10-15T21:00:00.000Z"}
        ]}}"#;
        let response: GraphQlResponse = serde_json::from_str(text).unwrap();
        let events = response.data.unwrap().events_ft;
        assert_eq!(events[0].room, ["HUBBEN", "GROUP_ROOM"]);
        assert_eq!(events[1].room, ["HUBBEN"]);

        let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
        let next = upcoming(events, now, 1);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].title, "Spelkväll");
    }

    #[test]
    fn drops_finished_events() {
        let event = |id: &str, hour: u32| BookingEvent {
            id: id.to_string(),
            title: id.to_string(),
            room: Vec::new(),
            start: Utc.with_ymd_and_hms(2026, 10, 14, hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 10, 14, hour + 1, 0, 0).unwrap(),
        };
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 30, 0).unwrap();
        let kept = upcoming(vec![event("a", 10), event("b", 12), event("c", 14)], now, 5);
        assert_eq!(kept.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), ["b", "c"]);
    }
}
