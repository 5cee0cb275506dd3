//! Icecast stats payload normalisation
//!
//! Icecast's `status-json.xsl` reports sources under `icestats.source`, which
//! is a single object with one mount, an array with several, and missing
//! entirely when nothing is streaming:
//!
//! ```json
//! { "icestats": { "source": { "listenurl": "http://radio:8000/live",
//!                             "listeners": 12, "listener_peak": 40 } } }
//! ```

use onair_common::events::StreamStats;
use serde::Deserialize;

use crate::error::PollError;

#[derive(Debug, Deserialize)]
struct StatsDocument {
    icestats: IceStats,
}

#[derive(Debug, Deserialize)]
struct IceStats {
    #[serde(default)]
    source: Option<OneOrMany<SourceRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct SourceRecord {
    listenurl: String,
    #[serde(default)]
    listeners: u64,
    #[serde(default)]
    listener_peak: u64,
    server_name: Option<String>,
    server_description: Option<String>,
    stream_start_iso8601: Option<String>,
    stream_start: Option<String>,
}

impl From<SourceRecord> for StreamStats {
    fn from(record: SourceRecord) -> Self {
        StreamStats {
            mount: mount_from_url(&record.listenurl),
            listeners: record.listeners,
            peak: record.listener_peak,
            name: record.server_name,
            description: record.server_description,
            started_at: record.stream_start_iso8601.or(record.stream_start),
            listen_url: record.listenurl,
        }
    }
}

/// Parse a stats document into one record per stream
pub fn parse_icestats(body: &[u8]) -> Result<Vec<StreamStats>, PollError> {
    let document: StatsDocument =
        serde_json::from_slice(body).map_err(|e| PollError::Malformed(e.to_string()))?;

    Ok(document
        .icestats
        .source
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(StreamStats::from)
        .collect())
}

/// Path component of a listen URL, e.g. `http://host:8000/live` → `/live`
pub fn mount_from_url(listen_url: &str) -> String {
    let after_scheme = listen_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(listen_url);
    let path = after_scheme
        .find('/')
        .map(|i| &after_scheme[i..])
        .unwrap_or("/");
    let path = path.split(['?', '#']).next().unwrap_or(path);
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
