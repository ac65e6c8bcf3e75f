// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;
use chrono_tz::Tz;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::Show;
use crate::error::CatalogError;
use crate::http::{HttpBytes, HttpClient};

use super::{Catalog, Episode, EpisodeIter, ScheduledEpisodes, Window};

pub const DEFAULT_SITE_URL: &str = "https://radiocut.fm";

/// Recordings are grouped in chunk indices of this many seconds each
const SECONDS_PER_INDEX: i64 = 10_000;

/// Catalog backed by radiocut.fm station recordings
///
/// Episodes come from each show's schedule; their audio is the run of MP3
/// chunks covering the recording, looked up through the station's chunk
/// indices.
#[derive(Clone)]
pub struct RadiocutCatalog<C> {
    client: C,
    site: Url,
}

/// One MP3 chunk as listed in a chunk index
#[derive(Debug, Clone, Deserialize)]
struct Chunk {
    start: f64,
    length: f64,
    filename: String,
    #[serde(default)]
    base_url: Option<String>,
}

impl Chunk {
    fn end(&self) -> f64 {
        self.start + self.length
    }
}

#[derive(Debug, Deserialize)]
struct ChunkIndex {
    #[serde(rename = "baseURL")]
    base_url: String,
    chunks: Vec<Chunk>,
}

/// What the listen page tells us about the recording
#[derive(Debug, PartialEq)]
struct ListenPage {
    chunk_server: String,
    station: Option<String>,
}

impl<C: HttpClient> RadiocutCatalog<C> {
    /// `site` may carry a path prefix; it is treated as a directory
    pub fn new(client: C, mut site: Url) -> Self {
        if !site.cannot_be_a_base() && !site.path().ends_with('/') {
            let path = format!("{}/", site.path());
            site.set_path(&path);
        }
        Self { client, site }
    }

    fn station_url(&self, station: &str) -> Result<Url, CatalogError> {
        self.site
            .join(&format!("radiostation/{station}/"))
            .map_err(|e| CatalogError::InvalidResponse {
                url: self.site.to_string(),
                reason: format!("cannot build station URL for {station:?}: {e}"),
            })
    }

    async fn fetch(&self, url: &str, station: &str) -> Result<HttpBytes, CatalogError> {
        let response =
            self.client
                .get_bytes(url)
                .await
                .map_err(|e| CatalogError::RemoteUnavailable {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        match response.status {
            404 => Err(CatalogError::NotFound {
                station: station.to_string(),
                url: url.to_string(),
            }),
            _ if response.is_success() => Ok(response),
            status => Err(CatalogError::RemoteUnavailable {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            }),
        }
    }

    /// Collect chunks from consecutive indices until `end` is covered
    async fn collect_chunks(
        &self,
        chunk_server: &str,
        station: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Chunk>, CatalogError> {
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut folder = start / SECONDS_PER_INDEX;
        let last_folder = end / SECONDS_PER_INDEX + 1;

        loop {
            let index_url = chunk_index_url(chunk_server, station, folder);
            debug!(url = %index_url, "Fetching chunk index");

            let response = self.fetch(&index_url, station).await?;
            let mut indices: HashMap<String, ChunkIndex> = serde_json::from_slice(&response.body)
                .map_err(|e| CatalogError::InvalidResponse {
                    url: index_url.clone(),
                    reason: e.to_string(),
                })?;

            if let Some(index) = indices.remove(&folder.to_string()) {
                let base_url = index.base_url;
                chunks.extend(index.chunks.into_iter().map(|mut chunk| {
                    chunk.base_url.get_or_insert_with(|| base_url.clone());
                    chunk
                }));
            }

            if chunks.last().is_some_and(|c| c.end() > end as f64) {
                return Ok(chunks);
            }

            folder += 1;
            if folder > last_folder {
                return Err(CatalogError::InvalidResponse {
                    url: index_url,
                    reason: "chunk indices end before the recording does".to_string(),
                });
            }
        }
    }
}

#[async_trait]
impl<C: HttpClient> Catalog for RadiocutCatalog<C> {
    async fn list_episodes(
        &self,
        show: &Show,
        window: Window,
    ) -> Result<EpisodeIter, CatalogError> {
        let station_url = self.station_url(&show.station)?;
        self.fetch(station_url.as_str(), &show.station).await?;

        let episodes = ScheduledEpisodes::new(show, window, move |start: &DateTime<Tz>| {
            listen_url(&station_url, start)
        });

        Ok(Box::new(episodes))
    }

    async fn resolve_segments(&self, episode: &Episode) -> Result<Vec<Url>, CatalogError> {
        let locator = episode.locator.as_str();
        let response = self.fetch(locator, &episode.station).await?;

        let page = parse_listen_page(&String::from_utf8_lossy(&response.body)).map_err(|reason| {
            CatalogError::InvalidResponse {
                url: locator.to_string(),
                reason,
            }
        })?;
        let station = page.station.as_deref().unwrap_or(&episode.station);

        let start = episode.starts_at().timestamp();
        let end = episode.ends_at().timestamp();

        let chunks = self
            .collect_chunks(&page.chunk_server, station, start, end)
            .await?;

        let selected = select_chunks(&chunks, start, end).ok_or_else(|| CatalogError::NoSegments {
            episode_id: episode.id(),
        })?;

        selected
            .iter()
            .map(|chunk| {
                let base = chunk.base_url.as_deref().unwrap_or_default();
                let url = format!("{}/{}", base.trim_end_matches('/'), chunk.filename);
                Url::parse(&url).map_err(|e| CatalogError::InvalidResponse {
                    url,
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

/// The station's player URL for a given local start time
fn listen_url(station_url: &Url, start: &DateTime<Tz>) -> Url {
    let mut url = station_url.clone();
    let path = format!(
        "{}listen/{}/",
        station_url.path(),
        start.format("%Y/%m/%d/%H/%M/%S")
    );
    url.set_path(&path);
    url
}

/// Read the chunk server and station out of a listen page
fn parse_listen_page(html: &str) -> Result<ListenPage, String> {
    let document = Html::parse_document(html);
    let text_of = |selector: &str| -> Result<Option<String>, String> {
        let selector = Selector::parse(selector).map_err(|e| e.to_string())?;
        Ok(document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty()))
    };

    let chunk_server = text_of("li.audio_base_url")?
        .ok_or_else(|| "listen page has no audio_base_url".to_string())?;
    let station = text_of("li.audio_station")?;

    Ok(ListenPage {
        chunk_server,
        station,
    })
}

fn chunk_index_url(chunk_server: &str, station: &str, folder: i64) -> String {
    let token = encode_token(format!("andaa{station}|{folder}cagar").as_bytes());
    format!(
        "{}/server/gec/www/{}/",
        chunk_server.trim_end_matches('/'),
        token
    )
}

/// Base64 with the URL-hostile characters swapped the way the server expects
fn encode_token(raw: &[u8]) -> String {
    STANDARD
        .encode(raw)
        .replace('=', "~")
        .replace('+', "-")
        .replace('/', "_")
}

/// Chunks from the first one ending after `start` through the first one
/// ending after `end`, inclusive
fn select_chunks(chunks: &[Chunk], start: i64, end: i64) -> Option<&[Chunk]> {
    let first = chunks.iter().position(|c| c.end() > start as f64)?;
    let last = first + chunks[first..].iter().position(|c| c.end() > end as f64)?;
    Some(&chunks[first..=last])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::http::{ByteStream, HttpResponse};
    use bytes::Bytes;
    use chrono::{FixedOffset, TimeDelta, TimeZone, Utc};
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockHttpClient {
        routes: Arc<HashMap<String, (u16, String)>>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl MockHttpClient {
        fn new(routes: Vec<(&str, u16, String)>) -> Self {
            Self {
                routes: Arc::new(
                    routes
                        .into_iter()
                        .map(|(url, status, body)| (url.to_string(), (status, body)))
                        .collect(),
                ),
                requests: Arc::default(),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, url: &str) -> Result<HttpBytes, reqwest::Error> {
            self.requests.lock().unwrap().push(url.to_string());
            let (status, body) = self
                .routes
                .get(url)
                .cloned()
                .unwrap_or((404, String::new()));
            Ok(HttpBytes {
                status,
                body: Bytes::from(body),
            })
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let body: ByteStream = Box::pin(futures::stream::empty());
            Ok(HttpResponse {
                status: 404,
                content_length: None,
                body,
            })
        }
    }

    const STATION_URL: &str = "https://radiocut.fm/radiostation/nacional870/";
    const CHUNK_SERVER: &str = "https://chunks.example.com";

    fn make_show() -> Show {
        let yaml = "morning-show:\n  name: Morning Show\n  station: nacional870\n  cron: \"0 9 * * *\"\n  timezone: UTC\n  duration: 3600\n";
        parse_config(yaml, Path::new("test.yaml")).unwrap().remove(0)
    }

    fn catalog(client: MockHttpClient) -> RadiocutCatalog<MockHttpClient> {
        RadiocutCatalog::new(client, Url::parse(DEFAULT_SITE_URL).unwrap())
    }

    fn listen_page(station: &str) -> String {
        format!(
            r#"<html><body><ul>
              <li class="audio_seconds">1704186000</li>
              <li class="audio_station">{station}</li>
              <li class="audio_base_url"> {CHUNK_SERVER} </li>
            </ul></body></html>"#
        )
    }

    /// JSON chunk index with ten-minute chunks starting at `first_start`
    fn index_json(folder: i64, first_start: i64, count: i64, override_base: Option<&str>) -> String {
        let chunks: Vec<String> = (0..count)
            .map(|i| {
                let start = first_start + i * 600;
                match (i, override_base) {
                    (0, Some(base)) => format!(
                        r#"{{"start": {start}, "length": 600, "filename": "{start}.mp3", "base_url": "{base}"}}"#
                    ),
                    _ => format!(r#"{{"start": {start}, "length": 600, "filename": "{start}.mp3"}}"#),
                }
            })
            .collect();
        format!(
            r#"{{"{folder}": {{"baseURL": "https://audio.example.com/nacional870", "chunks": [{}]}}}}"#,
            chunks.join(",")
        )
    }

    fn make_episode(start: i64, duration_secs: i64) -> Episode {
        let recorded_at = FixedOffset::east_opt(0)
            .unwrap()
            .timestamp_opt(start, 0)
            .unwrap();
        Episode {
            show_id: "morning-show".to_string(),
            station: "nacional870".to_string(),
            recorded_at,
            duration: TimeDelta::seconds(duration_secs),
            locator: Url::parse(&format!("{STATION_URL}listen/x/")).unwrap(),
        }
    }

    #[test]
    fn station_url_keeps_site_path_prefix() {
        let sites = [
            "https://mirror.example.com/radiocut",
            "https://mirror.example.com/radiocut/",
        ];
        for site in sites {
            let catalog =
                RadiocutCatalog::new(MockHttpClient::default(), Url::parse(site).unwrap());
            assert_eq!(
                catalog.station_url("nacional870").unwrap().as_str(),
                "https://mirror.example.com/radiocut/radiostation/nacional870/"
            );
        }

        assert_eq!(
            catalog(MockHttpClient::default())
                .station_url("nacional870")
                .unwrap()
                .as_str(),
            STATION_URL
        );
    }

    #[test]
    fn unusable_site_url_is_not_reported_as_missing_station() {
        let catalog = RadiocutCatalog::new(
            MockHttpClient::default(),
            Url::parse("mailto:radio@example.com").unwrap(),
        );

        assert!(matches!(
            catalog.station_url("nacional870"),
            Err(CatalogError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn token_matches_server_encoding() {
        assert_eq!(
            chunk_index_url(CHUNK_SERVER, "nacional870", 170418),
            "https://chunks.example.com/server/gec/www/YW5kYWFuYWNpb25hbDg3MHwxNzA0MThjYWdhcg~~/"
        );
    }

    #[test]
    fn token_replaces_url_hostile_characters() {
        // Standard base64 of these bytes is "+/8="
        assert_eq!(encode_token(&[0xfb, 0xff]), "-_8~");
    }

    #[test]
    fn listen_url_encodes_local_time() {
        let station_url = Url::parse(STATION_URL).unwrap();
        let start = chrono_tz::America::Argentina::Buenos_Aires
            .with_ymd_and_hms(2017, 7, 1, 10, 0, 0)
            .unwrap();

        assert_eq!(
            listen_url(&station_url, &start).as_str(),
            "https://radiocut.fm/radiostation/nacional870/listen/2017/07/01/10/00/00/"
        );
    }

    #[test]
    fn listen_page_parsing() {
        let page = parse_listen_page(&listen_page("nacional870")).unwrap();
        assert_eq!(
            page,
            ListenPage {
                chunk_server: CHUNK_SERVER.to_string(),
                station: Some("nacional870".to_string()),
            }
        );

        assert!(parse_listen_page("<html><body>maintenance</body></html>").is_err());
    }

    #[test]
    fn chunk_selection_is_inclusive_on_both_ends() {
        let chunks: Vec<Chunk> = (0..5)
            .map(|i| Chunk {
                start: (i * 100) as f64,
                length: 100.0,
                filename: format!("{i}.mp3"),
                base_url: None,
            })
            .collect();

        let selected = select_chunks(&chunks, 150, 320).unwrap();
        let names: Vec<_> = selected.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["1.mp3", "2.mp3", "3.mp3"]);

        // A chunk ending exactly at `start` does not cover it
        let selected = select_chunks(&chunks, 100, 150).unwrap();
        assert_eq!(selected[0].filename, "1.mp3");

        assert!(select_chunks(&chunks, 600, 700).is_none());
    }

    #[tokio::test]
    async fn list_episodes_checks_station_and_follows_schedule() {
        let client = MockHttpClient::new(vec![(STATION_URL, 200, String::new())]);
        let catalog = catalog(client.clone());

        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let episodes: Vec<_> = catalog
            .list_episodes(&make_show(), Window::new(since, until))
            .await
            .unwrap()
            .collect();

        assert_eq!(client.requests(), vec![STATION_URL.to_string()]);
        assert_eq!(episodes.len(), 2);
        assert_eq!(
            episodes[0].locator.as_str(),
            "https://radiocut.fm/radiostation/nacional870/listen/2024/01/01/09/00/00/"
        );
    }

    #[tokio::test]
    async fn list_episodes_unknown_station_is_not_found() {
        let catalog = catalog(MockHttpClient::new(vec![]));
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let result = catalog
            .list_episodes(&make_show(), Window::new(since, since))
            .await;

        assert!(matches!(result, Err(CatalogError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_episodes_server_error_is_unavailable() {
        let catalog = catalog(MockHttpClient::new(vec![(STATION_URL, 503, String::new())]));
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let result = catalog
            .list_episodes(&make_show(), Window::new(since, since))
            .await;

        assert!(matches!(result, Err(CatalogError::RemoteUnavailable { .. })));
    }

    #[tokio::test]
    async fn resolve_segments_within_one_index() {
        // 2024-01-02 09:00 UTC, one hour plus margin
        let episode = make_episode(1_704_186_000, 3780);
        let index_url = chunk_index_url(CHUNK_SERVER, "nacional870", 170418);
        let client = MockHttpClient::new(vec![
            (episode.locator.as_str(), 200, listen_page("nacional870")),
            (index_url.as_str(), 200, index_json(170418, 1_704_185_400, 9, None)),
        ]);

        let urls = catalog(client).resolve_segments(&episode).await.unwrap();

        let expected: Vec<String> = (1..=7)
            .map(|i| {
                format!(
                    "https://audio.example.com/nacional870/{}.mp3",
                    1_704_185_400 + i * 600
                )
            })
            .collect();
        let urls: Vec<String> = urls.iter().map(|u| u.to_string()).collect();
        assert_eq!(urls, expected);
    }

    #[tokio::test]
    async fn resolve_segments_spans_indices() {
        let episode = make_episode(1_704_189_000, 1980);
        let first_index = chunk_index_url(CHUNK_SERVER, "nacional870", 170418);
        let second_index = chunk_index_url(CHUNK_SERVER, "nacional870", 170419);
        let client = MockHttpClient::new(vec![
            (episode.locator.as_str(), 200, listen_page("nacional870")),
            (first_index.as_str(), 200, index_json(170418, 1_704_188_400, 3, None)),
            (
                second_index.as_str(),
                200,
                index_json(170419, 1_704_190_200, 3, Some("https://mirror.example.com/")),
            ),
        ]);

        let urls = catalog(client.clone())
            .resolve_segments(&episode)
            .await
            .unwrap();
        let urls: Vec<String> = urls.iter().map(|u| u.to_string()).collect();

        assert_eq!(
            urls,
            vec![
                "https://audio.example.com/nacional870/1704189000.mp3",
                "https://audio.example.com/nacional870/1704189600.mp3",
                "https://mirror.example.com/1704190200.mp3",
                "https://audio.example.com/nacional870/1704190800.mp3",
            ]
        );
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn resolve_segments_fails_when_indices_run_out() {
        let episode = make_episode(1_704_186_000, 3780);
        let index_url = chunk_index_url(CHUNK_SERVER, "nacional870", 170418);
        let client = MockHttpClient::new(vec![
            (episode.locator.as_str(), 200, listen_page("nacional870")),
            (index_url.as_str(), 200, index_json(170418, 1_704_185_400, 2, None)),
        ]);

        // The next index is missing, so the mock answers 404
        let result = catalog(client).resolve_segments(&episode).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn resolve_segments_rejects_malformed_index() {
        let episode = make_episode(1_704_186_000, 3780);
        let index_url = chunk_index_url(CHUNK_SERVER, "nacional870", 170418);
        let client = MockHttpClient::new(vec![
            (episode.locator.as_str(), 200, listen_page("nacional870")),
            (index_url.as_str(), 200, "<html>oops</html>".to_string()),
        ]);

        let result = catalog(client).resolve_segments(&episode).await;
        assert!(matches!(result, Err(CatalogError::InvalidResponse { .. })));
    }
}
