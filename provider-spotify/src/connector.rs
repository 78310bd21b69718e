//! Web API catalog connector
//!
//! Implements [`CatalogProvider`] over the host `HttpClient`. Every request
//! carries a bearer token from the injected [`TokenProvider`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_auth::TokenProvider;
use core_library::{
    CatalogAlbum, CatalogError, CatalogPlaylist, CatalogProvider, CatalogResult, CatalogTrack,
    SearchResults, SearchType,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SpotifyError};
use crate::types::{Album, ErrorResponse, Paging, Playlist, PlaylistItem, SearchResponse, Track};

/// Web API base URL
pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Attempts per request, counting the first
const MAX_ATTEMPTS: u32 = 3;

/// Upper bound on pages followed for one collection
const MAX_PAGES: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Catalog connector
///
/// # Features
///
/// - Album and playlist track lists are followed across pages
/// - Exponential backoff on 429 and 5xx, honoring `Retry-After`
/// - 404 maps to `NotFound`, 401 to `Unauthenticated`
///
/// # Example
///
/// ```ignore
/// let connector = SpotifyConnector::new(http_client, tokens);
/// let album = connector.get_album("4aawyAB9vmqN3uQ7FjRGTy").await?;
/// ```
pub struct SpotifyConnector {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    base_url: String,
}

impl SpotifyConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_url(http_client, tokens, API_BASE_URL)
    }

    pub fn with_base_url(
        http_client: Arc<dyn HttpClient>,
        tokens: Arc<dyn TokenProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `url` and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let response = self.get_with_retry(url).await?;
        response
            .json()
            .map_err(|e| SpotifyError::Parse(e.to_string()))
    }

    /// Execute a GET with retry on rate limiting and server errors.
    #[instrument(skip(self, url), fields(url = %url))]
    async fn get_with_retry(&self, url: String) -> Result<HttpResponse> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let token = self.tokens.access_token().await?;
            let request = HttpRequest::get(url.clone())
                .bearer_token(token)
                .accept_json()
                .timeout(REQUEST_TIMEOUT);

            let response = match self.http_client.execute(request).await {
                Ok(response) => response,
                Err(e) => {
                    if attempt >= MAX_ATTEMPTS {
                        warn!("API request failed after {} attempts: {}", attempt, e);
                        return Err(e.into());
                    }
                    let backoff = backoff(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): {}, retrying in {}ms",
                        attempt,
                        MAX_ATTEMPTS,
                        e,
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            };

            let status = response.status;
            if response.is_success() {
                debug!(status, "API request succeeded");
                return Ok(response);
            }

            if response.is_retryable() {
                let retry_after = response.retry_after_secs();
                if attempt >= MAX_ATTEMPTS {
                    warn!(status, "API request failed after {} attempts", attempt);
                    return Err(match retry_after {
                        Some(secs) if status == 429 => SpotifyError::RateLimited {
                            retry_after_seconds: secs,
                        },
                        _ => api_error(&response),
                    });
                }

                let backoff = retry_after
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| backoff(attempt));
                warn!(
                    "API request failed (attempt {}/{}): status={}, retrying in {}ms",
                    attempt,
                    MAX_ATTEMPTS,
                    status,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            warn!(status, "API request failed");
            return Err(match status {
                401 => SpotifyError::Unauthorized(api_error(&response).to_string()),
                404 => SpotifyError::NotFound(url),
                _ => api_error(&response),
            });
        }
    }

    /// Collect `first` and every following page.
    async fn collect_pages<T: DeserializeOwned>(&self, first: Paging<T>) -> Result<Vec<T>> {
        let mut items = first.items;
        let mut next = first.next;
        let mut pages = 1;

        while let Some(url) = next {
            if pages >= MAX_PAGES {
                warn!(pages, "Stopping pagination at page limit");
                break;
            }
            let page: Paging<T> = self.get_json(url).await?;
            items.extend(page.items);
            next = page.next;
            pages += 1;
        }

        Ok(items)
    }

    async fn fetch_album(&self, album_id: &str) -> Result<CatalogAlbum> {
        let mut album: Album = self
            .get_json(self.url(&format!("/albums/{}", urlencoding::encode(album_id))))
            .await?;

        let tracks = match album.tracks.take() {
            Some(first) => self.collect_pages(first).await?,
            None => Vec::new(),
        };

        Ok(album.into_catalog(tracks))
    }

    async fn fetch_playlist(&self, playlist_id: &str) -> Result<CatalogPlaylist> {
        let mut playlist: Playlist = self
            .get_json(self.url(&format!(
                "/playlists/{}",
                urlencoding::encode(playlist_id)
            )))
            .await?;

        let items = match playlist.tracks.take() {
            Some(first) => {
                let paging = Paging::<PlaylistItem> {
                    items: first.items,
                    total: first.total,
                    next: first.next,
                };
                self.collect_pages(paging).await?
            }
            None => Vec::new(),
        };

        Ok(playlist.into_catalog(items))
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(100 * 2u64.pow(attempt))
}

fn api_error(response: &HttpResponse) -> SpotifyError {
    let message = response
        .json::<ErrorResponse>()
        .map(|e| e.error.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).to_string());

    SpotifyError::Api {
        status_code: response.status,
        message,
    }
}

#[async_trait]
impl CatalogProvider for SpotifyConnector {
    #[instrument(skip(self))]
    async fn get_track(&self, track_id: &str) -> CatalogResult<CatalogTrack> {
        let track: Track = self
            .get_json(self.url(&format!("/tracks/{}", urlencoding::encode(track_id))))
            .await?;

        track
            .into_catalog()
            .ok_or_else(|| CatalogError::NotFound(format!("Track {} is not playable", track_id)))
    }

    #[instrument(skip(self))]
    async fn get_album(&self, album_id: &str) -> CatalogResult<CatalogAlbum> {
        let album = self.fetch_album(album_id).await?;
        info!(tracks = album.tracks.len(), "Fetched album");
        Ok(album)
    }

    #[instrument(skip(self))]
    async fn get_playlist(&self, playlist_id: &str) -> CatalogResult<CatalogPlaylist> {
        let playlist = self.fetch_playlist(playlist_id).await?;
        info!(tracks = playlist.tracks.len(), "Fetched playlist");
        Ok(playlist)
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        limit: u32,
    ) -> CatalogResult<SearchResults> {
        let types = if types.is_empty() {
            &SearchType::ALL[..]
        } else {
            types
        };

        let url = self.url(&format!(
            "/search?q={}&type={}&limit={}",
            urlencoding::encode(query),
            urlencoding::encode(&SearchType::join(types)),
            limit
        ));

        let response: SearchResponse = self.get_json(url).await?;
        Ok(response.into())
    }
}
