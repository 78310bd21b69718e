//! Upstream audio fetcher
//!
//! Downloads the preview clip a catalog track exposes. Preview URLs are
//! public CDN links and carry no bearer token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, STATUS_INSUFFICIENT_STORAGE};
use bytes::Bytes;
use core_library::{CatalogResult, CatalogTrack, TrackFetcher};
use tracing::{debug, instrument, warn};

use crate::error::SpotifyError;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

pub struct PreviewTrackFetcher {
    http_client: Arc<dyn HttpClient>,
}

impl PreviewTrackFetcher {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl TrackFetcher for PreviewTrackFetcher {
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    async fn fetch(&self, track: &CatalogTrack) -> CatalogResult<Bytes> {
        let url = track
            .preview_url
            .as_deref()
            .ok_or_else(|| SpotifyError::NoPreview(track.id.clone()))?;

        let request = HttpRequest::get(url).timeout(DOWNLOAD_TIMEOUT);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(SpotifyError::from)?;

        match response.status {
            s if (200..300).contains(&s) => {
                debug!(bytes = response.body.len(), "Downloaded preview");
                Ok(response.body)
            }
            404 | 410 => Err(SpotifyError::NotFound(url.to_string()).into()),
            STATUS_INSUFFICIENT_STORAGE => {
                Err(SpotifyError::StorageFull(format!("Upstream returned 507 for {}", track.id))
                    .into())
            }
            status => {
                warn!(status, "Preview download failed");
                Err(SpotifyError::Api {
                    status_code: status,
                    message: format!("Preview download failed for {}", track.id),
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use core_library::CatalogError;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn track(preview: Option<&str>) -> CatalogTrack {
        CatalogTrack {
            id: "t1".into(),
            name: "Song".into(),
            artists: vec![],
            album: None,
            duration_ms: 30_000,
            preview_url: preview.map(str::to_string),
            explicit: false,
            track_number: None,
            popularity: None,
        }
    }

    fn respond(status: u16, body: &'static [u8]) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse::new(status, Bytes::from_static(body)))
    }

    #[tokio::test]
    async fn test_fetch_returns_body_without_auth_header() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .withf(|req| req.url == "https://cdn/p.mp3" && !req.headers.contains_key("authorization"))
            .returning(|_| respond(200, b"ID3audio"));

        let fetcher = PreviewTrackFetcher::new(Arc::new(http));
        let bytes = fetcher.fetch(&track(Some("https://cdn/p.mp3"))).await.unwrap();
        assert_eq!(&bytes[..], b"ID3audio");
    }

    #[tokio::test]
    async fn test_no_preview_is_not_found() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let fetcher = PreviewTrackFetcher::new(Arc::new(http));
        let err = fetcher.fetch(&track(None)).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_insufficient_storage_is_storage_full() {
        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|_| respond(507, b""));

        let fetcher = PreviewTrackFetcher::new(Arc::new(http));
        let err = fetcher.fetch(&track(Some("https://cdn/p"))).await.unwrap_err();
        assert!(matches!(err, CatalogError::StorageFull(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Err(BridgeError::OperationFailed("connection reset".into())));

        let fetcher = PreviewTrackFetcher::new(Arc::new(http));
        let err = fetcher.fetch(&track(Some("https://cdn/p"))).await.unwrap_err();
        assert!(matches!(err, CatalogError::Network(_)));
    }
}
