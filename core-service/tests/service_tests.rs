//! Integration tests for the CoreService
//!
//! These tests build a full service over in-memory stores, a scripted
//! catalog and a fetcher that serves generated WAV files, then verify:
//! - Builder capability checks
//! - Download and collection playback through the real decoder
//! - Queue advancement on end of track
//! - Preset selection and custom band edits

use async_trait::async_trait;
use bridge_traits::{ManualClock, MemoryBlobStore, MemoryMetadataStore, OutputFormat};
use bytes::Bytes;
use core_library::{
    ArtistRef, CatalogAlbum, CatalogError, CatalogPlaylist, CatalogProvider, CatalogResult,
    CatalogTrack, CollectionRef, SearchResults, SearchType, TrackFetcher,
};
use core_playback::{EqBand, EqBands, ManualOutput, TransportState};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, DownloadEvent, DownloadProgress};
use core_service::{CoreService, ServiceError};
use std::sync::Arc;
use std::time::Duration;

const RATE: u32 = 8_000;

/// Mono 16-bit PCM WAV of `frames` samples.
fn wav(frames: usize) -> Bytes {
    let data_len = (frames * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&RATE.to_le_bytes());
    out.extend_from_slice(&(RATE * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames {
        let s = ((i % 40) as i16 - 20) * 500;
        out.extend_from_slice(&s.to_le_bytes());
    }
    Bytes::from(out)
}

fn track(id: &str) -> CatalogTrack {
    CatalogTrack {
        id: id.to_string(),
        name: format!("Song {}", id),
        artists: vec![ArtistRef::new("ar1", "Someone")],
        album: None,
        duration_ms: 100,
        preview_url: Some(format!("https://p.scdn.co/mp3-preview/{}", id)),
        explicit: false,
        track_number: None,
        popularity: None,
    }
}

struct Catalog;

#[async_trait]
impl CatalogProvider for Catalog {
    async fn get_track(&self, track_id: &str) -> CatalogResult<CatalogTrack> {
        Ok(track(track_id))
    }

    async fn get_album(&self, album_id: &str) -> CatalogResult<CatalogAlbum> {
        match album_id {
            "A" => Ok(CatalogAlbum {
                id: "A".into(),
                name: "Album A".into(),
                artists: vec![ArtistRef::new("ar1", "Someone")],
                release_date: None,
                image_url: None,
                tracks: vec![track("a1"), track("a2"), track("a3")],
            }),
            other => Err(CatalogError::NotFound(format!("album {}", other))),
        }
    }

    async fn get_playlist(&self, playlist_id: &str) -> CatalogResult<CatalogPlaylist> {
        match playlist_id {
            "P" => Ok(CatalogPlaylist {
                id: "P".into(),
                name: "Playlist P".into(),
                owner: "listener".into(),
                description: None,
                image_url: None,
                tracks: vec![track("a2"), track("p1")],
            }),
            other => Err(CatalogError::NotFound(format!("playlist {}", other))),
        }
    }

    async fn search(
        &self,
        query: &str,
        _types: &[SearchType],
        limit: u32,
    ) -> CatalogResult<SearchResults> {
        Ok(SearchResults {
            tracks: (0..limit.min(3))
                .map(|i| track(&format!("{}-{}", query, i)))
                .collect(),
            ..SearchResults::default()
        })
    }
}

/// Serves 0.1 s of audio for every track.
struct WavFetcher;

#[async_trait]
impl TrackFetcher for WavFetcher {
    async fn fetch(&self, _track: &CatalogTrack) -> CatalogResult<Bytes> {
        Ok(wav(800))
    }
}

fn config(output: Arc<ManualOutput>) -> CoreConfig {
    CoreConfig::builder()
        .blob_store(Arc::new(MemoryBlobStore::new()))
        .metadata_store(Arc::new(MemoryMetadataStore::new()))
        .clock(Arc::new(ManualClock::from_millis(1_700_000_000_000)))
        .audio_output(output)
        .build()
        .unwrap()
}

async fn service() -> (CoreService, Arc<ManualOutput>) {
    let output = Arc::new(ManualOutput::new(OutputFormat {
        sample_rate: RATE,
        channels: 1,
    }));
    let core = CoreService::builder(config(output.clone()))
        .catalog(Arc::new(Catalog))
        .fetcher(Arc::new(WavFetcher))
        .build()
        .await
        .unwrap();
    (core, output)
}

/// Poll until the engine reports `track_id` as current, or give up.
async fn wait_for_track(core: &CoreService, track_id: &str) -> bool {
    for _ in 0..100 {
        if core.engine().current_track_id().as_deref() == Some(track_id)
            && core.engine().is_playing()
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_builder_requires_http_without_injected_catalog() {
    let output = Arc::new(ManualOutput::default());
    let result = CoreService::builder(config(output)).build().await;

    assert!(matches!(
        result,
        Err(ServiceError::CapabilityMissing { ref capability, .. }) if capability == "HttpClient"
    ));
}

#[tokio::test]
async fn test_search_uses_default_limit() {
    let (core, _) = service().await;

    let results = core.search("night", &SearchType::ALL, None).await.unwrap();
    assert_eq!(results.tracks.len(), 3);

    let results = core.search("night", &[SearchType::Track], Some(1)).await.unwrap();
    assert_eq!(results.tracks.len(), 1);
}

#[tokio::test]
async fn test_download_track_by_id() {
    let (core, _) = service().await;

    let record = core.download_track("solo").await.unwrap();
    assert_eq!(record.name, "Song solo");
    assert!(core.get_track_audio("solo").await.unwrap().is_some());

    let again = core.download_track("solo").await.unwrap();
    assert_eq!(record, again);
}

#[tokio::test]
async fn test_download_stream_sees_only_downloads() {
    let (core, _) = service().await;
    let mut downloads = core.subscribe_downloads();

    core.download_album("A").await.unwrap();

    let mut last = None;
    while let Some(event) = downloads.try_recv() {
        let event = event.unwrap();
        assert!(event.is_download());
        last = Some(event);
    }
    assert_eq!(
        last,
        Some(CoreEvent::Download(DownloadEvent::Progress(
            DownloadProgress::complete(3, 3)
        )))
    );
}

#[tokio::test]
async fn test_play_collection_advances_on_end() {
    let (core, output) = service().await;
    core.download_album("A").await.unwrap();

    core.play_album("A").await.unwrap();
    assert_eq!(core.queue().tracks(), ["a1", "a2", "a3"]);
    assert_eq!(core.queue_source(), Some(CollectionRef::album("A")));
    assert!(wait_for_track(&core, "a1").await);

    output.pull(1_000);
    assert!(wait_for_track(&core, "a2").await);
    assert_eq!(core.queue().position(), 1);
}

#[tokio::test]
async fn test_queue_stops_after_last_track() {
    let (core, output) = service().await;
    core.download_playlist("P").await.unwrap();
    core.play_playlist("P").await.unwrap();

    output.pull(1_000);
    assert!(wait_for_track(&core, "p1").await);

    output.pull(1_000);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(core.snapshot().state, TransportState::Ended);
    assert_eq!(core.engine().current_track_id().as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_next_and_previous() {
    let (core, _) = service().await;
    core.download_album("A").await.unwrap();
    core.play_album("A").await.unwrap();

    assert_eq!(core.next_track().await.unwrap().as_deref(), Some("a2"));
    assert_eq!(core.next_track().await.unwrap().as_deref(), Some("a3"));
    assert_eq!(core.next_track().await.unwrap(), None);
    assert_eq!(core.engine().current_track_id().as_deref(), Some("a3"));

    assert_eq!(core.previous_track().await.unwrap().as_deref(), Some("a2"));
    assert_eq!(core.engine().current_track_id().as_deref(), Some("a2"));
}

#[tokio::test]
async fn test_play_collection_skips_deleted_tracks() {
    let (core, _) = service().await;
    core.download_album("A").await.unwrap();
    core.delete_track("a1").await.unwrap();

    core.play_album("A").await.unwrap();

    assert_eq!(core.queue().tracks(), ["a2", "a3"]);
    assert_eq!(core.engine().current_track_id().as_deref(), Some("a2"));
}

#[tokio::test]
async fn test_play_unknown_collection_fails() {
    let (core, _) = service().await;

    let err = core.play_playlist("P").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotDownloaded(_)));
}

#[tokio::test]
async fn test_shared_track_kept_through_service() {
    let (core, _) = service().await;
    core.download_album("A").await.unwrap();
    core.download_playlist("P").await.unwrap();

    let deletion = core.delete_album("A").await.unwrap();

    assert_eq!(deletion.retained_tracks, vec!["a2"]);
    assert_eq!(deletion.removed_tracks, vec!["a1", "a3"]);
    core.play_playlist("P").await.unwrap();
    assert_eq!(core.queue().tracks(), ["a2", "p1"]);
}

#[tokio::test]
async fn test_clear_all_empties_queue() {
    let (core, _) = service().await;
    core.download_album("A").await.unwrap();
    core.play_album("A").await.unwrap();

    core.clear_all().await.unwrap();

    assert!(core.queue().is_empty());
    assert_eq!(core.get_cache_size().await.unwrap().total, 0);
}

#[tokio::test]
async fn test_presets_drive_engine() {
    let (core, _) = service().await;

    assert_eq!(core.current_preset().unwrap().id, "default");
    assert_eq!(core.select_preset("vocal-boost").unwrap(), EqBands::new(-3.0, 5.0, 2.0));
    assert_eq!(core.eq_bands(), EqBands::new(-3.0, 5.0, 2.0));

    let bands = core.set_eq_band(EqBand::Bass, 30.0);
    assert_eq!(bands, EqBands::new(12.0, 5.0, 2.0));
    let custom = core.current_preset().unwrap();
    assert_eq!(custom.id, "custom");
    assert_eq!(custom.bands, bands);

    let saved = core.save_preset("Mine").unwrap();
    assert_eq!(saved.bands, bands);

    core.delete_preset(&saved.id).unwrap();
    assert_eq!(core.current_preset().unwrap().id, "default");
    assert_eq!(core.eq_bands(), EqBands::flat());

    assert!(matches!(
        core.delete_preset("default"),
        Err(ServiceError::Preset(_))
    ));
}

#[tokio::test]
async fn test_shutdown_releases_output() {
    let (core, output) = service().await;
    core.download_track("solo").await.unwrap();
    core.play_track("solo").await.unwrap();
    assert!(output.is_started());

    core.shutdown();

    assert!(!output.is_started());
    assert_eq!(core.snapshot().state, TransportState::Idle);
    assert!(core.queue().is_empty());
}

#[tokio::test]
async fn test_queue_advances_after_shutdown_and_replay() {
    let (core, output) = service().await;
    core.download_album("A").await.unwrap();
    core.play_album("A").await.unwrap();

    core.shutdown();

    core.play_album("A").await.unwrap();
    assert!(output.is_started());
    assert!(wait_for_track(&core, "a1").await);

    output.pull(1_000);
    assert!(wait_for_track(&core, "a2").await);
    assert_eq!(core.queue().position(), 1);
}
