// Composition tests — the full download pipeline wired against in-memory
// mocks of both remote services and the download engine. No network, no
// subprocesses; the only filesystem touch is a temp cover image.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use mixtape::config::Config;
use mixtape::deezer::notifications::{Notification, Quotation};
use mixtape::deezer::social::{ProfileEntry, ProfileTab};
use mixtape::deezer::traits::DeezerApi;
use mixtape::engine::traits::{
    DownloadOptions, DownloadOutcome, Downloader, PlaylistDownload,
};
use mixtape::jellyfin::client::{AudioItem, ItemSummary, JellyfinUser, MediaFolder};
use mixtape::jellyfin::library::LibraryIndex;
use mixtape::jellyfin::traits::JellyfinApi;
use mixtape::pipeline;

// ============================================================
// Mocks
// ============================================================

struct MockDeezer {
    notifications: Vec<Notification>,
    marked: Mutex<Vec<u64>>,
}

impl MockDeezer {
    fn new(notifications: Vec<Notification>) -> Self {
        Self {
            notifications,
            marked: Mutex::new(Vec::new()),
        }
    }

    fn marked(&self) -> Vec<u64> {
        self.marked.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeezerApi for MockDeezer {
    async fn notifications(&self) -> Result<Vec<Notification>> {
        Ok(self.notifications.clone())
    }

    async fn mark_read(&self, notification_id: u64) -> Result<()> {
        self.marked.lock().unwrap().push(notification_id);
        Ok(())
    }

    async fn profile_page(&self, _tab: ProfileTab) -> Result<Vec<ProfileEntry>> {
        Ok(Vec::new())
    }

    async fn follow(&self, _user_id: u64) -> Result<()> {
        Ok(())
    }
}

struct MockEngine {
    outcome: Result<DownloadOutcome, String>,
    calls: Mutex<Vec<(String, PathBuf, DownloadOptions)>>,
}

impl MockEngine {
    fn returning(outcome: DownloadOutcome) -> Self {
        Self {
            outcome: Ok(outcome),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, PathBuf, DownloadOptions)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for MockEngine {
    async fn download(
        &self,
        url: &str,
        target_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<DownloadOutcome> {
        self.calls.lock().unwrap().push((
            url.to_string(),
            target_dir.to_path_buf(),
            options.clone(),
        ));
        match &self.outcome {
            Ok(outcome) => Ok(outcome.clone()),
            Err(message) => anyhow::bail!("engine reported failure: {message}"),
        }
    }
}

#[derive(Default)]
struct MockJellyfin {
    users: Vec<JellyfinUser>,
    playlists: Mutex<Vec<ItemSummary>>,
    library: HashMap<String, Vec<AudioItem>>,
    created: Mutex<u32>,
    added: Mutex<Vec<(String, Vec<String>)>>,
    covers: Mutex<Vec<(String, Vec<u8>, String)>>,
    refreshes: Mutex<u32>,
    user_calls: Mutex<u32>,
}

impl MockJellyfin {
    fn with_user_and_songs(user: &str, songs: Vec<AudioItem>) -> Self {
        let mut library = HashMap::new();
        library.insert("music-root".to_string(), songs);
        Self {
            users: vec![JellyfinUser {
                id: format!("{}-id", user.to_lowercase()),
                name: user.to_string(),
            }],
            library,
            ..Default::default()
        }
    }

    fn created(&self) -> u32 {
        *self.created.lock().unwrap()
    }

    fn added(&self) -> Vec<(String, Vec<String>)> {
        self.added.lock().unwrap().clone()
    }

    fn covers(&self) -> Vec<(String, Vec<u8>, String)> {
        self.covers.lock().unwrap().clone()
    }

    fn refreshes(&self) -> u32 {
        *self.refreshes.lock().unwrap()
    }
}

#[async_trait]
impl JellyfinApi for MockJellyfin {
    async fn users(&self) -> Result<Vec<JellyfinUser>> {
        *self.user_calls.lock().unwrap() += 1;
        Ok(self.users.clone())
    }

    async fn playlists(&self, _user_id: &str) -> Result<Vec<ItemSummary>> {
        Ok(self.playlists.lock().unwrap().clone())
    }

    async fn create_playlist(&self, name: &str, _user_id: &str) -> Result<String> {
        let mut created = self.created.lock().unwrap();
        *created += 1;
        let id = format!("pl-{created}");
        self.playlists.lock().unwrap().push(ItemSummary {
            id: id.clone(),
            name: name.to_string(),
            item_type: "Playlist".to_string(),
        });
        Ok(id)
    }

    async fn add_to_playlist(&self, playlist_id: &str, item_ids: &[String]) -> Result<()> {
        self.added
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), item_ids.to_vec()));
        Ok(())
    }

    async fn media_folders(&self) -> Result<Vec<MediaFolder>> {
        Ok(vec![MediaFolder {
            id: "music-root".into(),
            name: "Music".into(),
            collection_type: Some("music".into()),
        }])
    }

    async fn audio_items(&self, parent_id: &str, _user_id: &str) -> Result<Vec<AudioItem>> {
        Ok(self.library.get(parent_id).cloned().unwrap_or_default())
    }

    async fn refresh_library(&self) -> Result<()> {
        *self.refreshes.lock().unwrap() += 1;
        Ok(())
    }

    async fn upload_playlist_cover(
        &self,
        playlist_id: &str,
        image: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.covers
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), image, content_type.to_string()));
        Ok(())
    }
}

// ============================================================
// Fixtures
// ============================================================

fn test_config(per_user: bool, refresh: bool) -> Config {
    let mut config = Config::default();
    config.deezer.bot_arl_cookie = "arl".into();
    config.downloads.music_download_path = "/music".into();
    config.downloads.per_user_directory = per_user;
    config.jellyfin.server_url = "https://jellyfin.test".into();
    config.jellyfin.api_key = "key".into();
    config.jellyfin.refresh_before_resolve = refresh;
    config
}

fn playlist_notification(id: u64, sender: &str) -> Notification {
    Notification {
        id,
        title: format!("{sender} shared a playlist"),
        url: "/playlist/123".into(),
        read: false,
        quotation: Some(Quotation {
            title: format!("{sender} thought you would like this"),
        }),
    }
}

fn song(id: &str, path: &str) -> AudioItem {
    AudioItem {
        id: id.into(),
        path: Some(path.into()),
    }
}

fn playlist_outcome(name: &str, songs: &[&str], cover: Option<&Path>) -> DownloadOutcome {
    DownloadOutcome::Playlist(PlaylistDownload {
        name: name.to_string(),
        songs: songs.iter().map(PathBuf::from).collect(),
        cover: cover.map(Path::to_path_buf),
    })
}

// ============================================================
// End-to-end scenario
// ============================================================

#[tokio::test]
async fn playlist_share_flows_end_to_end() {
    let mut cover = tempfile::Builder::new()
        .suffix(".jpg")
        .tempfile()
        .unwrap();
    cover.write_all(b"\xFF\xD8 jpeg bytes").unwrap();

    let deezer = MockDeezer::new(vec![
        playlist_notification(7, "bob"),
        // Already read — must be left alone entirely
        Notification {
            id: 8,
            title: "old".into(),
            url: "/playlist/9".into(),
            read: true,
            quotation: Some(Quotation {
                title: "alice oldie".into(),
            }),
        },
    ]);
    let engine = MockEngine::returning(playlist_outcome(
        "Road Trip",
        &["/music/bob/a.flac", "/music/bob/b.flac"],
        Some(cover.path()),
    ));
    // Library paths differ in case from the engine's report — resolution
    // must still find them
    let jellyfin = MockJellyfin::with_user_and_songs(
        "Bob",
        vec![
            song("item-a", "/Music/Bob/A.flac"),
            song("item-b", "/Music/Bob/B.flac"),
        ],
    );

    let config = test_config(true, false);
    pipeline::run_download_pass(&deezer, &jellyfin, &engine, &config)
        .await
        .unwrap();

    // The unread notification was consumed exactly once; the read one never
    assert_eq!(deezer.marked(), vec![7]);

    // One engine invocation, into the per-sender directory, hardlink mode,
    // no m3u files
    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "https://deezer.com/us/playlist/123");
    assert_eq!(calls[0].1, PathBuf::from("/music/bob"));
    assert_eq!(calls[0].2.duplicates.as_str(), "hardlink");
    assert!(!calls[0].2.playlist_files);
    assert_eq!(calls[0].2.quality, "lossless");

    // Playlist created once, cover uploaded, both songs added in order
    assert_eq!(jellyfin.created(), 1);

    let covers = jellyfin.covers();
    assert_eq!(covers.len(), 1);
    assert_eq!(covers[0].0, "pl-1");
    assert_eq!(covers[0].1, b"\xFF\xD8 jpeg bytes");
    assert_eq!(covers[0].2, "image/jpeg");

    let added = jellyfin.added();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].0, "pl-1");
    assert_eq!(added[0].1, vec!["item-a".to_string(), "item-b".to_string()]);

    // Default policy: no library scan requested
    assert_eq!(jellyfin.refreshes(), 0);
}

#[tokio::test]
async fn partial_resolution_adds_only_resolved_songs() {
    let deezer = MockDeezer::new(vec![playlist_notification(1, "bob")]);
    let engine = MockEngine::returning(playlist_outcome(
        "Mix",
        &[
            "/music/bob/a.flac",
            "/music/bob/not-indexed-yet.flac",
            "/music/bob/c.flac",
        ],
        None,
    ));
    let jellyfin = MockJellyfin::with_user_and_songs(
        "bob",
        vec![
            song("item-a", "/music/bob/a.flac"),
            song("item-c", "/music/bob/c.flac"),
        ],
    );

    let config = test_config(false, false);
    pipeline::run_download_pass(&deezer, &jellyfin, &engine, &config)
        .await
        .unwrap();

    let added = jellyfin.added();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].1, vec!["item-a".to_string(), "item-c".to_string()]);
}

#[tokio::test]
async fn nothing_resolved_means_nothing_added() {
    let deezer = MockDeezer::new(vec![playlist_notification(1, "bob")]);
    let engine = MockEngine::returning(playlist_outcome(
        "Mix",
        &["/music/bob/brand-new.flac"],
        None,
    ));
    let jellyfin = MockJellyfin::with_user_and_songs("bob", Vec::new());

    let config = test_config(false, false);
    pipeline::run_download_pass(&deezer, &jellyfin, &engine, &config)
        .await
        .unwrap();

    assert_eq!(jellyfin.created(), 1, "playlist is still created");
    assert!(jellyfin.added().is_empty(), "but no add call is made");
}

#[tokio::test]
async fn get_or_create_returns_the_same_playlist_twice() {
    let jellyfin = MockJellyfin::with_user_and_songs("bob", Vec::new());

    let first = pipeline::sync::get_or_create_playlist(&jellyfin, "Road Trip", "bob-id")
        .await
        .unwrap();
    let second = pipeline::sync::get_or_create_playlist(&jellyfin, "Road Trip", "bob-id")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(jellyfin.created(), 1);
}

#[tokio::test]
async fn playlist_names_match_case_sensitively() {
    let jellyfin = MockJellyfin::with_user_and_songs("bob", Vec::new());

    let lower = pipeline::sync::get_or_create_playlist(&jellyfin, "road trip", "bob-id")
        .await
        .unwrap();
    let upper = pipeline::sync::get_or_create_playlist(&jellyfin, "Road Trip", "bob-id")
        .await
        .unwrap();

    assert_ne!(lower, upper);
    assert_eq!(jellyfin.created(), 2);
}

#[tokio::test]
async fn repeated_share_reuses_the_playlist() {
    let engine = MockEngine::returning(playlist_outcome(
        "Road Trip",
        &["/music/bob/a.flac"],
        None,
    ));
    let jellyfin = MockJellyfin::with_user_and_songs(
        "bob",
        vec![song("item-a", "/music/bob/a.flac")],
    );
    let config = test_config(false, false);

    for id in [1, 2] {
        let deezer = MockDeezer::new(vec![playlist_notification(id, "bob")]);
        pipeline::run_download_pass(&deezer, &jellyfin, &engine, &config)
            .await
            .unwrap();
    }

    // Second pass found the existing playlist and appended to it
    assert_eq!(jellyfin.created(), 1);
    assert_eq!(jellyfin.added().len(), 2);
}

#[tokio::test]
async fn refresh_knob_requests_one_scan_before_resolving() {
    let deezer = MockDeezer::new(vec![playlist_notification(1, "bob")]);
    let engine = MockEngine::returning(playlist_outcome(
        "Mix",
        &["/music/bob/a.flac"],
        None,
    ));
    let jellyfin = MockJellyfin::with_user_and_songs(
        "bob",
        vec![song("item-a", "/music/bob/a.flac")],
    );

    let config = test_config(false, true);
    pipeline::run_download_pass(&deezer, &jellyfin, &engine, &config)
        .await
        .unwrap();

    assert_eq!(jellyfin.refreshes(), 1);
    assert_eq!(jellyfin.added().len(), 1);
}

#[tokio::test]
async fn engine_failure_aborts_the_share_without_sync() {
    let deezer = MockDeezer::new(vec![playlist_notification(1, "bob")]);
    let engine = MockEngine::failing("quota exceeded");
    let jellyfin = MockJellyfin::with_user_and_songs("bob", Vec::new());

    let config = test_config(false, false);
    // The pass itself succeeds — the failure is contained to the share
    pipeline::run_download_pass(&deezer, &jellyfin, &engine, &config)
        .await
        .unwrap();

    // Consumed (at-most-once), but nothing touched the media server
    assert_eq!(deezer.marked(), vec![1]);
    assert_eq!(*jellyfin.user_calls.lock().unwrap(), 0);
    assert_eq!(jellyfin.created(), 0);
    assert!(jellyfin.added().is_empty());
}

#[tokio::test]
async fn unknown_media_user_skips_the_sync() {
    let deezer = MockDeezer::new(vec![playlist_notification(1, "mallory")]);
    let engine = MockEngine::returning(playlist_outcome(
        "Mix",
        &["/music/mallory/a.flac"],
        None,
    ));
    let jellyfin = MockJellyfin::with_user_and_songs("bob", Vec::new());

    let config = test_config(false, false);
    pipeline::run_download_pass(&deezer, &jellyfin, &engine, &config)
        .await
        .unwrap();

    assert_eq!(jellyfin.created(), 0);
    assert!(jellyfin.added().is_empty());
}

#[tokio::test]
async fn track_share_downloads_without_touching_the_media_server() {
    let deezer = MockDeezer::new(vec![Notification {
        id: 5,
        title: "bob shared a track".into(),
        url: "/track/42".into(),
        read: false,
        quotation: Some(Quotation {
            title: "bob banger".into(),
        }),
    }]);
    let engine = MockEngine::returning(DownloadOutcome::Track);
    let jellyfin = MockJellyfin::with_user_and_songs("bob", Vec::new());

    let config = test_config(false, false);
    pipeline::run_download_pass(&deezer, &jellyfin, &engine, &config)
        .await
        .unwrap();

    assert_eq!(deezer.marked(), vec![5]);
    assert_eq!(engine.calls().len(), 1);
    assert_eq!(*jellyfin.user_calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn unsupported_cover_format_is_skipped_not_fatal() {
    let mut cover = tempfile::Builder::new()
        .suffix(".webp")
        .tempfile()
        .unwrap();
    cover.write_all(b"webp bytes").unwrap();

    let deezer = MockDeezer::new(vec![playlist_notification(1, "bob")]);
    let engine = MockEngine::returning(playlist_outcome(
        "Mix",
        &["/music/bob/a.flac"],
        Some(cover.path()),
    ));
    let jellyfin = MockJellyfin::with_user_and_songs(
        "bob",
        vec![song("item-a", "/music/bob/a.flac")],
    );

    let config = test_config(false, false);
    pipeline::run_download_pass(&deezer, &jellyfin, &engine, &config)
        .await
        .unwrap();

    assert!(jellyfin.covers().is_empty(), "webp cover is not uploaded");
    assert_eq!(jellyfin.added().len(), 1, "songs still land");
}

#[tokio::test]
async fn missing_cover_file_is_skipped_not_fatal() {
    let deezer = MockDeezer::new(vec![playlist_notification(1, "bob")]);
    let engine = MockEngine::returning(playlist_outcome(
        "Mix",
        &["/music/bob/a.flac"],
        Some(Path::new("/does/not/exist/cover.png")),
    ));
    let jellyfin = MockJellyfin::with_user_and_songs(
        "bob",
        vec![song("item-a", "/music/bob/a.flac")],
    );

    let config = test_config(false, false);
    pipeline::run_download_pass(&deezer, &jellyfin, &engine, &config)
        .await
        .unwrap();

    assert!(jellyfin.covers().is_empty());
    assert_eq!(jellyfin.added().len(), 1);
}

// ============================================================
// Index reuse within a pass
// ============================================================

#[tokio::test]
async fn sync_reuses_one_index_across_calls() {
    let jellyfin = MockJellyfin::with_user_and_songs(
        "bob",
        vec![song("item-a", "/music/bob/a.flac")],
    );
    let mut index = LibraryIndex::new();

    let download = PlaylistDownload {
        name: "Mix".into(),
        songs: vec![PathBuf::from("/music/bob/a.flac")],
        cover: None,
    };

    pipeline::sync::sync_playlist(&jellyfin, &mut index, &download, "bob", false)
        .await
        .unwrap();
    pipeline::sync::sync_playlist(&jellyfin, &mut index, &download, "bob", false)
        .await
        .unwrap();

    // Same pass, same index: both syncs resolved against one build and the
    // playlist was only created once
    assert_eq!(jellyfin.created(), 1);
    assert_eq!(jellyfin.added().len(), 2);
}
