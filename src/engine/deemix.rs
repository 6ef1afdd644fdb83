// deemix CLI engine — invokes the external downloader and parses its JSON
// report from stdout.
//
// Contract: the configured command accepts
//   <cmd> --path DIR --quality Q --duplicates MODE [--playlist-files] URL
// and prints one JSON object on stdout:
//   {"type": "playlist", "name": "...", "songs": ["/a.flac"], "cover": "/c.jpg"}
// with "error" set instead when the download failed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::traits::{DownloadOptions, DownloadOutcome, Downloader, PlaylistDownload};

/// Engine implementation backed by an external command.
pub struct DeemixCli {
    command: String,
}

impl DeemixCli {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

#[async_trait]
impl Downloader for DeemixCli {
    async fn download(
        &self,
        url: &str,
        target_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<DownloadOutcome> {
        let mut cmd = Command::new(&self.command);
        cmd.arg("--path")
            .arg(target_dir)
            .arg("--quality")
            .arg(&options.quality)
            .arg("--duplicates")
            .arg(options.duplicates.as_str());
        if options.playlist_files {
            cmd.arg("--playlist-files");
        }
        cmd.arg(url);

        debug!(command = %self.command, url = url, "Invoking download engine");

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to run download engine `{}`", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "download engine exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let report: EngineReport =
            serde_json::from_slice(&output.stdout).context("Failed to parse engine report")?;
        outcome_from_report(report)
    }
}

/// Wire shape of the engine's stdout report.
#[derive(Debug, Deserialize)]
struct EngineReport {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    songs: Vec<String>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn outcome_from_report(report: EngineReport) -> Result<DownloadOutcome> {
    if let Some(message) = report.error {
        anyhow::bail!("engine reported failure: {message}");
    }

    match report.kind.as_deref() {
        Some("track") => Ok(DownloadOutcome::Track),
        Some("album") => Ok(DownloadOutcome::Album),
        Some("playlist") => {
            let name = report
                .name
                .ok_or_else(|| anyhow::anyhow!("playlist report is missing a name"))?;
            Ok(DownloadOutcome::Playlist(PlaylistDownload {
                name,
                songs: report.songs.into_iter().map(PathBuf::from).collect(),
                cover: report.cover.map(PathBuf::from),
            }))
        }
        other => anyhow::bail!("engine reported unknown download type: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_report_becomes_outcome() {
        let report: EngineReport = serde_json::from_str(
            r#"{
                "type": "playlist",
                "name": "Road Trip",
                "songs": ["/music/a.flac", "/music/b.flac"],
                "cover": "/music/cover.jpg"
            }"#,
        )
        .unwrap();

        match outcome_from_report(report).unwrap() {
            DownloadOutcome::Playlist(playlist) => {
                assert_eq!(playlist.name, "Road Trip");
                assert_eq!(playlist.songs.len(), 2);
                assert_eq!(playlist.songs[0], PathBuf::from("/music/a.flac"));
                assert_eq!(playlist.cover, Some(PathBuf::from("/music/cover.jpg")));
            }
            other => panic!("expected playlist outcome, got {other:?}"),
        }
    }

    #[test]
    fn track_and_album_reports() {
        let track: EngineReport = serde_json::from_str(r#"{"type": "track"}"#).unwrap();
        assert!(matches!(
            outcome_from_report(track).unwrap(),
            DownloadOutcome::Track
        ));

        let album: EngineReport = serde_json::from_str(r#"{"type": "album"}"#).unwrap();
        assert!(matches!(
            outcome_from_report(album).unwrap(),
            DownloadOutcome::Album
        ));
    }

    #[test]
    fn error_report_fails() {
        let report: EngineReport =
            serde_json::from_str(r#"{"error": "quota exceeded"}"#).unwrap();
        let err = outcome_from_report(report).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn unknown_type_fails() {
        let report: EngineReport = serde_json::from_str(r#"{"type": "podcast"}"#).unwrap();
        assert!(outcome_from_report(report).is_err());
    }

    #[test]
    fn playlist_without_name_fails() {
        let report: EngineReport =
            serde_json::from_str(r#"{"type": "playlist", "songs": []}"#).unwrap();
        assert!(outcome_from_report(report).is_err());
    }

    #[test]
    fn playlist_without_cover_is_fine() {
        let report: EngineReport =
            serde_json::from_str(r#"{"type": "playlist", "name": "n", "songs": ["/a.mp3"]}"#)
                .unwrap();
        match outcome_from_report(report).unwrap() {
            DownloadOutcome::Playlist(playlist) => assert!(playlist.cover.is_none()),
            other => panic!("expected playlist outcome, got {other:?}"),
        }
    }
}
