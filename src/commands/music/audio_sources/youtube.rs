//! YouTube access through the `yt-dlp` command-line tool.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use serde::Deserialize;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{AudioStream, MixBatch, MixEntry, MixProvider, MixRequest, PlaylistExpander, YoutubeResolver};
use crate::commands::music::utils::music_manager::{MusicError, MusicResult};
use crate::commands::music::utils::song::{PlaylistSong, Song, YoutubeSong};

/// Visitor data as embedded in the `ytcfg` blob of a YouTube page.
static VISITOR_DATA_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:VISITOR_DATA|visitorData)"\s*:\s*"([^"]+)""#)
        .expect("visitor data regex is valid")
});

/// One video as printed by `yt-dlp -j` or listed in a `-J --flat-playlist` dump.
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: String,
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<YtDlpThumbnail>,
}

#[derive(Debug, Deserialize)]
struct YtDlpThumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct YtDlpPlaylist {
    #[serde(default)]
    entries: Vec<YtDlpEntry>,
}

impl From<YtDlpEntry> for MixEntry {
    fn from(entry: YtDlpEntry) -> Self {
        let thumbnail = entry
            .thumbnail
            .or_else(|| entry.thumbnails.into_iter().last().map(|t| t.url));

        MixEntry {
            title: entry.title.unwrap_or_else(|| entry.id.clone()),
            id: entry.id,
            length_seconds: entry.duration.map(|d| d.round() as u64),
            thumbnail,
        }
    }
}

impl From<YtDlpEntry> for YoutubeSong {
    fn from(entry: YtDlpEntry) -> Self {
        MixEntry::from(entry).into()
    }
}

/// Resolver backed by a `yt-dlp` binary.
///
/// Mixes additionally need a visitor token so YouTube keeps serving the same
/// radio session; it is scraped once from the mix page and then travels with
/// every continuation request.
#[derive(Debug, Clone)]
pub struct YtDlpClient {
    program: String,
    http: reqwest::Client,
}

impl YtDlpClient {
    pub fn new(program: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            program: program.into(),
            http,
        }
    }

    async fn run(&self, args: &[&str]) -> MusicResult<String> {
        debug!(program = %self.program, ?args, "Running yt-dlp");

        // Resolution runs under a timeout; a dropped future must not leave yt-dlp behind.
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MusicError::AudioSourceError(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            return Err(MusicError::AudioSourceError(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn parse_entry(json: &str) -> MusicResult<YtDlpEntry> {
        serde_json::from_str(json).map_err(|e| {
            MusicError::AudioSourceError(format!("Failed to parse video metadata: {}", e))
        })
    }

    fn parse_playlist(json: &str) -> MusicResult<Vec<YtDlpEntry>> {
        serde_json::from_str::<YtDlpPlaylist>(json)
            .map(|playlist| playlist.entries)
            .map_err(|e| {
                MusicError::AudioSourceError(format!("Failed to parse playlist metadata: {}", e))
            })
    }

    fn extract_visitor_data(page: &str) -> Option<String> {
        VISITOR_DATA_REGEX
            .captures(page)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Scrapes a fresh visitor token from the mix page. Failures only cost the
    /// token, never the batch.
    async fn visitor_data(&self, url: &str) -> Option<String> {
        let response = self
            .http
            .get(url)
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let page = match response {
            Ok(response) => response.text().await,
            Err(e) => Err(e),
        };

        match page {
            Ok(page) => {
                let token = Self::extract_visitor_data(&page);
                if token.is_none() {
                    debug!(url, "Mix page carries no visitor data");
                }
                token
            }
            Err(e) => {
                warn!(url, "Failed to fetch mix page for visitor data: {}", e);
                None
            }
        }
    }

    /// Arguments of a flat mix dump, forwarding the visitor token when known.
    fn mix_args<'a>(url: &'a str, extractor_args: Option<&'a str>) -> Vec<&'a str> {
        let mut args = vec!["-J", "--flat-playlist"];
        if let Some(extractor_args) = extractor_args {
            args.extend(["--extractor-args", extractor_args]);
        }
        args.push(url);
        args
    }

    /// URL that lists the continuation of a mix after `request.last_seen`.
    ///
    /// Radio mixes are named `RD<seed video>`, so the seed is used as anchor
    /// until something has been seen.
    fn mix_url(request: &MixRequest) -> String {
        let anchor = request
            .last_seen
            .as_deref()
            .or_else(|| request.mix_id.strip_prefix("RD"))
            .filter(|anchor| !anchor.is_empty());

        match anchor {
            Some(video_id) => format!(
                "https://www.youtube.com/watch?v={}&list={}",
                video_id, request.mix_id
            ),
            None => PlaylistSong::playlist_url(&request.mix_id),
        }
    }
}

#[async_trait]
impl YoutubeResolver for YtDlpClient {
    async fn video(&self, video_id: &str) -> MusicResult<YoutubeSong> {
        info!("Fetching YouTube metadata for {}", video_id);
        let url = YoutubeSong::watch_url(video_id);
        let stdout = self.run(&["-j", "--no-playlist", url.as_str()]).await?;
        Ok(Self::parse_entry(stdout.trim())?.into())
    }

    async fn search(&self, query: &str) -> MusicResult<Option<YoutubeSong>> {
        info!("Searching YouTube for: {}", query);
        let search = format!("ytsearch1:{}", query);
        let stdout = self.run(&["-j", "--no-playlist", "--flat-playlist", search.as_str()]).await?;

        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| Self::parse_entry(line).map(YoutubeSong::from))
            .transpose()
    }

    async fn stream(&self, video_id: &str) -> MusicResult<AudioStream> {
        let url = YoutubeSong::watch_url(video_id);
        let stdout = self
            .run(&["-f", "bestaudio/best", "-g", "--no-playlist", url.as_str()])
            .await?;

        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|media| AudioStream::new(video_id, media))
            .ok_or_else(|| {
                MusicError::AudioSourceError(format!("yt-dlp returned no stream for {}", video_id))
            })
    }
}

#[async_trait]
impl MixProvider for YtDlpClient {
    async fn next_batch(&self, request: &MixRequest) -> MusicResult<MixBatch> {
        let url = Self::mix_url(request);
        let session_token = match &request.session_token {
            Some(token) => Some(token.clone()),
            None => self.visitor_data(&url).await,
        };
        let extractor_args = session_token
            .as_ref()
            .map(|token| format!("youtube:visitor_data={}", token));

        let args = Self::mix_args(&url, extractor_args.as_deref());
        let stdout = self.run(&args).await?;
        let entries = Self::parse_playlist(&stdout)?;
        debug!(mix_id = %request.mix_id, count = entries.len(), "Fetched mix batch");

        Ok(MixBatch {
            entries: entries.into_iter().map(MixEntry::from).collect(),
            session_token,
        })
    }
}

#[async_trait]
impl PlaylistExpander for YtDlpClient {
    async fn expand(&self, playlist_id: &str) -> MusicResult<Vec<Song>> {
        info!("Expanding YouTube playlist {}", playlist_id);
        let url = PlaylistSong::playlist_url(playlist_id);
        let stdout = self.run(&["-J", "--flat-playlist", url.as_str()]).await?;

        Ok(Self::parse_playlist(&stdout)?
            .into_iter()
            .map(|entry| Song::Youtube(entry.into()))
            .collect())
    }
}
