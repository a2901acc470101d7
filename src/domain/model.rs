use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One downloadable entry as reported by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub title: String,
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub items: Vec<MediaItem>,
    /// Present only when the URL pointed at a playlist or similar collection.
    pub collection_title: Option<String>,
}

impl FetchResult {
    pub fn is_collection(&self) -> bool {
        self.collection_title.is_some() || self.items.len() > 1
    }
}

/// Coarse video-resolution ceiling picked by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::Low, QualityTier::Medium, QualityTier::High];

    /// Unknown labels fall back to the medium tier.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => QualityTier::Low,
            "high" => QualityTier::High,
            _ => QualityTier::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
        }
    }
}

impl From<String> for QualityTier {
    fn from(label: String) -> Self {
        QualityTier::from_label(&label)
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityTier::Low => "Low (360p)",
            QualityTier::Medium => "Medium (720p)",
            QualityTier::High => "High (1080p)",
        };
        f.write_str(label)
    }
}

/// Audio-only (mp3) or muxed video (mp4) result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputKind {
    #[serde(rename = "mp3", alias = "audio")]
    Audio,
    #[default]
    #[serde(rename = "mp4", alias = "video")]
    Video,
}

impl OutputKind {
    pub const ALL: [OutputKind; 2] = [OutputKind::Video, OutputKind::Audio];

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "mp3" | "audio" => Some(OutputKind::Audio),
            "mp4" | "video" => Some(OutputKind::Video),
            _ => None,
        }
    }

    /// Container extension of the final file.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::Audio => "mp3",
            OutputKind::Video => "mp4",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputKind::Audio => "audio/mpeg",
            OutputKind::Video => "video/mp4",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Everything one download run needs. Consumed by the coordinator.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub quality: QualityTier,
    pub kind: OutputKind,
    pub subtitles: bool,
    /// Items picked from an earlier fetch. When absent the URL is resolved first.
    pub items: Option<Vec<MediaItem>>,
    pub collection_title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Fetching,
    /// Looking for ffmpeg and yt-dlp before the first run. No run exists yet.
    CheckingTools,
    Downloading,
    Stopping,
}
