use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::OutputKind;

/// Prefix of the machine-readable progress lines we ask yt-dlp to print.
pub const PROGRESS_PREFIX: &str = "downtube-progress";
/// Prefix of the line printed once the final file has been moved into place.
pub const FILEPATH_PREFIX: &str = "downtube-file";

/// Configuration for the yt-dlp client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub binary: PathBuf,
    /// Socket timeout for metadata lookups, in seconds.
    pub probe_timeout_secs: u32,
    /// Socket timeout while transferring media, in seconds.
    pub transfer_timeout_secs: u32,
    pub retries: u32,
    pub subtitle_langs: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            probe_timeout_secs: 20,
            transfer_timeout_secs: 60,
            retries: 5,
            subtitle_langs: vec!["ar".to_string(), "en".to_string()],
        }
    }
}

/// Output of `yt-dlp -J --flat-playlist`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProbeInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    /// Playlist entries. yt-dlp reports unavailable entries as `null`.
    #[serde(default)]
    pub entries: Option<Vec<Option<ProbeEntry>>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProbeEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// One item transfer handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub format: String,
    /// yt-dlp output template, e.g. `/out/%(title)s.%(ext)s`
    pub output_template: String,
    pub kind: OutputKind,
    pub subtitles: bool,
}

/// Progress reported for the transfer in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    Downloading {
        downloaded: u64,
        /// Exact size when known, otherwise yt-dlp's estimate.
        total: Option<u64>,
        filename: String,
    },
    Finished {
        filename: String,
    },
    /// Final file after post-processing has moved it into place.
    Saved {
        path: PathBuf,
    },
}

impl TransferStatus {
    /// Parse a line printed through our `--progress-template`:
    /// `downtube-progress|status|downloaded|total|estimate|filename`
    pub fn parse_line(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?.strip_prefix('|')?;
        let mut fields = rest.splitn(5, '|');
        let status = fields.next()?;
        let downloaded = parse_bytes(fields.next()?);
        let total = parse_bytes(fields.next()?);
        let estimate = parse_bytes(fields.next()?);
        let filename = fields.next().unwrap_or_default().trim().to_string();

        match status {
            "downloading" => Some(TransferStatus::Downloading {
                downloaded: downloaded.unwrap_or(0),
                total: total.or(estimate).filter(|t| *t > 0),
                filename,
            }),
            "finished" => Some(TransferStatus::Finished { filename }),
            _ => None,
        }
    }

    /// Integer percentage, only when a total is known.
    pub fn percent(&self) -> Option<u8> {
        match self {
            TransferStatus::Downloading {
                downloaded,
                total: Some(total),
                ..
            } => Some(((*downloaded as f64 / *total as f64) * 100.0).clamp(0.0, 100.0) as u8),
            TransferStatus::Downloading { .. } | TransferStatus::Saved { .. } => None,
            TransferStatus::Finished { .. } => Some(100),
        }
    }
}

/// Parse the line printed by `--print after_move:...`.
pub fn parse_filepath_line(line: &str) -> Option<PathBuf> {
    let path = line.trim().strip_prefix(FILEPATH_PREFIX)?.strip_prefix('|')?.trim();
    if path.is_empty() || path == "NA" {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// yt-dlp renders missing numbers as `NA` and sometimes as floats.
fn parse_bytes(field: &str) -> Option<u64> {
    let field = field.trim();
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_downloading_line() {
        let status =
            TransferStatus::parse_line("downtube-progress|downloading|512|2048|NA|/out/Song.webm").unwrap();
        assert_eq!(
            status,
            TransferStatus::Downloading {
                downloaded: 512,
                total: Some(2048),
                filename: "/out/Song.webm".into()
            }
        );
        assert_eq!(status.percent(), Some(25));
    }

    #[test]
    fn test_parse_uses_estimate_when_total_missing() {
        let status =
            TransferStatus::parse_line("downtube-progress|downloading|50|NA|200.0|clip.mp4").unwrap();
        assert_eq!(status.percent(), Some(25));
    }

    #[test]
    fn test_parse_unknown_total_has_no_percent() {
        let status = TransferStatus::parse_line("downtube-progress|downloading|50|NA|NA|clip.mp4").unwrap();
        assert_eq!(status.percent(), None);
    }

    #[test]
    fn test_parse_finished_line_keeps_pipes_in_filename() {
        let status =
            TransferStatus::parse_line("downtube-progress|finished|10|10|NA|/out/a | b.m4a").unwrap();
        assert_eq!(
            status,
            TransferStatus::Finished {
                filename: "/out/a | b.m4a".into()
            }
        );
        assert_eq!(status.percent(), Some(100));
    }

    #[test]
    fn test_parse_rejects_other_output() {
        assert_eq!(TransferStatus::parse_line("[download] Destination: x.mp4"), None);
        assert_eq!(TransferStatus::parse_line(""), None);
        assert_eq!(TransferStatus::parse_line("downtube-progress|error|1|2|3|x"), None);
    }

    #[test]
    fn test_percent_is_clamped() {
        let status = TransferStatus::Downloading {
            downloaded: 300,
            total: Some(200),
            filename: String::new(),
        };
        assert_eq!(status.percent(), Some(100));
    }

    #[test]
    fn test_parse_filepath_line() {
        assert_eq!(
            parse_filepath_line("downtube-file|/out/My Mix/Song.mp3"),
            Some(PathBuf::from("/out/My Mix/Song.mp3"))
        );
        assert_eq!(parse_filepath_line("downtube-file|NA"), None);
        assert_eq!(parse_filepath_line("something else"), None);
    }

    #[test]
    fn test_probe_info_accepts_null_entries() {
        let json = r#"{"id":"PL1","title":"My Mix","entries":[{"id":"a","title":"A"},null]}"#;
        let info: ProbeInfo = serde_json::from_str(json).unwrap();
        let entries = info.entries.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].is_none());
    }
}
