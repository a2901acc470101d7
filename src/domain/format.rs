use super::model::{OutputKind, QualityTier};

/// Build the yt-dlp format-selection expression for a tier and output kind.
///
/// Audio ignores the tier: the bitrate of the mp3 is fixed by the
/// post-processing step instead.
pub fn select_format(quality: QualityTier, kind: OutputKind) -> String {
    match kind {
        OutputKind::Audio => "bestaudio/best".to_string(),
        OutputKind::Video => {
            let video = match quality {
                QualityTier::Low => "best[height<=360]",
                QualityTier::Medium => "best[height<=720]",
                QualityTier::High => "best[height<=1080]/bestvideo[height<=1080]+bestaudio/best",
            };
            format!("{video}[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best")
        }
    }
}
