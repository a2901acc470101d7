use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// Check if ffmpeg is available on the system. yt-dlp needs it for mp3
/// extraction and for merging separate video and audio streams.
pub async fn ffmpeg_available() -> bool {
    tool_responds(Path::new("ffmpeg"), "-version").await
}

/// Check if the yt-dlp executable at `binary` can be run
pub async fn ytdlp_available(binary: &Path) -> bool {
    tool_responds(binary, "--version").await
}

async fn tool_responds(binary: &Path, version_arg: &str) -> bool {
    let status = Command::new(binary)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await;

    match status {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("{} not runnable: {}", binary.display(), e);
            false
        }
    }
}
