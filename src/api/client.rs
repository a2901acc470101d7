use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::models::{
    parse_filepath_line, ApiConfig, DownloadJob, ProbeInfo, TransferStatus, FILEPATH_PREFIX,
    PROGRESS_PREFIX,
};
use super::{MediaBackend, ProgressHook};
use crate::domain::{OutputKind, ResolveError, TransferError};

/// Runs the `yt-dlp` executable as a child process.
#[derive(Clone)]
pub struct YtDlpClient {
    config: ApiConfig,
}

impl YtDlpClient {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn probe_args(&self, url: &str) -> Vec<String> {
        vec![
            "-J".to_string(),
            "--flat-playlist".to_string(),
            "--skip-download".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.probe_timeout_secs.to_string(),
            url.to_string(),
        ]
    }

    fn download_args(&self, job: &DownloadJob) -> Vec<String> {
        let progress_template = format!(
            "download:{PROGRESS_PREFIX}|%(progress.status)s|%(progress.downloaded_bytes)s|\
             %(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.filename)s"
        );
        let retries = self.config.retries.to_string();

        let mut args: Vec<String> = vec![
            "-f".into(),
            job.format.clone(),
            "-o".into(),
            job.output_template.clone(),
            "--retries".into(),
            retries.clone(),
            "--fragment-retries".into(),
            retries,
            "--socket-timeout".into(),
            self.config.transfer_timeout_secs.to_string(),
            "--no-keep-video".into(),
            "--quiet".into(),
            "--no-warnings".into(),
            "--newline".into(),
            "--progress".into(),
            "--progress-template".into(),
            progress_template,
            "--print".into(),
            format!("after_move:{FILEPATH_PREFIX}|%(filepath)s"),
            "--no-simulate".into(),
        ];

        match job.kind {
            OutputKind::Audio => args.extend([
                "-x".into(),
                "--audio-format".into(),
                "mp3".into(),
                "--audio-quality".into(),
                "192K".into(),
            ]),
            OutputKind::Video => args.extend(["--merge-output-format".into(), "mp4".into()]),
        }

        if job.subtitles {
            args.extend([
                "--write-subs".into(),
                "--write-auto-subs".into(),
                "--sub-langs".into(),
                self.config.subtitle_langs.join(","),
            ]);
        }

        args.push(job.url.clone());
        args
    }
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new(ApiConfig::default())
    }
}

#[async_trait]
impl MediaBackend for YtDlpClient {
    async fn probe(&self, url: &str) -> Result<ProbeInfo, ResolveError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ResolveError::EmptyUrl);
        }

        debug!("Probing {}", url);
        let output = Command::new(&self.config.binary)
            .args(self.probe_args(url))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ResolveError::Failed(format!(
                    "failed to run {}: {}",
                    self.config.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp probe failed for {}: {}", url, stderr.trim());
            return Err(classify_probe_error(url, &stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() || stdout == "null" {
            return Err(ResolveError::NoItemsFound);
        }

        serde_json::from_str(stdout)
            .map_err(|e| ResolveError::Failed(format!("invalid metadata from yt-dlp: {}", e)))
    }

    async fn download(
        &self,
        job: &DownloadJob,
        hook: &mut ProgressHook<'_>,
    ) -> Result<(), TransferError> {
        info!("Starting yt-dlp for {}", job.url);
        let mut child = Command::new(&self.config.binary)
            .args(self.download_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TransferError::Failed(format!(
                    "failed to start {}: {}",
                    self.config.binary.display(),
                    e
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransferError::Failed("yt-dlp stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransferError::Failed("yt-dlp stderr unavailable".into()))?;

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut diagnostics = Vec::new();

        while stdout_open || stderr_open {
            let line = tokio::select! {
                next = stdout_lines.next_line(), if stdout_open => match next {
                    Ok(Some(line)) => line,
                    _ => {
                        stdout_open = false;
                        continue;
                    }
                },
                next = stderr_lines.next_line(), if stderr_open => match next {
                    Ok(Some(line)) => line,
                    _ => {
                        stderr_open = false;
                        continue;
                    }
                },
            };

            let status = TransferStatus::parse_line(&line)
                .or_else(|| parse_filepath_line(&line).map(|path| TransferStatus::Saved { path }));

            match status {
                Some(status) => {
                    if let Err(err) = hook(status) {
                        info!("Aborting yt-dlp for {}: {}", job.url, err);
                        let _ = child.kill().await;
                        return Err(err);
                    }
                }
                None if !line.trim().is_empty() => {
                    debug!("yt-dlp: {}", line);
                    diagnostics.push(line);
                }
                None => {}
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| TransferError::Failed(format!("yt-dlp process failed: {}", e)))?;

        if status.success() {
            Ok(())
        } else {
            let summary = error_summary(&diagnostics.join("\n"));
            warn!("yt-dlp exited with {} for {}: {}", status, job.url, summary);
            Err(TransferError::classify(&summary))
        }
    }
}

fn classify_probe_error(url: &str, stderr: &str) -> ResolveError {
    if stderr.contains("Unsupported URL") {
        ResolveError::UnsupportedUrl(url.to_string())
    } else if stderr.contains("Video unavailable") {
        ResolveError::Unavailable
    } else {
        ResolveError::Failed(error_summary(stderr))
    }
}

/// Last `ERROR:` line of yt-dlp output, or the trimmed tail if there is none.
fn error_summary(output: &str) -> String {
    let last_error = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR:"));

    match last_error {
        Some(line) => line.trim_start_matches("ERROR:").trim().to_string(),
        None => {
            let trimmed = output.trim();
            if trimmed.is_empty() {
                "yt-dlp exited without an error message".to_string()
            } else {
                trimmed.chars().rev().take(300).collect::<Vec<_>>().into_iter().rev().collect()
            }
        }
    }
}
