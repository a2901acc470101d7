use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use tracing::{info, warn};

use super::cancel::CancelFlag;
use super::resolver::{self, UNTITLED_COLLECTION};
use crate::{
    api::{DownloadJob, MediaBackend, TransferStatus},
    domain::{
        select_format, DownloadRequest, FetchResult, MediaItem, ResolveError, TransferError,
    },
    utils::{sanitize_filename, truncate_display},
};

/// Everything a shell needs to render a download run.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Status(String),
    Log(String),
    /// Percentage of the current file, with its base name.
    Progress { percent: u8, file: String },
    ItemDone { title: String, outcome: ItemOutcome },
    /// The URL could not be resolved. Terminal; no item was attempted.
    Failed(ResolveError),
    /// Terminal summary of the run.
    Finished(RunSummary),
}

impl DownloadEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadEvent::Failed(_) | DownloadEvent::Finished(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Succeeded { file: Option<PathBuf> },
    Stopped,
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub stopped: bool,
}

impl RunSummary {
    pub fn message(&self) -> &'static str {
        if self.stopped {
            "Download stopped."
        } else {
            "All scheduled downloads completed."
        }
    }
}

#[derive(Clone)]
pub struct DownloadCoordinator {
    backend: Arc<dyn MediaBackend>,
}

impl DownloadCoordinator {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self { backend }
    }

    pub async fn fetch_info(&self, url: &str) -> Result<FetchResult, ResolveError> {
        resolver::resolve(self.backend.as_ref(), url).await
    }

    /// Stream the events of a run of `request`. The stream ends right after
    /// the terminal event.
    ///
    /// The run is driven by polling the stream, so dropping the stream
    /// abandons the run and kills any child process it owns.
    pub fn download_stream(
        &self,
        request: DownloadRequest,
        cancel: CancelFlag,
    ) -> BoxStream<'static, DownloadEvent> {
        let (tx, rx) = mpsc::unbounded();
        let coordinator = self.clone();
        let driver = async move { coordinator.run(request, cancel, tx).await }
            .into_stream()
            .filter_map(|()| async { None::<DownloadEvent> });
        stream::select(driver, rx).boxed()
    }

    /// Download the requested items one after another.
    ///
    /// `cancel` is only observed, never cleared: the caller resets it before
    /// the run starts.
    pub async fn run(
        &self,
        request: DownloadRequest,
        cancel: CancelFlag,
        events: UnboundedSender<DownloadEvent>,
    ) {
        let sink = EventSink(events);

        let (items, collection_title) = match request.items.clone() {
            Some(items) => (items, request.collection_title.clone()),
            None => {
                sink.log(format!("Fetching info for {}", request.url));
                match self.fetch_info(&request.url).await {
                    Ok(result) => (
                        result.items,
                        request.collection_title.clone().or(result.collection_title),
                    ),
                    Err(e) => {
                        warn!("Resolution failed for {}: {}", request.url, e);
                        sink.log(format!("Failed: {}", e));
                        sink.send(DownloadEvent::Failed(e));
                        return;
                    }
                }
            }
        };

        if items.is_empty() {
            sink.log("Nothing to download.".to_string());
            sink.send(DownloadEvent::Failed(ResolveError::NoItemsFound));
            return;
        }

        let format = select_format(request.quality, request.kind);
        let total = items.len();
        let mut summary = RunSummary::default();
        info!("Starting run of {} item(s) with format {}", total, format);

        for (index, item) in items.iter().enumerate() {
            if cancel.is_stopped() {
                sink.log("Download stopped by user.".to_string());
                break;
            }

            sink.log(format!("Starting download ({}/{}): {}", index + 1, total, item.title));
            sink.status(format!(
                "Downloading ({}/{}): {}",
                index + 1,
                total,
                truncate_display(&item.title, 50)
            ));

            let outcome = self
                .download_item(&request, &format, collection_title.as_deref(), item, &cancel, &sink)
                .await;

            match &outcome {
                ItemOutcome::Succeeded { .. } => {
                    summary.succeeded += 1;
                    sink.log(format!("Downloaded '{}' successfully.", item.title));
                }
                ItemOutcome::Stopped => {
                    sink.status(format!("Stopped: {}", truncate_display(&item.title, 50)));
                    sink.log(format!("Stopped downloading '{}'.", item.title));
                }
                ItemOutcome::Failed(message) => {
                    summary.failed += 1;
                    warn!("{}", message);
                    sink.log(message.clone());
                }
            }
            sink.send(DownloadEvent::ItemDone {
                title: item.title.clone(),
                outcome,
            });
        }

        summary.stopped = cancel.is_stopped();
        info!(
            "Run finished: {} succeeded, {} failed, stopped: {}",
            summary.succeeded, summary.failed, summary.stopped
        );
        sink.status(summary.message().to_string());
        sink.log(summary.message().to_string());
        sink.send(DownloadEvent::Finished(summary));
    }

    async fn download_item(
        &self,
        request: &DownloadRequest,
        format: &str,
        collection_title: Option<&str>,
        item: &MediaItem,
        cancel: &CancelFlag,
        sink: &EventSink,
    ) -> ItemOutcome {
        let output_dir = match collection_title {
            Some(title) => {
                let dir = request.output_dir.join(collection_folder_name(title));
                if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                    return ItemOutcome::Failed(format!(
                        "Failed to create playlist folder {}: {}",
                        dir.display(),
                        e
                    ));
                }
                dir
            }
            None => request.output_dir.clone(),
        };

        let job = DownloadJob {
            url: item.url.clone(),
            format: format.to_string(),
            output_template: output_template(&output_dir),
            kind: request.kind,
            subtitles: request.subtitles,
        };

        let mut saved = None;
        let result = {
            let mut hook = |status: TransferStatus| -> Result<(), TransferError> {
                // Printed once post-processing is done; the file is complete.
                if let TransferStatus::Saved { path } = status {
                    saved = Some(path);
                    return Ok(());
                }
                if cancel.is_stopped() {
                    return Err(TransferError::Cancelled);
                }
                let percent = status.percent();
                match status {
                    TransferStatus::Downloading { filename, .. } => {
                        if let Some(percent) = percent {
                            sink.send(DownloadEvent::Progress {
                                percent,
                                file: base_name(&filename),
                            });
                        }
                    }
                    TransferStatus::Finished { filename } => {
                        let file = base_name(&filename);
                        sink.log(format!("Finished downloading: {}", file));
                        sink.send(DownloadEvent::Progress { percent: 100, file });
                    }
                    TransferStatus::Saved { .. } => {}
                }
                Ok(())
            };
            self.backend.download(&job, &mut hook).await
        };

        match result {
            Ok(()) => ItemOutcome::Succeeded { file: saved },
            Err(TransferError::Cancelled) => ItemOutcome::Stopped,
            Err(e) => ItemOutcome::Failed(format!("Error downloading '{}': {}", item.title, e)),
        }
    }
}

/// Folder a collection's items are saved under.
pub fn collection_folder_name(title: &str) -> String {
    let name = sanitize_filename(title);
    // "." and ".." would resolve outside the output directory.
    if name.chars().all(|c| c == '.') {
        UNTITLED_COLLECTION.to_string()
    } else {
        name
    }
}

fn output_template(dir: &Path) -> String {
    dir.join("%(title)s.%(ext)s").to_string_lossy().into_owned()
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Sending only fails once the receiver is gone, and then nobody is listening.
struct EventSink(UnboundedSender<DownloadEvent>);

impl EventSink {
    fn send(&self, event: DownloadEvent) {
        let _ = self.0.unbounded_send(event);
    }

    fn log(&self, message: String) {
        self.send(DownloadEvent::Log(message));
    }

    fn status(&self, message: String) {
        self.send(DownloadEvent::Status(message));
    }
}
