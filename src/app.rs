use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use iced::{task, window, Subscription, Task};
use rfd::{AsyncFileDialog, AsyncMessageDialog, MessageButtons, MessageDialogResult, MessageLevel};
use tracing::{info, warn};

use crate::ui::{DownloadMessage, DownloadView};
use downtube::{
    api::{tools, YtDlpClient},
    application::{CancelFlag, DownloadCoordinator, DownloadEvent, ItemOutcome},
    config::Config,
    domain::{DownloadPhase, DownloadRequest, FetchResult, ResolveError},
};

pub struct DownloadApp {
    view: DownloadView,
    coordinator: DownloadCoordinator,
    config: Config,
    cancel: CancelFlag,
    /// Subscription to the running download's events.
    run_handle: Option<task::Handle>,
    ytdlp_binary: PathBuf,
    tools_checked: bool,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadApp {
    pub fn new() -> Self {
        let config = Config::load();
        let client = YtDlpClient::default();
        let ytdlp_binary = client.config().binary.clone();
        let coordinator = DownloadCoordinator::new(Arc::new(client));
        let mut view = DownloadView {
            kind: config.format,
            quality: config.quality,
            subtitles: config.subtitles,
            save_dir: config.save_dir.clone(),
            ..DownloadView::default()
        };

        view.push_log("Application started.");
        match config.ensure_save_dir() {
            Ok(true) => view.push_log(format!(
                "Created the default download folder: {}",
                config.save_dir.display()
            )),
            Ok(false) => {}
            Err(e) => {
                warn!("{}", e);
                view.status_message = format!("Could not create the download folder: {}", e);
                view.push_log(format!("Error creating the download folder: {}", e));
            }
        }

        Self {
            view,
            coordinator,
            config,
            cancel: CancelFlag::new(),
            run_handle: None,
            ytdlp_binary,
            tools_checked: false,
        }
    }

    fn is_running(&self) -> bool {
        matches!(
            self.view.phase,
            DownloadPhase::Downloading | DownloadPhase::Stopping
        )
    }

    fn save_config(&mut self) {
        self.config.save_dir = self.view.save_dir.clone();
        self.config.format = self.view.kind;
        self.config.quality = self.view.quality;
        self.config.subtitles = self.view.subtitles;
        match self.config.save() {
            Ok(()) => self.view.push_log("Settings saved."),
            Err(e) => {
                warn!("{}", e);
                self.view.push_log(format!("Error saving settings: {}", e));
            }
        }
    }

    /// Work out what the Start button should download, following what the
    /// user fetched and selected. `Err` carries a message for the user.
    fn build_request(&self) -> Result<DownloadRequest, String> {
        let url = self.view.url.trim().to_string();
        let mut request = DownloadRequest {
            url: url.clone(),
            output_dir: self.view.save_dir.clone(),
            quality: self.view.quality,
            kind: self.view.kind,
            subtitles: self.view.subtitles,
            items: None,
            collection_title: None,
        };

        if self.view.show_list && !self.view.items.is_empty() {
            let selected = self.view.selected_items();
            if selected.is_empty() {
                return Err("Please select at least one item from the list.".to_string());
            }
            request.items = Some(selected);
            request.collection_title = self.view.collection_title.clone();
        } else if self.view.items.len() == 1 {
            request.items = Some(vec![self.view.items[0].item.clone()]);
        } else if url.is_empty() {
            return Err(ResolveError::EmptyUrl.to_string());
        }
        Ok(request)
    }

    fn start_run(&mut self, request: DownloadRequest) -> Task<Message> {
        self.save_config();
        self.cancel.reset();
        self.view.phase = DownloadPhase::Downloading;
        self.view.status_message = "Preparing download...".to_string();
        self.view.reset_progress();
        if let Some(items) = &request.items {
            self.view
                .push_log(format!("{} item(s) scheduled for download.", items.len()));
        }
        info!("Starting download run for {}", request.url);

        let events = self
            .coordinator
            .download_stream(request, self.cancel.clone())
            .map(Message::Download);
        let (task, handle) = Task::stream(events).abortable();
        self.run_handle = Some(handle);
        task
    }

    fn apply_event(&mut self, event: DownloadEvent) -> Task<Message> {
        match event {
            DownloadEvent::Status(status) => self.view.status_message = status,
            DownloadEvent::Log(line) => self.view.push_log(line),
            DownloadEvent::Progress { percent, file } => self.view.set_progress(percent, &file),
            DownloadEvent::ItemDone { title, outcome } => {
                if let ItemOutcome::Succeeded { file: Some(path) } = outcome {
                    self.view
                        .push_log(format!("Saved '{}' to {}", title, path.display()));
                }
            }
            DownloadEvent::Failed(error) => {
                self.finish_run();
                self.view.status_message = format!("Error - {}", error);
                return show_message(MessageLevel::Error, "Error", error.to_string());
            }
            DownloadEvent::Finished(summary) => {
                self.finish_run();
                self.view.status_message = summary.message().to_string();
                if summary.stopped {
                    self.view.reset_progress();
                }
                self.view.push_log(format!(
                    "Run over: {} succeeded, {} failed.",
                    summary.succeeded, summary.failed
                ));
            }
        }
        Task::none()
    }

    fn finish_run(&mut self) {
        self.view.phase = DownloadPhase::Idle;
        self.run_handle = None;
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    InfoFetched(Result<FetchResult, ResolveError>),
    FolderPicked(Option<PathBuf>),
    /// Tool presence, and the request that waits on the check
    ToolsChecked {
        ffmpeg: bool,
        ytdlp: bool,
        request: DownloadRequest,
    },
    Download(DownloadEvent),
    StopConfirmed(bool),
    CloseRequested(window::Id),
    CloseConfirmed(window::Id, bool),
    DialogClosed,
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::FetchPressed => {
                    let url = app.view.url.trim().to_string();
                    if url.is_empty() {
                        return show_message(
                            MessageLevel::Warning,
                            "Notice",
                            ResolveError::EmptyUrl.to_string(),
                        );
                    }
                    if app.view.phase != DownloadPhase::Idle {
                        return Task::none();
                    }

                    app.view.phase = DownloadPhase::Fetching;
                    app.view.status_message = "Fetching media info...".to_string();
                    app.view.push_log(format!("Fetching info for: {}", url));

                    let coordinator = app.coordinator.clone();
                    return Task::perform(
                        async move { coordinator.fetch_info(&url).await },
                        Message::InfoFetched,
                    );
                }
                DownloadMessage::KindSelected(_)
                | DownloadMessage::QualitySelected(_)
                | DownloadMessage::SubtitlesToggled(_) => app.save_config(),
                DownloadMessage::ChooseFolderPressed => {
                    let current = app.view.save_dir.clone();
                    return Task::perform(
                        async move {
                            AsyncFileDialog::new()
                                .set_title("Choose download folder")
                                .set_directory(current)
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::FolderPicked,
                    );
                }
                DownloadMessage::StartPressed => {
                    if app.view.phase != DownloadPhase::Idle {
                        return Task::none();
                    }
                    let request = match app.build_request() {
                        Ok(request) => request,
                        Err(notice) => {
                            return show_message(MessageLevel::Warning, "Notice", notice);
                        }
                    };

                    if app.tools_checked {
                        return app.start_run(request);
                    }
                    app.view.phase = DownloadPhase::CheckingTools;
                    app.view.status_message = "Checking for FFmpeg and yt-dlp...".to_string();
                    let binary = app.ytdlp_binary.clone();
                    return Task::perform(
                        async move {
                            (
                                tools::ffmpeg_available().await,
                                tools::ytdlp_available(&binary).await,
                            )
                        },
                        move |(ffmpeg, ytdlp)| Message::ToolsChecked {
                            ffmpeg,
                            ytdlp,
                            request,
                        },
                    );
                }
                DownloadMessage::StopPressed => {
                    if app.view.can_stop() {
                        return Task::perform(
                            confirm(
                                "Confirm stop",
                                "Are you sure you want to stop the current download?",
                            ),
                            Message::StopConfirmed,
                        );
                    }
                }
                _ => {}
            }
        }
        Message::InfoFetched(result) => {
            app.view.phase = DownloadPhase::Idle;
            match result {
                Ok(result) => {
                    let count = result.items.len();
                    app.view.show_fetch_result(result);
                    app.view
                        .push_log(format!("Fetched info successfully. Items: {}", count));
                }
                Err(e) => {
                    app.view.status_message = format!("Error - {}", e);
                    app.view.push_log(format!("Error fetching info: {}", e));
                    return show_message(MessageLevel::Error, "Error", e.to_string());
                }
            }
        }
        Message::FolderPicked(Some(path)) => {
            app.view.save_dir = path;
            app.save_config();
            app.view
                .push_log(format!("Download folder set to: {}", app.view.save_dir.display()));
        }
        Message::FolderPicked(None) => {}
        Message::ToolsChecked {
            ffmpeg,
            ytdlp,
            request,
        } => {
            app.view.phase = DownloadPhase::Idle;
            if !ytdlp {
                let missing = format!(
                    "{} could not be run. Please install yt-dlp and add it to PATH.",
                    app.ytdlp_binary.display()
                );
                app.view.status_message = "yt-dlp not found".to_string();
                app.view.push_log(missing.clone());
                return show_message(MessageLevel::Error, "yt-dlp not found", missing);
            }
            app.tools_checked = true;
            let run = app.start_run(request);
            if ffmpeg {
                app.view.push_log("FFmpeg found.");
                return run;
            }
            app.view
                .push_log("Warning: FFmpeg is not installed or not on PATH.");
            return Task::batch([
                run,
                show_message(
                    MessageLevel::Warning,
                    "FFmpeg not found",
                    "FFmpeg was not found. Converting to mp3 and merging video may not work. \
                     Please install FFmpeg and add it to PATH."
                        .to_string(),
                ),
            ]);
        }
        Message::Download(event) => return app.apply_event(event),
        Message::StopConfirmed(true) => {
            if app.view.can_stop() && app.run_handle.is_some() {
                app.cancel.signal_stop();
                app.view.phase = DownloadPhase::Stopping;
                app.view.status_message = "Trying to stop the download...".to_string();
                app.view.push_log("User requested to stop the download.");
            }
        }
        Message::StopConfirmed(false) => {}
        Message::CloseRequested(id) => {
            app.save_config();
            if app.is_running() {
                return Task::perform(
                    confirm(
                        "Confirm exit",
                        "A download is in progress. Do you really want to quit? It will be stopped.",
                    ),
                    move |yes| Message::CloseConfirmed(id, yes),
                );
            }
            return window::close(id);
        }
        Message::CloseConfirmed(id, true) => {
            app.cancel.signal_stop();
            if let Some(handle) = app.run_handle.take() {
                handle.abort();
            }
            return window::close(id);
        }
        Message::CloseConfirmed(_, false) | Message::DialogClosed => {}
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

pub fn subscription(_app: &DownloadApp) -> Subscription<Message> {
    window::close_requests().map(Message::CloseRequested)
}

async fn confirm(title: &'static str, description: &'static str) -> bool {
    let answer = AsyncMessageDialog::new()
        .set_level(MessageLevel::Warning)
        .set_title(title)
        .set_description(description)
        .set_buttons(MessageButtons::YesNo)
        .show()
        .await;
    answer == MessageDialogResult::Yes
}

fn show_message(level: MessageLevel, title: &'static str, description: String) -> Task<Message> {
    Task::perform(
        async move {
            AsyncMessageDialog::new()
                .set_level(level)
                .set_title(title)
                .set_description(description)
                .set_buttons(MessageButtons::Ok)
                .show()
                .await;
        },
        |_| Message::DialogClosed,
    )
}
