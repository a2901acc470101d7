use std::path::PathBuf;

use iced::{
    widget::{
        button, column, pick_list, progress_bar, row, scrollable, text, text_input, toggler,
        Column, Space,
    },
    Element, Length,
};

use downtube::domain::{DownloadPhase, FetchResult, MediaItem, OutputKind, QualityTier};
use downtube::utils::truncate_display;

/// A fetched item and whether it is picked for download.
#[derive(Debug, Clone)]
pub struct ListedItem {
    pub item: MediaItem,
    pub selected: bool,
}

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub items: Vec<ListedItem>,
    pub collection_title: Option<String>,
    /// The selectable list is shown for collections and multi-item results.
    pub show_list: bool,
    pub kind: OutputKind,
    pub quality: QualityTier,
    pub subtitles: bool,
    pub save_dir: PathBuf,
    pub status_message: String,
    pub download_progress: f32,
    pub progress_label: String,
    pub log: Vec<String>,
    pub phase: DownloadPhase,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url: String::new(),
            items: Vec::new(),
            collection_title: None,
            show_list: false,
            kind: OutputKind::default(),
            quality: QualityTier::default(),
            subtitles: false,
            save_dir: PathBuf::new(),
            status_message: "Ready".to_string(),
            download_progress: 0.0,
            progress_label: String::new(),
            log: Vec::new(),
            phase: DownloadPhase::Idle,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    FetchPressed,
    ClearPressed,
    ItemToggled(usize, bool),
    SelectAll,
    DeselectAll,
    KindSelected(OutputKind),
    QualitySelected(QualityTier),
    SubtitlesToggled(bool),
    ChooseFolderPressed,
    StartPressed,
    StopPressed,
}

impl DownloadView {
    /// Apply the purely visual part of a message. Side effects are handled by the app.
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url = url;
            }
            DownloadMessage::ClearPressed => {
                self.url.clear();
                self.items.clear();
                self.collection_title = None;
                self.show_list = false;
                self.status_message = "Ready".to_string();
                self.reset_progress();
                self.push_log("Cleared the URL and item list.");
            }
            DownloadMessage::ItemToggled(index, selected) => {
                if let Some(listed) = self.items.get_mut(index) {
                    listed.selected = selected;
                }
            }
            DownloadMessage::SelectAll => self.items.iter_mut().for_each(|i| i.selected = true),
            DownloadMessage::DeselectAll => self.items.iter_mut().for_each(|i| i.selected = false),
            DownloadMessage::KindSelected(kind) => self.kind = kind,
            DownloadMessage::QualitySelected(quality) => self.quality = quality,
            DownloadMessage::SubtitlesToggled(on) => self.subtitles = on,
            DownloadMessage::FetchPressed
            | DownloadMessage::ChooseFolderPressed
            | DownloadMessage::StartPressed
            | DownloadMessage::StopPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn show_fetch_result(&mut self, result: FetchResult) {
        self.show_list = result.is_collection();
        self.collection_title = result.collection_title;
        self.items = result
            .items
            .into_iter()
            .map(|item| ListedItem {
                item,
                selected: true,
            })
            .collect();

        if self.show_list {
            self.status_message = format!(
                "Fetched {} item(s). Pick the ones to download and press Start.",
                self.items.len()
            );
        } else if let Some(first) = self.items.first() {
            self.status_message = format!("Ready to download '{}'", truncate_display(&first.item.title, 50));
        }
    }

    pub fn selected_items(&self) -> Vec<MediaItem> {
        self.items
            .iter()
            .filter(|i| i.selected)
            .map(|i| i.item.clone())
            .collect()
    }

    pub fn set_progress(&mut self, percent: u8, file: &str) {
        self.download_progress = f32::from(percent);
        let short = truncate_display(file, 30);
        self.progress_label = if percent < 100 {
            format!("{} - {}%", short, percent)
        } else {
            format!("Completed: {}", short)
        };
    }

    pub fn reset_progress(&mut self) {
        self.download_progress = 0.0;
        self.progress_label.clear();
    }

    /// Only a run that has actually started can be stopped.
    pub fn can_stop(&self) -> bool {
        self.phase == DownloadPhase::Downloading
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let idle = self.phase == DownloadPhase::Idle;
        let downloading = self.can_stop();

        let url_row = row![
            text_input("Enter a video or playlist URL...", &self.url)
                .on_input(DownloadMessage::UrlChanged)
                .on_submit(DownloadMessage::FetchPressed)
                .padding(10)
                .width(Length::Fill),
            button("Fetch info")
                .on_press_maybe(idle.then_some(DownloadMessage::FetchPressed))
                .padding([10, 16]),
            button("Clear")
                .on_press_maybe(idle.then_some(DownloadMessage::ClearPressed))
                .padding([10, 16]),
        ]
        .spacing(8);

        let mut content = column![text("Media Downloader").size(28), url_row].spacing(10);

        if self.show_list {
            let heading = format!(
                "Items in '{}':",
                self.collection_title.as_deref().unwrap_or("current list")
            );
            let entries = Column::with_children(self.items.iter().enumerate().map(|(index, listed)| {
                toggler(listed.selected)
                    .label(listed.item.title.clone())
                    .on_toggle(move |on| DownloadMessage::ItemToggled(index, on))
                    .into()
            }))
            .spacing(4);

            content = content
                .push(text(heading).size(16))
                .push(scrollable(entries).height(Length::Fixed(180.0)))
                .push(
                    row![
                        button("Select all").on_press(DownloadMessage::SelectAll),
                        button("Deselect all").on_press(DownloadMessage::DeselectAll),
                    ]
                    .spacing(8),
                );
        }

        let settings_row = row![
            text("Format:"),
            pick_list(OutputKind::ALL, Some(self.kind), DownloadMessage::KindSelected),
            text("Quality:"),
            pick_list(QualityTier::ALL, Some(self.quality), DownloadMessage::QualitySelected),
            toggler(self.subtitles)
                .label("Download subtitles (if available)")
                .on_toggle(DownloadMessage::SubtitlesToggled),
        ]
        .spacing(10);

        let folder_row = row![
            text("Save to:"),
            text(self.save_dir.display().to_string()).width(Length::Fill),
            button("Choose folder")
                .on_press_maybe(idle.then_some(DownloadMessage::ChooseFolderPressed)),
        ]
        .spacing(8);

        let controls_row = row![
            button("Start download")
                .on_press_maybe(idle.then_some(DownloadMessage::StartPressed))
                .padding([10, 20])
                .width(Length::Fill),
            button("Stop download")
                .on_press_maybe(downloading.then_some(DownloadMessage::StopPressed))
                .padding([10, 20])
                .width(Length::Fill),
        ]
        .spacing(8);

        let log = Column::with_children(
            self.log
                .iter()
                .map(|line| text(line.as_str()).size(12).into()),
        );

        content
            .push(settings_row)
            .push(folder_row)
            .push(controls_row)
            .push(text(format!("Status: {}", self.status_message)).size(14))
            .push(progress_bar(0.0..=100.0, self.download_progress))
            .push(text(&self.progress_label).size(12))
            .push(Space::new().height(Length::Fixed(10.0)))
            .push(text("Log").size(16))
            .push(scrollable(log).anchor_bottom().height(Length::Fill))
            .padding(20)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: usize) -> MediaItem {
        MediaItem {
            title: format!("Item {}", n),
            id: format!("id{}", n),
            url: format!("https://www.youtube.com/watch?v=id{}", n),
        }
    }

    #[test]
    fn test_collection_shows_selectable_list() {
        let mut view = DownloadView::default();
        view.show_fetch_result(FetchResult {
            items: vec![item(1), item(2)],
            collection_title: Some("Mix".into()),
        });
        assert!(view.show_list);
        assert_eq!(view.selected_items().len(), 2);

        view.update(DownloadMessage::ItemToggled(0, false));
        assert_eq!(view.selected_items(), vec![item(2)]);
        view.update(DownloadMessage::DeselectAll);
        assert!(view.selected_items().is_empty());
        view.update(DownloadMessage::SelectAll);
        assert_eq!(view.selected_items().len(), 2);
    }

    #[test]
    fn test_single_item_hides_list() {
        let mut view = DownloadView::default();
        view.show_fetch_result(FetchResult {
            items: vec![item(1)],
            collection_title: None,
        });
        assert!(!view.show_list);
        assert!(view.status_message.contains("Item 1"));
    }

    #[test]
    fn test_clear_resets_list_and_progress() {
        let mut view = DownloadView::default();
        view.url = "https://example.com".into();
        view.show_fetch_result(FetchResult {
            items: vec![item(1), item(2)],
            collection_title: None,
        });
        view.set_progress(40, "clip.mp4");
        view.update(DownloadMessage::ClearPressed);
        assert!(view.url.is_empty());
        assert!(view.items.is_empty());
        assert!(!view.show_list);
        assert_eq!(view.download_progress, 0.0);
    }

    #[test]
    fn test_stop_only_offered_for_a_running_download() {
        let mut view = DownloadView::default();
        for phase in [
            DownloadPhase::Idle,
            DownloadPhase::Fetching,
            DownloadPhase::CheckingTools,
            DownloadPhase::Stopping,
        ] {
            view.phase = phase;
            assert!(!view.can_stop(), "{:?}", phase);
        }
        view.phase = DownloadPhase::Downloading;
        assert!(view.can_stop());
    }

    #[test]
    fn test_progress_label() {
        let mut view = DownloadView::default();
        view.set_progress(42, "song.webm");
        assert_eq!(view.progress_label, "song.webm - 42%");
        view.set_progress(100, "song.webm");
        assert_eq!(view.progress_label, "Completed: song.webm");
    }
}
