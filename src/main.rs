mod app;
mod ui;

use iced::{window, Size};

fn main() -> iced::Result {
    downtube::init_logging();

    iced::application(app::DownloadApp::default, app::update, app::view)
        .title("DownTube")
        .subscription(app::subscription)
        .window(window::Settings {
            size: Size::new(760.0, 820.0),
            exit_on_close_request: false,
            ..Default::default()
        })
        .run()
}
