#![forbid(unsafe_code)]

//! Browser front end for DownTube.
//!
//! One server-rendered page over the same `DownloadCoordinator` the desktop
//! app uses. A download runs to completion inside the `POST /download`
//! request, so there is no way to stop it from the page.

use std::{
    env,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    extract::{Form, Path as AxumPath, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use futures::StreamExt;
use tokio::{signal, sync::Mutex};
use tracing::{info, warn};

use downtube::{
    api::{tools, YtDlpClient},
    application::{CancelFlag, DownloadCoordinator, DownloadEvent, ItemOutcome, RunSummary},
    config::Config,
    domain::{AppError, DownloadRequest, FetchResult, MediaItem, OutputKind, QualityTier, ResolveError},
};

const DEFAULT_ADDR: &str = "127.0.0.1:8501";
const ADDR_ENV: &str = "DOWNTUBE_WEB_ADDR";

#[derive(Debug, Clone, PartialEq)]
enum Notice {
    Success(String),
    Error(String),
}

/// Everything the page shows. There is a single session per process.
#[derive(Debug, Clone)]
struct Session {
    url: String,
    kind: OutputKind,
    quality: QualityTier,
    subtitles: bool,
    output_dir: PathBuf,
    fetched: Option<FetchResult>,
    notice: Option<Notice>,
    log: Vec<String>,
    outcomes: Vec<(String, ItemOutcome)>,
    /// Files produced by the last run; the only ones `/files` will serve.
    files: Vec<PathBuf>,
    /// Items handed to the last run.
    scheduled: usize,
    summary: Option<RunSummary>,
}

impl Session {
    fn from_config(config: &Config) -> Self {
        Self {
            url: String::new(),
            kind: config.format,
            quality: config.quality,
            subtitles: config.subtitles,
            output_dir: config.save_dir.clone(),
            fetched: None,
            notice: None,
            log: Vec::new(),
            outcomes: Vec::new(),
            files: Vec::new(),
            scheduled: 0,
            summary: None,
        }
    }

    /// Forget the fetched items and the last run, keeping the settings.
    fn clear(&mut self) {
        self.url.clear();
        self.fetched = None;
        self.notice = None;
        self.clear_run();
    }

    fn clear_run(&mut self) {
        self.log.clear();
        self.outcomes.clear();
        self.files.clear();
        self.scheduled = 0;
        self.summary = None;
    }

    fn apply_settings(&mut self, form: &FormFields) {
        if let Some(kind) = form.get("kind").and_then(OutputKind::from_label) {
            self.kind = kind;
        }
        if let Some(quality) = form.get("quality") {
            self.quality = QualityTier::from_label(quality);
        }
        self.subtitles = form.get("subtitles").is_some();
        if let Some(dir) = form.get("output_dir").map(str::trim).filter(|d| !d.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
    }

    fn record(&mut self, event: DownloadEvent) {
        match event {
            DownloadEvent::Log(line) => self.log.push(line),
            DownloadEvent::ItemDone { title, outcome } => {
                if let ItemOutcome::Succeeded { file: Some(path) } = &outcome {
                    self.files.push(path.clone());
                }
                self.outcomes.push((title, outcome));
            }
            DownloadEvent::Failed(e) => self.notice = Some(Notice::Error(e.to_string())),
            DownloadEvent::Finished(summary) => {
                self.notice = Some(Notice::Success(summary.message().to_string()));
                self.summary = Some(summary);
            }
            DownloadEvent::Status(_) | DownloadEvent::Progress { .. } => {}
        }
    }

    /// Items a download run should cover: the checked ones for a list,
    /// otherwise the single fetched item.
    fn items_to_download(&self, form: &FormFields) -> Result<(Vec<MediaItem>, Option<String>), String> {
        let fetched = self
            .fetched
            .as_ref()
            .ok_or_else(|| "Fetch the media info first.".to_string())?;

        if fetched.items.len() <= 1 {
            return Ok((fetched.items.clone(), fetched.collection_title.clone()));
        }

        let picked: Vec<MediaItem> = form
            .get_all("item")
            .filter_map(|index| index.parse::<usize>().ok())
            .filter_map(|index| fetched.items.get(index).cloned())
            .collect();
        if picked.is_empty() {
            return Err("Please select at least one item from the list.".to_string());
        }
        Ok((picked, fetched.collection_title.clone()))
    }

    fn produced_file(&self, name: &str) -> Option<&PathBuf> {
        self.files
            .iter()
            .find(|path| path.file_name().is_some_and(|file| file == name))
    }
}

#[derive(Clone)]
struct AppState {
    coordinator: DownloadCoordinator,
    session: Arc<Mutex<Session>>,
}

/// Submitted form fields in order. Checkbox lists repeat their field name,
/// so every pair is kept.
struct FormFields(Vec<(String, String)>);

impl FormFields {
    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug)]
struct WebError {
    status: StatusCode,
    message: String,
}

impl WebError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    downtube::init_logging();

    let addr = listen_addr(env::var(ADDR_ENV).ok().as_deref())?;
    let config = Config::load();
    if let Err(e) = config.ensure_save_dir() {
        warn!("{}", e);
    }

    let client = YtDlpClient::default();
    if !tools::ytdlp_available(&client.config().binary).await {
        warn!(
            "{} could not be run; fetching and downloading will fail",
            client.config().binary.display()
        );
    }
    if !tools::ffmpeg_available().await {
        warn!("FFmpeg not found; mp3 conversion and video merging may not work");
    }

    let state = AppState {
        coordinator: DownloadCoordinator::new(Arc::new(client)),
        session: Arc::new(Mutex::new(Session::from_config(&config))),
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/fetch", post(fetch))
        .route("/clear", post(clear))
        .route("/download", post(download))
        .route("/files/{name}", get(serve_file))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Io(format!("Binding to {}: {}", addr, e)))?;
    info!("Web app listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Io(format!("Serving: {}", e)))
}

fn listen_addr(value: Option<&str>) -> Result<SocketAddr, AppError> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(DEFAULT_ADDR);
    raw.parse()
        .map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", ADDR_ENV, raw, e)))
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(render_page(&session))
}

async fn fetch(
    State(state): State<AppState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let form = FormFields(fields);
    let url = form.get("url").unwrap_or_default().trim().to_string();

    {
        let mut session = state.session.lock().await;
        session.apply_settings(&form);
        session.url = url.clone();
        session.fetched = None;
        session.clear_run();
        if url.is_empty() {
            session.notice = Some(Notice::Error(ResolveError::EmptyUrl.to_string()));
            return Redirect::to("/");
        }
    }

    info!("Fetching info for {}", url);
    let result = state.coordinator.fetch_info(&url).await;

    let mut session = state.session.lock().await;
    match result {
        Ok(fetched) => {
            session.notice = Some(Notice::Success(format!(
                "Fetched {} item(s).",
                fetched.items.len()
            )));
            session.fetched = Some(fetched);
        }
        Err(e) => {
            warn!("Fetch failed for {}: {}", url, e);
            session.notice = Some(Notice::Error(e.to_string()));
        }
    }
    Redirect::to("/")
}

async fn clear(State(state): State<AppState>) -> Redirect {
    state.session.lock().await.clear();
    Redirect::to("/")
}

async fn download(
    State(state): State<AppState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let form = FormFields(fields);

    let request = {
        let mut session = state.session.lock().await;
        session.apply_settings(&form);
        session.clear_run();
        match session.items_to_download(&form) {
            Ok((items, collection_title)) => {
                session.scheduled = items.len();
                DownloadRequest {
                    url: session.url.clone(),
                    output_dir: session.output_dir.clone(),
                    quality: session.quality,
                    kind: session.kind,
                    subtitles: session.subtitles,
                    items: Some(items),
                    collection_title,
                }
            }
            Err(notice) => {
                session.notice = Some(Notice::Error(notice));
                return Redirect::to("/");
            }
        }
    };

    info!("Starting web download of {} item(s)", request.items.as_ref().map_or(0, Vec::len));
    let events: Vec<DownloadEvent> = state
        .coordinator
        .download_stream(request, CancelFlag::new())
        .collect()
        .await;

    let mut session = state.session.lock().await;
    for event in events {
        session.record(event);
    }
    Redirect::to("/")
}

async fn serve_file(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> Result<Response, WebError> {
    let path = {
        let session = state.session.lock().await;
        session
            .produced_file(&name)
            .cloned()
            .ok_or_else(|| WebError::not_found(format!("No downloaded file named '{}'", name)))?
    };

    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| WebError::internal(format!("Reading {}: {}", path.display(), e)))?;

    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "_"));
    Ok((
        [
            (header::CONTENT_TYPE, mime_for(&path).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

fn mime_for(path: &Path) -> &'static str {
    let kind = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(OutputKind::from_label);
    match kind {
        Some(kind) => kind.mime_type(),
        None => "application/octet-stream",
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"
body { background: #1e1f22; color: #dcdde1; font-family: sans-serif; max-width: 860px; margin: 2em auto; }
button { background: #0078d4; color: white; border: 0; border-radius: 5px; padding: 10px 20px; font-weight: bold; }
button:hover { background: #005a9e; }
input[type=text] { width: 100%; padding: 8px; }
.error { color: #ff6b6b; }
.success { color: #6bcb77; }
.log { background: #111214; padding: 8px; max-height: 240px; overflow-y: auto; font-size: 12px; }
"#;

fn render_page(session: &Session) -> String {
    let mut page = String::new();
    page.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>DownTube</title>");
    page.push_str(&format!("<style>{}</style></head><body>", STYLE));
    page.push_str("<h1>Media Downloader</h1>");

    match &session.notice {
        Some(Notice::Success(text)) => {
            page.push_str(&format!("<p class=\"success\">{}</p>", escape_html(text)))
        }
        Some(Notice::Error(text)) => {
            page.push_str(&format!("<p class=\"error\">{}</p>", escape_html(text)))
        }
        None => {}
    }

    page.push_str("<form method=\"post\" action=\"/fetch\">");
    page.push_str(&format!(
        "<input type=\"text\" name=\"url\" value=\"{}\" placeholder=\"Enter a video or playlist URL...\">",
        escape_html(&session.url)
    ));
    page.push_str(&render_settings(session));
    page.push_str("<p><button type=\"submit\">Fetch info</button> ");
    page.push_str("<button type=\"submit\" formaction=\"/clear\">Clear</button></p></form>");

    if let Some(fetched) = &session.fetched {
        page.push_str(&render_items(session, fetched));
    }

    if let Some(summary) = &session.summary {
        page.push_str(&render_progress(summary, session.scheduled));
    }

    for (title, outcome) in &session.outcomes {
        let line = match outcome {
            ItemOutcome::Succeeded { .. } => format!("<li class=\"success\">Completed: {}</li>", escape_html(title)),
            ItemOutcome::Stopped => format!("<li>Stopped: {}</li>", escape_html(title)),
            ItemOutcome::Failed(message) => format!("<li class=\"error\">{}</li>", escape_html(message)),
        };
        page.push_str(&line);
    }

    for path in &session.files {
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            page.push_str(&format!(
                "<p><a href=\"/files/{}\">Download: {}</a></p>",
                url::form_urlencoded::byte_serialize(name.as_bytes()).collect::<String>(),
                escape_html(name)
            ));
        }
    }

    if !session.log.is_empty() {
        page.push_str("<h3>Log</h3><div class=\"log\">");
        for line in &session.log {
            page.push_str(&format!("<div>{}</div>", escape_html(line)));
        }
        page.push_str("</div>");
    }

    page.push_str("</body></html>");
    page
}

/// Items that ran to an outcome, out of those scheduled. Stopped items and
/// the ones never started leave the bar short of full.
fn render_progress(summary: &RunSummary, scheduled: usize) -> String {
    let done = summary.succeeded + summary.failed;
    format!(
        "<p><progress value=\"{}\" max=\"{}\"></progress> {}/{} processed: {} succeeded, {} failed</p>",
        done,
        scheduled.max(1),
        done,
        scheduled,
        summary.succeeded,
        summary.failed
    )
}

fn render_settings(session: &Session) -> String {
    let mut html = String::from("<p>Format: <select name=\"kind\">");
    for kind in OutputKind::ALL {
        html.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>",
            kind.extension(),
            selected_attr(kind == session.kind),
            kind
        ));
    }
    html.push_str("</select> Quality: <select name=\"quality\">");
    for quality in QualityTier::ALL {
        html.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>",
            quality.as_str(),
            selected_attr(quality == session.quality),
            quality
        ));
    }
    html.push_str(&format!(
        "</select> <label><input type=\"checkbox\" name=\"subtitles\" value=\"on\"{}> Download subtitles (if available)</label></p>",
        if session.subtitles { " checked" } else { "" }
    ));
    html.push_str(&format!(
        "<p>Save to: <input type=\"text\" name=\"output_dir\" value=\"{}\"></p>",
        escape_html(&session.output_dir.display().to_string())
    ));
    html
}

/// The download form. It repeats the settings so a changed choice is not
/// lost between fetch and download.
fn render_items(session: &Session, fetched: &FetchResult) -> String {
    let mut html = String::from("<form method=\"post\" action=\"/download\">");
    if let Some(title) = &fetched.collection_title {
        html.push_str(&format!("<h2>{}</h2>", escape_html(title)));
    }

    if fetched.items.len() > 1 {
        html.push_str("<p>Pick the items to download:</p>");
        for (index, item) in fetched.items.iter().enumerate() {
            html.push_str(&format!(
                "<div><label><input type=\"checkbox\" name=\"item\" value=\"{}\" checked> {}</label></div>",
                index,
                escape_html(&item.title)
            ));
        }
    } else if let Some(item) = fetched.items.first() {
        html.push_str(&format!("<p>{}</p>", escape_html(&item.title)));
    }

    html.push_str(&render_settings(session));
    html.push_str("<p><button type=\"submit\">Start download</button></p></form>");
    html
}

fn selected_attr(selected: bool) -> &'static str {
    if selected {
        " selected"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: usize) -> MediaItem {
        MediaItem {
            title: format!("Item <{}>", n),
            id: format!("id{}", n),
            url: format!("https://www.youtube.com/watch?v=id{}", n),
        }
    }

    fn session_with(items: Vec<MediaItem>, collection_title: Option<&str>) -> Session {
        let mut session = Session::from_config(&Config::default());
        session.fetched = Some(FetchResult {
            items,
            collection_title: collection_title.map(String::from),
        });
        session
    }

    fn fields(pairs: &[(&str, &str)]) -> FormFields {
        FormFields(
            pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_form_keeps_repeated_fields() {
        use axum::{body::Body, extract::FromRequest, http::Request};

        let request = Request::builder()
            .method("POST")
            .uri("/download")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("url=https%3A%2F%2Fyoutu.be%2Fx&item=0&item=2&kind=mp3"))
            .unwrap();
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &())
            .await
            .unwrap();

        let form = FormFields(pairs);
        assert_eq!(form.get("url"), Some("https://youtu.be/x"));
        assert_eq!(form.get_all("item").collect::<Vec<_>>(), vec!["0", "2"]);
        assert_eq!(form.get("missing"), None);
    }

    #[test]
    fn test_settings_follow_the_form() {
        let mut session = Session::from_config(&Config::default());
        session.subtitles = true;
        session.apply_settings(&fields(&[
            ("kind", "mp3"),
            ("quality", "ultra"),
            ("output_dir", "/tmp/out"),
        ]));
        assert_eq!(session.kind, OutputKind::Audio);
        assert_eq!(session.quality, QualityTier::Medium);
        assert!(!session.subtitles);
        assert_eq!(session.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_list_items_need_a_selection() {
        let session = session_with(vec![item(0), item(1), item(2)], Some("Mix"));

        let (picked, title) = session
            .items_to_download(&fields(&[("item", "2"), ("item", "0"), ("item", "9")]))
            .unwrap();
        assert_eq!(picked, vec![item(2), item(0)]);
        assert_eq!(title.as_deref(), Some("Mix"));

        assert!(session.items_to_download(&fields(&[])).is_err());
    }

    #[test]
    fn test_single_item_needs_no_selection() {
        let session = session_with(vec![item(0)], None);
        let (picked, title) = session.items_to_download(&fields(&[])).unwrap();
        assert_eq!(picked, vec![item(0)]);
        assert_eq!(title, None);
    }

    #[test]
    fn test_download_requires_fetch() {
        let session = Session::from_config(&Config::default());
        assert!(session.items_to_download(&fields(&[])).is_err());
    }

    #[test]
    fn test_recorded_run_exposes_only_produced_files() {
        let mut session = session_with(vec![item(0), item(1)], None);
        session.record(DownloadEvent::ItemDone {
            title: "a".into(),
            outcome: ItemOutcome::Succeeded {
                file: Some(PathBuf::from("/out/Mix/song.mp3")),
            },
        });
        session.record(DownloadEvent::ItemDone {
            title: "b".into(),
            outcome: ItemOutcome::Failed("Error downloading 'b': Download error: boom".into()),
        });
        session.record(DownloadEvent::Finished(RunSummary {
            succeeded: 1,
            failed: 1,
            stopped: false,
        }));

        assert_eq!(session.produced_file("song.mp3"), Some(&PathBuf::from("/out/Mix/song.mp3")));
        assert_eq!(session.produced_file("../config.json"), None);
        assert_eq!(
            session.notice,
            Some(Notice::Success("All scheduled downloads completed.".into()))
        );

        let page = render_page(&session);
        assert!(page.contains("href=\"/files/song.mp3\""));
        assert!(page.contains("Download error: boom"));
    }

    #[test]
    fn test_progress_counts_against_scheduled_items() {
        let mut session = session_with(vec![item(0), item(1), item(2)], None);
        session.scheduled = 3;
        session.record(DownloadEvent::ItemDone {
            title: "a".into(),
            outcome: ItemOutcome::Succeeded { file: None },
        });
        session.record(DownloadEvent::ItemDone {
            title: "b".into(),
            outcome: ItemOutcome::Stopped,
        });
        session.record(DownloadEvent::Finished(RunSummary {
            succeeded: 1,
            failed: 0,
            stopped: true,
        }));

        let page = render_page(&session);
        assert!(page.contains("<progress value=\"1\" max=\"3\">"));
        assert!(page.contains("1/3 processed"));
        assert_eq!(
            session.notice,
            Some(Notice::Success("Download stopped.".into()))
        );

        session.clear_run();
        assert_eq!(session.scheduled, 0);
        assert!(!render_page(&session).contains("<progress"));
    }

    #[test]
    fn test_page_checks_every_item_and_escapes_titles() {
        let session = session_with(vec![item(0), item(1)], Some("A & B"));
        let page = render_page(&session);
        assert_eq!(page.matches("name=\"item\"").count(), 2);
        assert_eq!(page.matches(" checked>").count(), 2);
        assert!(page.contains("Item &lt;1&gt;"));
        assert!(page.contains("<h2>A &amp; B</h2>"));
        assert!(!page.contains("Item <1>"));
    }

    #[test]
    fn test_mime_follows_extension() {
        assert_eq!(mime_for(Path::new("a/song.mp3")), "audio/mpeg");
        assert_eq!(mime_for(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(mime_for(Path::new("clip.webm")), "application/octet-stream");
    }

    #[test]
    fn test_listen_addr() {
        assert_eq!(listen_addr(None).unwrap(), DEFAULT_ADDR.parse::<SocketAddr>().unwrap());
        assert_eq!(
            listen_addr(Some("0.0.0.0:9000")).unwrap(),
            "0.0.0.0:9000".parse::<SocketAddr>().unwrap()
        );
        assert!(listen_addr(Some("nowhere")).is_err());
    }
}
