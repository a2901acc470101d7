use tracing::info;
use url::Url;

use crate::api::{MediaBackend, ProbeInfo};
use crate::domain::{FetchResult, MediaItem, ResolveError};

const WATCH_URL_BASE: &str = "https://www.youtube.com/watch";
pub const UNTITLED_COLLECTION: &str = "Untitled playlist";
pub const UNTITLED_ITEM: &str = "Untitled video";

/// Resolve a URL into the items it refers to, without downloading anything.
pub async fn resolve(backend: &dyn MediaBackend, url: &str) -> Result<FetchResult, ResolveError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ResolveError::EmptyUrl);
    }

    let info = backend.probe(url).await?;
    let result = fetch_result_from_probe(info)?;
    info!(
        "Resolved {} to {} item(s){}",
        url,
        result.items.len(),
        result
            .collection_title
            .as_deref()
            .map(|t| format!(" in '{}'", t))
            .unwrap_or_default()
    );
    Ok(result)
}

pub fn fetch_result_from_probe(info: ProbeInfo) -> Result<FetchResult, ResolveError> {
    match info.entries {
        Some(entries) if !entries.is_empty() => {
            let collection_title = non_empty(info.title).unwrap_or_else(|| UNTITLED_COLLECTION.to_string());
            let items: Vec<MediaItem> = entries
                .into_iter()
                .flatten()
                .filter_map(|entry| {
                    let id = non_empty(entry.id)?;
                    Some(MediaItem {
                        title: non_empty(entry.title).unwrap_or_else(|| UNTITLED_ITEM.to_string()),
                        url: watch_url(&id),
                        id,
                    })
                })
                .collect();

            if items.is_empty() {
                return Err(ResolveError::NoItemsFound);
            }
            Ok(FetchResult {
                items,
                collection_title: Some(collection_title),
            })
        }
        _ => {
            let id = non_empty(info.id).ok_or(ResolveError::NoItemsFound)?;
            let url = non_empty(info.webpage_url).unwrap_or_else(|| watch_url(&id));
            Ok(FetchResult {
                items: vec![MediaItem {
                    title: non_empty(info.title).unwrap_or_else(|| UNTITLED_ITEM.to_string()),
                    url,
                    id,
                }],
                collection_title: None,
            })
        }
    }
}

/// Watch-page URL rebuilt from an entry id
pub fn watch_url(id: &str) -> String {
    Url::parse_with_params(WATCH_URL_BASE, &[("v", id)])
        .map(String::from)
        .unwrap_or_else(|_| format!("{}?v={}", WATCH_URL_BASE, id))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
