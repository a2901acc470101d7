use thiserror::Error;

/// Failures while turning a URL into a list of items. None of these start a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Please enter a media URL first")]
    EmptyUrl,

    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("The item is unavailable")]
    Unavailable,

    #[error("No items found for this URL")]
    NoItemsFound,

    #[error("Failed to fetch media info: {0}")]
    Failed(String),
}

/// Failures of a single item's transfer. Always scoped to that item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("Download stopped by user")]
    Cancelled,

    #[error("Connection timed out. Check your internet connection and try again ({0})")]
    TimedOut(String),

    #[error("Access denied (403). The item may be private or restricted ({0})")]
    AccessDenied(String),

    #[error("Download error: {0}")]
    Failed(String),
}

impl TransferError {
    /// Classify raw failure text reported by the extraction tool.
    pub fn classify(text: &str) -> Self {
        let detail = text.trim().to_string();
        let lower = detail.to_lowercase();
        if lower.contains("timed out") || lower.contains("timeout") {
            TransferError::TimedOut(detail)
        } else if lower.contains("http error 403") || lower.contains("forbidden") {
            TransferError::AccessDenied(detail)
        } else {
            TransferError::Failed(detail)
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_timeout() {
        let err = TransferError::classify("ERROR: Read timed out. (read timeout=60)");
        assert!(matches!(err, TransferError::TimedOut(_)));
        assert!(err.to_string().starts_with("Connection timed out"));
    }

    #[test]
    fn test_classify_forbidden() {
        let err = TransferError::classify("ERROR: unable to download video data: HTTP Error 403: Forbidden");
        assert!(matches!(err, TransferError::AccessDenied(_)));
        assert!(err.to_string().contains("private or restricted"));
    }

    #[test]
    fn test_classify_other_keeps_text() {
        let err = TransferError::classify("  ERROR: something broke\n");
        assert_eq!(err, TransferError::Failed("ERROR: something broke".into()));
        assert_eq!(err.to_string(), "Download error: ERROR: something broke");
    }

    #[test]
    fn test_unsupported_url_message_names_url() {
        let err = ResolveError::UnsupportedUrl("https://example.com/x".into());
        assert!(err.to_string().contains("https://example.com/x"));
    }
}
