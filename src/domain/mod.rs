pub mod error;
pub mod format;
pub mod model;

pub use error::{AppError, ResolveError, TransferError};
pub use format::select_format;
pub use model::{
    DownloadPhase, DownloadRequest, FetchResult, MediaItem, OutputKind, QualityTier,
};
