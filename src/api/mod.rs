//! Adapter over the external extraction tool (yt-dlp).

pub mod client;
pub mod models;
pub mod tools;

use async_trait::async_trait;

use crate::domain::{ResolveError, TransferError};

pub use client::YtDlpClient;
pub use models::{DownloadJob, ProbeEntry, ProbeInfo, TransferStatus};

/// Called for every progress tick of a transfer. Returning an error aborts
/// the transfer and the backend hands that error back to its caller.
pub type ProgressHook<'a> = dyn FnMut(TransferStatus) -> Result<(), TransferError> + Send + 'a;

/// The seam between the coordinator and whatever performs extraction.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Metadata-only lookup. No media bytes are fetched.
    async fn probe(&self, url: &str) -> Result<ProbeInfo, ResolveError>;

    /// Download one item, reporting progress through `hook`.
    async fn download(
        &self,
        job: &DownloadJob,
        hook: &mut ProgressHook<'_>,
    ) -> Result<(), TransferError>;
}
