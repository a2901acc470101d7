pub mod cancel;
pub mod download_coordinator;
pub mod resolver;

pub use cancel::CancelFlag;
pub use download_coordinator::{DownloadCoordinator, DownloadEvent, ItemOutcome, RunSummary};
