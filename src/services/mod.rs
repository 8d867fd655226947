//! Services layer - orchestration logic
//!
//! This module coordinates between domain logic and infrastructure.
//! Services use infrastructure adapters to perform I/O operations.

pub mod notification_service;
pub mod release_notes_service;
pub mod release_service;
pub mod test_service;
pub mod upload_service;

// Re-export commonly used types
pub use notification_service::{JiraTarget, NotificationService};
pub use release_notes_service::{ConfluenceTarget, ReleaseNotesService};
pub use release_service::ReleaseService;
pub use test_service::TestService;
pub use upload_service::UploadService;
