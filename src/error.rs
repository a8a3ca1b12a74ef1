/// Errors surfaced by the regimen engine.
///
/// Read paths (`list`, `list_all`, agenda projection) never return these;
/// they log and fall back to empty collections. Write paths propagate them
/// so the caller can report and retry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The durable store rejected a read or write, or held undecodable data.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Notification permission was denied or the service is unavailable.
    #[error("notifications not permitted: {0}")]
    NotSupportedPermission(String),

    /// A task carries values the engine cannot work with.
    #[error("invalid task state: {0}")]
    InvalidTaskState(String),

    /// No task with the given id exists.
    #[error("task {0} not found")]
    TaskNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
