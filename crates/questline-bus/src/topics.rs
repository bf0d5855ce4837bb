pub const USER_LOGIN: &str = "user.login";
pub const USER_DELETION_REQUESTED: &str = "user.deletion.requested";
pub const USER_DELETION_SUCCEEDED: &str = "user.deletion.succeeded";
pub const USER_DELETION_FAILED: &str = "user.deletion.failed";
pub const PROGRESS_FAILED: &str = "event.progress.failed";
pub const PROGRESS_DLQ: &str = "event.progress.dlq";
