pub mod retry;

pub use retry::{commit_with_retries, RetryPolicy};
