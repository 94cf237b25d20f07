//! Read-only view of pull requests and their comments.

pub mod fetch;
pub mod fields;
pub mod records;

pub use fetch::{get_comments, get_pulls, PullDetails, PullOrder, PullQuery};
pub use records::{Comment, PullRequest, RecordError};
