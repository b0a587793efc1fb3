pub mod models;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use models::flag::Flag;
pub use models::issue::{Issue, IssueWithDistance, NearbyFilter, NewIssue};
pub use models::stats::{IssueStats, ValueCount};
pub use models::status_log::StatusLogEntry;
pub use models::user::User;
pub use models::vote::Vote;
