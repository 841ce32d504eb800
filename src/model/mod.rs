pub mod job;
pub mod response;

pub use job::{Job, JobResult, Outcome};
pub use response::Response;
