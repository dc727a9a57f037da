//! Domain types for CoderBuddy
//!
//! Entities flowing through one generation run: ProjectRequest,
//! ProjectPlan, Breakdown (of FileTask), GeneratedFile and FileOutcome.
//! Everything moves strictly forward; nothing here is mutated after a stage
//! hands it on.

mod breakdown;
mod generated;
mod project;

pub use breakdown::{Breakdown, FileTask, FileTaskError, validate_relative_path};
pub use generated::{FileOutcome, FileStatus, GeneratedFile};
pub use project::{ProjectPlan, ProjectRequest};
