//! Collaborators that consume generated files
//!
//! - [`ProjectLayout`]: write files under a project root
//! - [`to_zip`]/[`read_zip`]: archive export
//! - [`serve`]: static preview over HTTP

mod archive;
mod layout;
mod preview;

pub use archive::{ArchiveError, read_zip, to_zip, write_zip};
pub use layout::{LayoutError, ProjectLayout};
pub use preview::{PreviewServer, router, serve};
