//! Local archive tree: folder routing, filename derivation, and copying.

pub mod error;
pub mod naming;
pub mod resolver;
pub mod writer;

pub use error::ArchiveError;
pub use resolver::PathResolver;
pub use writer::{ArchiveWriter, CopyOutcome};
