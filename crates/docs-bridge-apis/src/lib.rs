//! Host APIs reachable from embedded documentation pages.
//!
//! Provides:
//! - `bloks` - Design spec lookup
//! - `uidocs` - UI API reference lookup
//! - `feedback` - Best-effort usage reporting
//! - `inpageeditor` - Diff submission from the in-page editor
//! - `content` - Internal/external content selection

pub mod bloks;
pub mod content;
pub mod feedback;
pub mod inpageeditor;
pub mod uidocs;

pub use content::{Audience, ContentError, ContentVariants};
pub use inpageeditor::{DiffSubmission, SubmitDiffError};
pub use uidocs::ApiQuery;
