//! File domain entities.

pub mod model;
pub mod version;

pub use model::{ContentUpdate, File, FilePatch, NewFile};
pub use version::{FileVersion, NewFileVersion};
