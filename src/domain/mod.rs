//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
pub mod render;

pub use arena::{ResponseTree, TreeNode};
pub use builder::TreeBuilder;
pub use entities::*;
pub use error::{DomainError, DomainResult, StructuralViolation};
pub use render::{DebugLines, TreeNodeConvert, DEFAULT_INDENT_WIDTH};
