//! Node store implementations

mod memory;
mod toml_file;

pub use memory::InMemoryNodeStore;
pub use toml_file::TomlFileStore;
