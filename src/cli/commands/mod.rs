//! CLI command handlers

pub mod find;
pub mod reindex;
pub mod show;
pub mod validate;

pub use find::handle_find;
pub use reindex::handle_reindex;
pub use show::handle_show;
pub use validate::handle_validate;
