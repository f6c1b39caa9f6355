//! User-defined instrument groups.

mod manager;
mod model;

pub use manager::WatchlistManager;
pub use model::Group;
