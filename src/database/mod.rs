pub mod deadline;
pub mod filters;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod query_builder;
pub mod repository;

pub use filters::{Filters, Metadata};
pub use manager::StoreError;
pub use memory::MemoryStore;
pub use repository::{ItemStore, Models, PermissionStore, TokenStore, UserStore};
