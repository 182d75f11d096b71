pub mod memory;
pub mod pg_catalog;
pub mod store;

pub use crate::util::db::Db;
pub use memory::MemoryCatalogStore;
pub use pg_catalog::PgCatalogStore;
pub use store::CatalogStore;
