//! Catalog domain: page fetching, `__NEXT_DATA__` extraction, the persisted
//! model and the reconciliation rules that decide which rows to write.

pub mod extract;
pub mod fetch;
pub mod ids;
pub mod models;
pub mod reconcile;
