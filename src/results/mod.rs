pub mod store;

pub use store::ResultStore;
