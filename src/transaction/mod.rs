pub mod model;

pub use model::TransactionRecord;
