pub mod coordinator;
pub mod history;
pub mod types;
