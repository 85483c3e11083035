pub mod parse;
pub mod store;
pub mod types;
