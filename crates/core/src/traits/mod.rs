pub mod executor;
pub mod parser_adapter;
pub mod repository;

pub use executor::*;
pub use parser_adapter::*;
pub use repository::*;
