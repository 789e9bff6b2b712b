pub mod answer_repository;
pub mod poll_repository;

pub use answer_repository::*;
pub use poll_repository::*;
