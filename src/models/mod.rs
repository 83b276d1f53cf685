//! Domain models.

pub mod file_details;
pub mod repository;
pub mod token;
