pub mod analysis;
pub mod models;
