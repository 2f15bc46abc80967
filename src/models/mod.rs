pub mod sale;
pub mod stock;
pub mod user;
