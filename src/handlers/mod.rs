pub mod analytics;
pub mod report;
pub mod sale;
pub mod stock;
pub mod user;
