pub mod sale;
pub mod stock;
pub mod user;

use serde::Serialize;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
