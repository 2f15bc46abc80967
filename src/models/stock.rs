use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// One tracked (product, company) inventory line.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct StockItem {
    pub id: i64,
    pub product_name: String,
    pub company_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub date_added: DateTime<Utc>,
}

impl StockItem {
    /// True when this row answers to the given logical key.
    pub fn matches_key(&self, product_name: &str, company_name: &str) -> bool {
        self.product_name == product_name && self.company_name == company_name
    }
}
