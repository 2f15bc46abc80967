use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Unpaid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown payment status '{0}', expected 'paid' or 'unpaid'")]
pub struct ParsePaymentStatusError(pub String);

impl FromStr for PaymentStatus {
    type Err = ParsePaymentStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(PaymentStatus::Paid),
            "unpaid" => Ok(PaymentStatus::Unpaid),
            other => Err(ParsePaymentStatusError(other.to_string())),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = ParsePaymentStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A completed sale.
///
/// `product_name` and `company_name` are copied from the stock line at sale
/// time and are not a reference to it: renaming or deleting the stock line
/// leaves past sales untouched. `sale_amount` is frozen at creation. Only the
/// three payment fields change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Sale {
    pub id: i64,
    pub product_name: String,
    pub company_name: String,
    pub quantity_sold: i32,
    pub customer_name: String,
    pub unit_price: Decimal,
    pub sale_amount: Decimal,
    #[sqlx(try_from = "String")]
    pub payment_status: PaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub sale_date: DateTime<Utc>,
}

impl Sale {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}
