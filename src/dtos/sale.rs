use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::sale::{PaymentStatus, Sale};
use crate::store::{NewSale, SaleQuery};

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub customer_name: String,
    pub quantity_sold: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<String>,
}

impl TryFrom<CreateSaleRequest> for NewSale {
    type Error = AppError;

    fn try_from(req: CreateSaleRequest) -> Result<Self, Self::Error> {
        let quantity_sold = req
            .quantity_sold
            .ok_or_else(|| AppError::validation("quantity_sold is required"))?;
        let unit_price = req
            .unit_price
            .ok_or_else(|| AppError::validation("unit_price is required"))?;
        Ok(NewSale {
            product_name: req.product_name,
            company_name: req.company_name,
            customer_name: req.customer_name,
            quantity_sold,
            unit_price,
            payment_status: req.payment_status,
            payment_method: req.payment_method,
        })
    }
}

#[derive(Serialize)]
pub struct CreateSaleResponse {
    pub message: &'static str,
    pub sale_id: i64,
    pub sale_amount: Decimal,
    pub sale: Sale,
}

impl From<Sale> for CreateSaleResponse {
    fn from(sale: Sale) -> Self {
        CreateSaleResponse {
            message: "Sale recorded successfully",
            sale_id: sale.id,
            sale_amount: sale.sale_amount,
            sale,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkPaidRequest {
    #[serde(default)]
    pub payment_method: String,
    pub payment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleListParams {
    pub customer: Option<String>,
    pub payment_status: Option<PaymentStatus>,
}

impl From<SaleListParams> for SaleQuery {
    fn from(params: SaleListParams) -> Self {
        SaleQuery {
            customer_name: params
                .customer
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            payment_status: params.payment_status,
            ..Default::default()
        }
    }
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub message: &'static str,
    pub sale: Sale,
}
