use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::stock::StockItem;
use crate::store::{NewStock, StockPatch, StockQuery};

#[derive(Debug, Deserialize)]
pub struct CreateStockRequest {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub company_name: String,
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
}

impl TryFrom<CreateStockRequest> for NewStock {
    type Error = AppError;

    fn try_from(req: CreateStockRequest) -> Result<Self, Self::Error> {
        let quantity = req
            .quantity
            .ok_or_else(|| AppError::validation("quantity is required"))?;
        Ok(NewStock {
            product_name: req.product_name,
            company_name: req.company_name,
            quantity,
            unit_price: req.unit_price,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateStockRequest {
    pub product_name: Option<String>,
    pub company_name: Option<String>,
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
}

impl From<UpdateStockRequest> for StockPatch {
    fn from(req: UpdateStockRequest) -> Self {
        StockPatch {
            product_name: req.product_name,
            company_name: req.company_name,
            quantity: req.quantity,
            unit_price: req.unit_price,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StockSearchParams {
    pub q: Option<String>,
    pub filter: Option<String>,
    pub sort: Option<String>,
}

impl TryFrom<StockSearchParams> for StockQuery {
    type Error = AppError;

    fn try_from(params: StockSearchParams) -> Result<Self, Self::Error> {
        Ok(StockQuery {
            text: params.q,
            filter: params.filter.as_deref().unwrap_or("all").parse()?,
            sort: params.sort.as_deref().unwrap_or("name").parse()?,
        })
    }
}

#[derive(Serialize)]
pub struct StockMutationResponse {
    pub message: &'static str,
    pub stock: StockItem,
}
