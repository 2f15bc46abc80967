use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::AppError;
use crate::models::sale::{PaymentStatus, Sale};
use crate::models::stock::StockItem;
use crate::models::user::Role;

/// Items with fewer units than this (but more than zero) count as low stock
/// in ledger searches.
pub const LOW_STOCK_BELOW: i32 = 10;

pub const MAX_PAYMENT_METHOD_LEN: usize = 50;
pub const MAX_NAME_LEN: usize = 100;

fn required_name(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Exclusive upper bounds matching the `NUMERIC(12,2)` price and
/// `NUMERIC(14,2)` amount columns.
pub const UNIT_PRICE_BELOW: i64 = 10_000_000_000;
pub const SALE_AMOUNT_BELOW: i64 = 1_000_000_000_000;

fn non_negative_price(price: Decimal) -> Result<Decimal, AppError> {
    if price < Decimal::ZERO {
        return Err(AppError::validation("Unit price cannot be negative"));
    }
    if price >= Decimal::from(UNIT_PRICE_BELOW) {
        return Err(AppError::validation(format!(
            "Unit price must be less than {UNIT_PRICE_BELOW}"
        )));
    }
    if price.normalize().scale() > 2 {
        return Err(AppError::validation("Unit price can have at most 2 decimal places"));
    }
    Ok(price)
}

/// `unit_price * quantity_sold`, computed once when the sale is recorded.
pub fn sale_amount(unit_price: Decimal, quantity_sold: i32) -> Result<Decimal, AppError> {
    unit_price
        .checked_mul(Decimal::from(quantity_sold))
        .filter(|amount| *amount < Decimal::from(SALE_AMOUNT_BELOW))
        .ok_or_else(|| {
            AppError::validation(format!("Sale amount must be less than {SALE_AMOUNT_BELOW}"))
        })
}

// ==================== Stock ====================

#[derive(Debug, Clone)]
pub struct NewStock {
    pub product_name: String,
    pub company_name: String,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

/// A stock addition that passed validation.
#[derive(Debug, Clone)]
pub struct StockDraft {
    pub(crate) product_name: String,
    pub(crate) company_name: String,
    pub(crate) quantity_delta: i32,
    pub(crate) unit_price: Option<Decimal>,
}

impl NewStock {
    /// A new stock line needs a positive quantity. Merges into an existing
    /// line are checked again by the backend against the current quantity.
    pub fn validate(self) -> Result<StockDraft, AppError> {
        let product_name = required_name(&self.product_name, "product_name")?;
        let company_name = required_name(&self.company_name, "company_name")?;
        let unit_price = self.unit_price.map(non_negative_price).transpose()?;
        Ok(StockDraft {
            product_name,
            company_name,
            quantity_delta: self.quantity,
            unit_price,
        })
    }
}

impl StockDraft {
    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    /// Quantity for a freshly opened line.
    pub(crate) fn opening_quantity(&self) -> Result<i32, AppError> {
        if self.quantity_delta <= 0 {
            return Err(AppError::validation(
                "Quantity must be a positive integer when adding a new product",
            ));
        }
        Ok(self.quantity_delta)
    }

    /// Quantity after merging into a line currently holding `current` units.
    pub(crate) fn merged_quantity(&self, current: i32) -> Result<i32, AppError> {
        let merged = current
            .checked_add(self.quantity_delta)
            .ok_or_else(|| AppError::validation("Stock quantity is out of range"))?;
        if merged < 0 {
            return Err(AppError::validation(format!(
                "Stock quantity cannot go negative (current {current}, change {})",
                self.quantity_delta
            )));
        }
        Ok(merged)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StockPatch {
    pub product_name: Option<String>,
    pub company_name: Option<String>,
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
}

impl StockPatch {
    pub fn validate(self) -> Result<StockPatch, AppError> {
        let product_name = self
            .product_name
            .map(|name| required_name(&name, "product_name"))
            .transpose()?;
        let company_name = self
            .company_name
            .map(|name| required_name(&name, "company_name"))
            .transpose()?;
        if let Some(quantity) = self.quantity {
            if quantity < 0 {
                return Err(AppError::validation("Quantity cannot be negative"));
            }
        }
        let unit_price = self.unit_price.map(non_negative_price).transpose()?;
        Ok(StockPatch {
            product_name,
            company_name,
            quantity: self.quantity,
            unit_price,
        })
    }

    pub fn apply(&self, item: &mut StockItem) {
        if let Some(name) = &self.product_name {
            item.product_name = name.clone();
        }
        if let Some(name) = &self.company_name {
            item.company_name = name.clone();
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(price) = self.unit_price {
            item.unit_price = price;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockFilter {
    #[default]
    All,
    InStock,
    LowStock,
    OutOfStock,
}

impl StockFilter {
    pub fn matches(&self, quantity: i32) -> bool {
        match self {
            StockFilter::All => true,
            StockFilter::InStock => quantity > 0,
            StockFilter::LowStock => quantity > 0 && quantity < LOW_STOCK_BELOW,
            StockFilter::OutOfStock => quantity == 0,
        }
    }
}

impl FromStr for StockFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StockFilter::All),
            "in-stock" => Ok(StockFilter::InStock),
            "low-stock" => Ok(StockFilter::LowStock),
            "out-of-stock" => Ok(StockFilter::OutOfStock),
            _ => Err(AppError::validation(
                "Invalid filter. Use: all, in-stock, low-stock, or out-of-stock",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockSort {
    #[default]
    Name,
    Company,
    QuantityDesc,
    DateAddedDesc,
}

impl FromStr for StockSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(StockSort::Name),
            "company" => Ok(StockSort::Company),
            "quantity" => Ok(StockSort::QuantityDesc),
            "date" => Ok(StockSort::DateAddedDesc),
            _ => Err(AppError::validation(
                "Invalid sort. Use: name, company, quantity, or date",
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StockQuery {
    /// Case-insensitive substring over product and company names.
    pub text: Option<String>,
    pub filter: StockFilter,
    pub sort: StockSort,
}

impl StockQuery {
    /// The search text, trimmed, or `None` when blank.
    pub fn needle(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, item: &StockItem) -> bool {
        let text_ok = match self.needle() {
            Some(needle) => {
                item.product_name.to_lowercase().contains(&needle)
                    || item.company_name.to_lowercase().contains(&needle)
            }
            None => true,
        };
        text_ok && self.filter.matches(item.quantity)
    }

    /// Orders `items` like the SQL backend: names compare lowercased, ties
    /// by id.
    pub fn sort(&self, items: &mut [StockItem]) {
        match self.sort {
            StockSort::Name => items.sort_by_cached_key(|item| {
                (item.product_name.to_lowercase(), item.id)
            }),
            StockSort::Company => items.sort_by_cached_key(|item| {
                (item.company_name.to_lowercase(), item.id)
            }),
            StockSort::QuantityDesc => {
                items.sort_by(|a, b| b.quantity.cmp(&a.quantity).then(a.id.cmp(&b.id)))
            }
            StockSort::DateAddedDesc => {
                items.sort_by(|a, b| b.date_added.cmp(&a.date_added).then(a.id.cmp(&b.id)))
            }
        }
    }
}

// ==================== Sales ====================

#[derive(Debug, Clone)]
pub struct NewSale {
    pub product_name: String,
    pub company_name: String,
    pub customer_name: String,
    pub quantity_sold: i32,
    pub unit_price: Decimal,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<String>,
}

/// A sale that passed input validation, with its amount already computed.
/// Stock availability is checked by the backend inside its transaction.
#[derive(Debug, Clone)]
pub struct SaleDraft {
    pub(crate) product_name: String,
    pub(crate) company_name: String,
    pub(crate) customer_name: String,
    pub(crate) quantity_sold: i32,
    pub(crate) unit_price: Decimal,
    pub(crate) sale_amount: Decimal,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) payment_method: Option<String>,
}

impl NewSale {
    pub fn validate(self) -> Result<SaleDraft, AppError> {
        if self.quantity_sold <= 0 {
            return Err(AppError::validation("Quantity sold must be greater than 0"));
        }
        let product_name = required_name(&self.product_name, "product_name")?;
        let company_name = required_name(&self.company_name, "company_name")?;
        let customer_name = required_name(&self.customer_name, "customer_name")?;
        let unit_price = non_negative_price(self.unit_price)?;

        let payment_status = self.payment_status.unwrap_or_default();
        let payment_method = match (payment_status, self.payment_method) {
            (_, None) => None,
            (PaymentStatus::Paid, Some(method)) => Some(payment_method(&method)?),
            (PaymentStatus::Unpaid, Some(_)) => {
                return Err(AppError::validation(
                    "payment_method can only be set on a paid sale",
                ))
            }
        };

        Ok(SaleDraft {
            product_name,
            company_name,
            customer_name,
            quantity_sold: self.quantity_sold,
            unit_price,
            sale_amount: sale_amount(unit_price, self.quantity_sold)?,
            payment_status,
            payment_method,
        })
    }
}

impl SaleDraft {
    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn quantity_sold(&self) -> i32 {
        self.quantity_sold
    }

    pub fn sale_amount(&self) -> Decimal {
        self.sale_amount
    }

    /// Payment date stamped on a sale recorded as already paid.
    pub(crate) fn payment_date(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.payment_status {
            PaymentStatus::Paid => Some(now),
            PaymentStatus::Unpaid => None,
        }
    }
}

fn payment_method(value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("payment_method is required"));
    }
    if trimmed.chars().count() > MAX_PAYMENT_METHOD_LEN {
        return Err(AppError::validation(format!(
            "payment_method must be at most {MAX_PAYMENT_METHOD_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// New values for the payment fields of a sale.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub(crate) status: PaymentStatus,
    pub(crate) method: Option<String>,
    pub(crate) date: Option<DateTime<Utc>>,
}

impl PaymentUpdate {
    /// Paid via `method`, on `date` or now.
    pub fn paid(method: &str, date: Option<DateTime<Utc>>) -> Result<Self, AppError> {
        Ok(PaymentUpdate {
            status: PaymentStatus::Paid,
            method: Some(payment_method(method)?),
            date: Some(date.unwrap_or_else(Utc::now)),
        })
    }

    /// Back to unpaid, clearing method and date.
    pub fn unpaid() -> Self {
        PaymentUpdate {
            status: PaymentStatus::Unpaid,
            method: None,
            date: None,
        }
    }

    pub fn apply(&self, sale: &mut Sale) {
        sale.payment_status = self.status;
        sale.payment_method = self.method.clone();
        sale.payment_date = self.date;
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaleQuery {
    /// Inclusive lower bound on `sale_date`.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `sale_date`.
    pub until: Option<DateTime<Utc>>,
    pub customer_name: Option<String>,
    pub payment_status: Option<PaymentStatus>,
}

impl SaleQuery {
    pub fn between(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        SaleQuery {
            since: Some(since),
            until: Some(until),
            ..Default::default()
        }
    }

    pub fn matches(&self, sale: &Sale) -> bool {
        self.since.map_or(true, |since| sale.sale_date >= since)
            && self.until.map_or(true, |until| sale.sale_date <= until)
            && self
                .customer_name
                .as_deref()
                .map_or(true, |customer| sale.customer_name == customer)
            && self
                .payment_status
                .map_or(true, |status| sale.payment_status == status)
    }
}

// ==================== Users ====================

/// A user ready to be stored; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
    pub created_by: Option<i64>,
}
