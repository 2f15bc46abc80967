//! Storage seam for the stock ledger, the sale recorder and the account store.
//!
//! Handlers only ever see `Arc<dyn Ledger>` and `Arc<dyn Accounts>`. Two
//! backends implement both traits: [`postgres::PgStore`] for deployments and
//! [`memory::MemoryStore`] for tests and local demos.
//!
//! Inputs arrive as raw commands (`NewStock`, `NewSale`, ...) and must be
//! turned into drafts through `validate()` before a backend accepts them, so
//! every backend sees inputs that already passed the same checks.

pub mod inputs;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::sale::Sale;
use crate::models::stock::StockItem;
use crate::models::user::{Session, User};

pub use inputs::{
    NewSale, NewStock, NewUser, PaymentUpdate, SaleDraft, SaleQuery, StockDraft, StockFilter,
    StockPatch, StockQuery, StockSort,
};

/// Rows sharing one (product, company) key can only come from renames via
/// `adjust_stock`. Lookups refuse to choose between them.
pub(crate) fn ambiguous_key(product_name: &str, company_name: &str, rows: usize) -> AppError {
    AppError::conflict(format!(
        "{rows} stock items share product '{product_name}' from '{company_name}'; resolve the duplicate before continuing"
    ))
}

/// Result of merging stock into the ledger.
#[derive(Debug, Clone)]
pub struct StockUpsert {
    pub item: StockItem,
    /// `true` when a new (product, company) line was opened.
    pub created: bool,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn list_stock(&self, query: &StockQuery) -> Result<Vec<StockItem>, AppError>;

    async fn get_stock(&self, id: i64) -> Result<StockItem, AppError>;

    /// Adds to an existing (product, company) line or opens a new one.
    async fn upsert_stock(&self, draft: StockDraft) -> Result<StockUpsert, AppError>;

    /// Partial update. Does not re-check the (product, company) key against
    /// other rows.
    async fn adjust_stock(&self, id: i64, patch: StockPatch) -> Result<StockItem, AppError>;

    /// Removes a stock line. Sales recorded against it are kept.
    async fn delete_stock(&self, id: i64) -> Result<(), AppError>;

    /// Decrements stock and inserts the sale as one unit of work.
    ///
    /// The availability check and the decrement are serialized against other
    /// sales of the same stock line; either both writes land or neither does.
    async fn record_sale(&self, draft: SaleDraft) -> Result<Sale, AppError>;

    /// Sales matching `query`, newest first.
    async fn list_sales(&self, query: &SaleQuery) -> Result<Vec<Sale>, AppError>;

    async fn get_sale(&self, id: i64) -> Result<Sale, AppError>;

    /// Administrative removal. Stock is not replenished.
    async fn delete_sale(&self, id: i64) -> Result<(), AppError>;

    /// Overwrites the payment fields of a sale, leaving everything else alone.
    async fn update_payment(&self, id: i64, update: PaymentUpdate) -> Result<Sale, AppError>;

    async fn mark_paid(
        &self,
        id: i64,
        payment_method: &str,
        payment_date: Option<DateTime<Utc>>,
    ) -> Result<Sale, AppError> {
        let update = PaymentUpdate::paid(payment_method, payment_date)?;
        self.update_payment(id, update).await
    }

    async fn mark_unpaid(&self, id: i64) -> Result<Sale, AppError> {
        self.update_payment(id, PaymentUpdate::unpaid()).await
    }
}

#[async_trait]
pub trait Accounts: Send + Sync {
    async fn admin_exists(&self) -> Result<bool, AppError>;

    /// Inserts a user. Fails with `Conflict` on a taken username or email, or
    /// when a second admin is attempted.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    async fn touch_last_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    async fn insert_session(&self, session: Session) -> Result<(), AppError>;

    async fn find_session(&self, token: &str) -> Result<Option<Session>, AppError>;

    /// Returns `false` when no session carries this token.
    async fn deactivate_session(&self, token: &str) -> Result<bool, AppError>;
}
