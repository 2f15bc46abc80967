//! PostgreSQL-backed ledger and account store.
//!
//! Every write that touches more than one row runs inside an explicit
//! transaction opened with `pool.begin()`. Dropping the transaction without
//! `commit()` rolls it back, so any early `?` return leaves the database as it
//! was before the call.
//!
//! `record_sale` locks the matching stock row with `SELECT ... FOR UPDATE`
//! before checking availability. A concurrent sale on the same row blocks on
//! that lock and re-reads the decremented quantity once the first transaction
//! commits, which is what keeps two sales from both spending the last unit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{info, instrument, warn};

use super::{
    ambiguous_key,
    Accounts, Ledger, NewUser, PaymentUpdate, SaleDraft, SaleQuery, StockDraft, StockFilter,
    StockPatch, StockQuery, StockSort, StockUpsert,
};
use crate::error::AppError;
use crate::models::sale::Sale;
use crate::models::stock::StockItem;
use crate::models::user::{Session, User};

const STOCK_COLUMNS: &str = "id, product_name, company_name, quantity, unit_price, date_added";

const SALE_COLUMNS: &str = "id, product_name, company_name, quantity_sold, customer_name, \
     unit_price, sale_amount, payment_status, payment_date, payment_method, sale_date";

const USER_COLUMNS: &str = "id, username, email, full_name, password_hash, role, is_active, \
     created_by, created_at, last_login";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Serializes upserts of one (product, company) key for the rest of the
    /// transaction, including the case where no row exists yet.
    async fn lock_key(
        tx: &mut Transaction<'_, Postgres>,
        product_name: &str,
        company_name: &str,
    ) -> Result<(), AppError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || E'\\x1f' || $2))")
            .bind(product_name)
            .bind(company_name)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Locks and returns the single row for this key, if any.
    async fn lock_stock_by_key(
        tx: &mut Transaction<'_, Postgres>,
        product_name: &str,
        company_name: &str,
    ) -> Result<Option<StockItem>, AppError> {
        let rows = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stock
             WHERE product_name = $1 AND company_name = $2
             ORDER BY id
             FOR UPDATE"
        ))
        .bind(product_name)
        .bind(company_name)
        .fetch_all(&mut **tx)
        .await?;

        if rows.len() > 1 {
            warn!(product_name, company_name, rows = rows.len(), "ambiguous stock key");
            return Err(ambiguous_key(product_name, company_name, rows.len()));
        }
        Ok(rows.into_iter().next())
    }
}

/// Escapes LIKE metacharacters so user text is matched literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn map_user_conflict(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            return match db_err.constraint() {
                Some("users_username_key") => AppError::conflict("Username already exists"),
                Some("users_email_key") => AppError::conflict("Email already exists"),
                Some("users_single_admin_idx") => AppError::conflict(
                    "Admin already exists. Only one admin registration allowed.",
                ),
                _ => AppError::from(err),
            };
        }
    }
    AppError::from(err)
}

#[async_trait]
impl Ledger for PgStore {
    #[instrument(skip(self))]
    async fn list_stock(&self, query: &StockQuery) -> Result<Vec<StockItem>, AppError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {STOCK_COLUMNS} FROM stock WHERE 1=1"));

        if let Some(needle) = query.needle() {
            let pattern = like_pattern(&needle);
            qb.push(" AND (product_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR company_name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        match query.filter {
            StockFilter::All => {}
            StockFilter::InStock => {
                qb.push(" AND quantity > 0");
            }
            StockFilter::LowStock => {
                qb.push(" AND quantity > 0 AND quantity < ")
                    .push_bind(super::inputs::LOW_STOCK_BELOW);
            }
            StockFilter::OutOfStock => {
                qb.push(" AND quantity = 0");
            }
        }

        qb.push(match query.sort {
            StockSort::Name => " ORDER BY LOWER(product_name) ASC, id ASC",
            StockSort::Company => " ORDER BY LOWER(company_name) ASC, id ASC",
            StockSort::QuantityDesc => " ORDER BY quantity DESC, id ASC",
            StockSort::DateAddedDesc => " ORDER BY date_added DESC, id ASC",
        });

        let items = qb
            .build_query_as::<StockItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn get_stock(&self, id: i64) -> Result<StockItem, AppError> {
        sqlx::query_as::<_, StockItem>(&format!("SELECT {STOCK_COLUMNS} FROM stock WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Stock item not found"))
    }

    #[instrument(skip(self, draft), fields(product = %draft.product_name(), company = %draft.company_name()))]
    async fn upsert_stock(&self, draft: StockDraft) -> Result<StockUpsert, AppError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_key(&mut tx, &draft.product_name, &draft.company_name).await?;

        let upsert = match Self::lock_stock_by_key(&mut tx, &draft.product_name, &draft.company_name).await? {
            Some(existing) => {
                let quantity = draft.merged_quantity(existing.quantity)?;
                let item = sqlx::query_as::<_, StockItem>(&format!(
                    "UPDATE stock
                     SET quantity = $1, date_added = NOW(), unit_price = COALESCE($2, unit_price)
                     WHERE id = $3
                     RETURNING {STOCK_COLUMNS}"
                ))
                .bind(quantity)
                .bind(draft.unit_price)
                .bind(existing.id)
                .fetch_one(&mut *tx)
                .await?;
                StockUpsert {
                    item,
                    created: false,
                }
            }
            None => {
                let quantity = draft.opening_quantity()?;
                let item = sqlx::query_as::<_, StockItem>(&format!(
                    "INSERT INTO stock (product_name, company_name, quantity, unit_price)
                     VALUES ($1, $2, $3, $4)
                     RETURNING {STOCK_COLUMNS}"
                ))
                .bind(&draft.product_name)
                .bind(&draft.company_name)
                .bind(quantity)
                .bind(draft.unit_price.unwrap_or_default())
                .fetch_one(&mut *tx)
                .await?;
                StockUpsert {
                    item,
                    created: true,
                }
            }
        };

        tx.commit().await?;
        Ok(upsert)
    }

    #[instrument(skip(self, patch))]
    async fn adjust_stock(&self, id: i64, patch: StockPatch) -> Result<StockItem, AppError> {
        sqlx::query_as::<_, StockItem>(&format!(
            "UPDATE stock SET
             product_name = COALESCE($1, product_name),
             company_name = COALESCE($2, company_name),
             quantity = COALESCE($3, quantity),
             unit_price = COALESCE($4, unit_price)
             WHERE id = $5
             RETURNING {STOCK_COLUMNS}"
        ))
        .bind(patch.product_name)
        .bind(patch.company_name)
        .bind(patch.quantity)
        .bind(patch.unit_price)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Stock item not found"))
    }

    #[instrument(skip(self))]
    async fn delete_stock(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM stock WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Stock item not found"));
        }
        Ok(())
    }

    #[instrument(
        skip(self, draft),
        fields(product = %draft.product_name(), company = %draft.company_name(), quantity = draft.quantity_sold())
    )]
    async fn record_sale(&self, draft: SaleDraft) -> Result<Sale, AppError> {
        let mut tx = self.pool.begin().await?;

        let stock = Self::lock_stock_by_key(&mut tx, &draft.product_name, &draft.company_name)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found in stock"))?;

        if draft.quantity_sold > stock.quantity {
            warn!(
                requested = draft.quantity_sold,
                available = stock.quantity,
                "insufficient stock"
            );
            return Err(AppError::InsufficientStock {
                requested: draft.quantity_sold,
                available: stock.quantity,
            });
        }

        sqlx::query("UPDATE stock SET quantity = quantity - $1 WHERE id = $2")
            .bind(draft.quantity_sold)
            .bind(stock.id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "INSERT INTO sales (product_name, company_name, quantity_sold, customer_name,
                                unit_price, sale_amount, payment_status, payment_date,
                                payment_method, sale_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {SALE_COLUMNS}"
        ))
        .bind(&draft.product_name)
        .bind(&draft.company_name)
        .bind(draft.quantity_sold)
        .bind(&draft.customer_name)
        .bind(draft.unit_price)
        .bind(draft.sale_amount)
        .bind(draft.payment_status.as_str())
        .bind(draft.payment_date(now))
        .bind(&draft.payment_method)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(sale_id = sale.id, amount = %sale.sale_amount, "sale recorded");
        Ok(sale)
    }

    #[instrument(skip(self))]
    async fn list_sales(&self, query: &SaleQuery) -> Result<Vec<Sale>, AppError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {SALE_COLUMNS} FROM sales WHERE 1=1"));

        if let Some(since) = query.since {
            qb.push(" AND sale_date >= ").push_bind(since);
        }
        if let Some(until) = query.until {
            qb.push(" AND sale_date <= ").push_bind(until);
        }
        if let Some(customer) = &query.customer_name {
            qb.push(" AND customer_name = ").push_bind(customer.clone());
        }
        if let Some(status) = query.payment_status {
            qb.push(" AND payment_status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY sale_date DESC, id DESC");

        let sales = qb.build_query_as::<Sale>().fetch_all(&self.pool).await?;
        Ok(sales)
    }

    #[instrument(skip(self))]
    async fn get_sale(&self, id: i64) -> Result<Sale, AppError> {
        sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Sale not found"))
    }

    #[instrument(skip(self))]
    async fn delete_sale(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM sales WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Sale not found"));
        }
        Ok(())
    }

    #[instrument(skip(self, update), fields(status = %update.status))]
    async fn update_payment(&self, id: i64, update: PaymentUpdate) -> Result<Sale, AppError> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "UPDATE sales
             SET payment_status = $1, payment_method = $2, payment_date = $3
             WHERE id = $4
             RETURNING {SALE_COLUMNS}"
        ))
        .bind(update.status.as_str())
        .bind(update.method)
        .bind(update.date)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Sale not found"))?;

        info!(sale_id = sale.id, status = %sale.payment_status, "payment updated");
        Ok(sale)
    }
}

#[async_trait]
impl Accounts for PgStore {
    async fn admin_exists(&self) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE role = 'admin')")
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    #[instrument(skip(self, user), fields(username = %user.username, role = %user.role))]
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, full_name, password_hash, role, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_conflict)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(users)
    }

    async fn touch_last_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_session(&self, session: Session) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO user_sessions (token, user_id, created_at, expires_at, is_active)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT token, user_id, created_at, expires_at, is_active
             FROM user_sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn deactivate_session(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE user_sessions SET is_active = FALSE WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::models::sale::PaymentStatus;
    use crate::store::NewStock;
    use rand::Rng;
    use rust_decimal_macros::dec;

    async fn store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = database::create_pool(&url, 2).await.expect("database reachable");
        database::run_migrations(&pool).await.expect("migrations apply");
        PgStore::new(pool)
    }

    // Needs DATABASE_URL: cargo test --lib postgres -- --ignored
    #[tokio::test]
    #[ignore]
    async fn failed_sale_insert_rolls_back_the_decrement() {
        let store = store().await;
        let product = format!("Mustard Seeds #{}", rand::thread_rng().gen::<u32>());
        let draft = NewStock {
            product_name: product.clone(),
            company_name: "AgriSeeds Ltd".into(),
            quantity: 40,
            unit_price: Some(dec!(10)),
        }
        .validate()
        .unwrap();
        let id = store.upsert_stock(draft).await.unwrap().item.id;

        // sale_amount does not fit NUMERIC(14,2), so the INSERT fails after
        // the stock row has been decremented.
        let sale = SaleDraft {
            product_name: product.clone(),
            company_name: "AgriSeeds Ltd".into(),
            customer_name: "Ravi".into(),
            quantity_sold: 4,
            unit_price: dec!(10),
            sale_amount: dec!(10000000000000),
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
        };
        let err = store.record_sale(sale).await.unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)), "{err:?}");
        assert_eq!(store.get_stock(id).await.unwrap().quantity, 40);
        let sales = store.list_sales(&SaleQuery::default()).await.unwrap();
        assert!(sales.iter().all(|s| s.product_name != product));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("seeds"), "%seeds%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
