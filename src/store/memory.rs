use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{
    ambiguous_key, Accounts, Ledger, NewUser, PaymentUpdate, SaleDraft, SaleQuery, StockDraft, StockPatch,
    StockQuery, StockUpsert,
};
use crate::error::AppError;
use crate::models::sale::Sale;
use crate::models::stock::StockItem;
use crate::models::user::{Role, Session, User};

#[derive(Debug, Default)]
struct LedgerState {
    stock: Vec<StockItem>,
    sales: Vec<Sale>,
    last_stock_id: i64,
    last_sale_id: i64,
}

#[derive(Debug, Default)]
struct AccountState {
    users: Vec<User>,
    sessions: HashMap<String, Session>,
    last_user_id: i64,
}

/// In-memory ledger and account store.
///
/// Intended for tests and local demos. Each operation holds the relevant lock
/// for its whole duration. A sale whose insert fails after the decrement puts
/// the stock back before the lock is released.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: RwLock<LedgerState>,
    accounts: RwLock<AccountState>,
    #[cfg(test)]
    fail_sale_insert: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_ledger(&self) -> Result<RwLockReadGuard<'_, LedgerState>, AppError> {
        self.ledger
            .read()
            .map_err(|_| AppError::internal("ledger lock poisoned"))
    }

    fn write_ledger(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, AppError> {
        self.ledger
            .write()
            .map_err(|_| AppError::internal("ledger lock poisoned"))
    }

    fn read_accounts(&self) -> Result<RwLockReadGuard<'_, AccountState>, AppError> {
        self.accounts
            .read()
            .map_err(|_| AppError::internal("account lock poisoned"))
    }

    fn write_accounts(&self) -> Result<RwLockWriteGuard<'_, AccountState>, AppError> {
        self.accounts
            .write()
            .map_err(|_| AppError::internal("account lock poisoned"))
    }

    #[cfg(test)]
    fn check_sale_insert(&self) -> Result<(), AppError> {
        if self
            .fail_sale_insert
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(AppError::Persistence("sale insert failed".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_sale_insert(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Position of the single row holding this (product, company) key.
///
/// More than one match is reported as a conflict rather than resolved.
fn locate_key(
    stock: &[StockItem],
    product_name: &str,
    company_name: &str,
) -> Result<Option<usize>, AppError> {
    let mut hits = stock
        .iter()
        .enumerate()
        .filter(|(_, item)| item.matches_key(product_name, company_name))
        .map(|(idx, _)| idx);
    let first = hits.next();
    let extra = hits.count();
    if extra > 0 {
        warn!(product_name, company_name, rows = extra + 1, "ambiguous stock key");
        return Err(ambiguous_key(product_name, company_name, extra + 1));
    }
    Ok(first)
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn list_stock(&self, query: &StockQuery) -> Result<Vec<StockItem>, AppError> {
        let state = self.read_ledger()?;
        let mut items: Vec<StockItem> = state
            .stock
            .iter()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        query.sort(&mut items);
        Ok(items)
    }

    async fn get_stock(&self, id: i64) -> Result<StockItem, AppError> {
        let state = self.read_ledger()?;
        state
            .stock
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Stock item not found"))
    }

    async fn upsert_stock(&self, draft: StockDraft) -> Result<StockUpsert, AppError> {
        let mut state = self.write_ledger()?;
        let now = Utc::now();

        match locate_key(&state.stock, &draft.product_name, &draft.company_name)? {
            Some(idx) => {
                let quantity = draft.merged_quantity(state.stock[idx].quantity)?;
                let item = &mut state.stock[idx];
                item.quantity = quantity;
                item.date_added = now;
                if let Some(price) = draft.unit_price {
                    item.unit_price = price;
                }
                Ok(StockUpsert {
                    item: item.clone(),
                    created: false,
                })
            }
            None => {
                let quantity = draft.opening_quantity()?;
                let item = StockItem {
                    id: state.last_stock_id + 1,
                    product_name: draft.product_name,
                    company_name: draft.company_name,
                    quantity,
                    unit_price: draft.unit_price.unwrap_or_default(),
                    date_added: now,
                };
                state.last_stock_id = item.id;
                state.stock.push(item.clone());
                Ok(StockUpsert {
                    item,
                    created: true,
                })
            }
        }
    }

    async fn adjust_stock(&self, id: i64, patch: StockPatch) -> Result<StockItem, AppError> {
        let mut state = self.write_ledger()?;
        let item = state
            .stock
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| AppError::not_found("Stock item not found"))?;
        patch.apply(item);
        Ok(item.clone())
    }

    async fn delete_stock(&self, id: i64) -> Result<(), AppError> {
        let mut state = self.write_ledger()?;
        let before = state.stock.len();
        state.stock.retain(|item| item.id != id);
        if state.stock.len() == before {
            return Err(AppError::not_found("Stock item not found"));
        }
        Ok(())
    }

    async fn record_sale(&self, draft: SaleDraft) -> Result<Sale, AppError> {
        let mut state = self.write_ledger()?;

        let idx = locate_key(&state.stock, &draft.product_name, &draft.company_name)?
            .ok_or_else(|| AppError::not_found("Product not found in stock"))?;
        let available = state.stock[idx].quantity;
        if draft.quantity_sold > available {
            warn!(
                product_name = %draft.product_name,
                requested = draft.quantity_sold,
                available,
                "insufficient stock"
            );
            return Err(AppError::InsufficientStock {
                requested: draft.quantity_sold,
                available,
            });
        }

        let now = Utc::now();
        let sale = Sale {
            id: state.last_sale_id + 1,
            payment_date: draft.payment_date(now),
            product_name: draft.product_name,
            company_name: draft.company_name,
            quantity_sold: draft.quantity_sold,
            customer_name: draft.customer_name,
            unit_price: draft.unit_price,
            sale_amount: draft.sale_amount,
            payment_status: draft.payment_status,
            payment_method: draft.payment_method,
            sale_date: now,
        };

        state.stock[idx].quantity = available - sale.quantity_sold;
        if let Err(err) = self.check_sale_insert() {
            state.stock[idx].quantity = available;
            warn!(error = %err, "sale insert failed, stock restored");
            return Err(err);
        }
        state.last_sale_id = sale.id;
        state.sales.push(sale.clone());

        info!(sale_id = sale.id, amount = %sale.sale_amount, "sale recorded");
        Ok(sale)
    }

    async fn list_sales(&self, query: &SaleQuery) -> Result<Vec<Sale>, AppError> {
        let state = self.read_ledger()?;
        let mut sales: Vec<Sale> = state
            .sales
            .iter()
            .filter(|sale| query.matches(sale))
            .cloned()
            .collect();
        sales.sort_by(|a, b| b.sale_date.cmp(&a.sale_date).then(b.id.cmp(&a.id)));
        Ok(sales)
    }

    async fn get_sale(&self, id: i64) -> Result<Sale, AppError> {
        let state = self.read_ledger()?;
        state
            .sales
            .iter()
            .find(|sale| sale.id == id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Sale not found"))
    }

    async fn delete_sale(&self, id: i64) -> Result<(), AppError> {
        let mut state = self.write_ledger()?;
        let before = state.sales.len();
        state.sales.retain(|sale| sale.id != id);
        if state.sales.len() == before {
            return Err(AppError::not_found("Sale not found"));
        }
        Ok(())
    }

    async fn update_payment(&self, id: i64, update: PaymentUpdate) -> Result<Sale, AppError> {
        let mut state = self.write_ledger()?;
        let sale = state
            .sales
            .iter_mut()
            .find(|sale| sale.id == id)
            .ok_or_else(|| AppError::not_found("Sale not found"))?;
        update.apply(sale);
        Ok(sale.clone())
    }
}

#[async_trait]
impl Accounts for MemoryStore {
    async fn admin_exists(&self) -> Result<bool, AppError> {
        let state = self.read_accounts()?;
        Ok(state.users.iter().any(|u| u.role == Role::Admin))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.write_accounts()?;

        if user.role == Role::Admin && state.users.iter().any(|u| u.role == Role::Admin) {
            return Err(AppError::conflict(
                "Admin already exists. Only one admin registration allowed.",
            ));
        }
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::conflict("Username already exists"));
        }
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::conflict("Email already exists"));
        }

        let created = User {
            id: state.last_user_id + 1,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
            created_by: user.created_by,
            created_at: Utc::now(),
            last_login: None,
        };
        state.last_user_id = created.id;
        state.users.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let state = self.read_accounts()?;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let state = self.read_accounts()?;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let state = self.read_accounts()?;
        Ok(state.users.clone())
    }

    async fn touch_last_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.write_accounts()?;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn insert_session(&self, session: Session) -> Result<(), AppError> {
        let mut state = self.write_accounts()?;
        if state.sessions.contains_key(&session.token) {
            return Err(AppError::conflict("Session token already issued"));
        }
        state.sessions.insert(session.token.clone(), session);
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<Session>, AppError> {
        let state = self.read_accounts()?;
        Ok(state.sessions.get(token).cloned())
    }

    async fn deactivate_session(&self, token: &str) -> Result<bool, AppError> {
        let mut state = self.write_accounts()?;
        match state.sessions.get_mut(token) {
            Some(session) => {
                session.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
