// src/state.rs
use std::sync::Arc;

use crate::config::AppConfig;
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;
use crate::store::{Accounts, Ledger};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn Ledger>,
    pub accounts: Arc<dyn Accounts>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(ledger: Arc<dyn Ledger>, accounts: Arc<dyn Accounts>, config: AppConfig) -> Self {
        Self {
            ledger,
            accounts,
            config: Arc::new(config),
        }
    }

    pub fn postgres(store: PgStore, config: AppConfig) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store, config)
    }

    pub fn in_memory(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store, config)
    }
}
