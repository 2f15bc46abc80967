//! Runs the ledger against a real database. Needs `DATABASE_URL`:
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/stockroom_test cargo test --test postgres -- --ignored
//! ```

use std::sync::Arc;

use rand::Rng;
use rust_decimal_macros::dec;
use stockroom::database;
use stockroom::error::AppError;
use stockroom::store::postgres::PgStore;
use stockroom::store::{Ledger, NewSale, NewStock, StockPatch};

async fn store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = database::create_pool(&url, 5).await.expect("database reachable");
    database::run_migrations(&pool).await.expect("migrations apply");
    PgStore::new(pool)
}

/// Product names unique to one test run.
fn product(name: &str) -> String {
    format!("{name} #{}", rand::thread_rng().gen::<u32>())
}

fn stock(product: &str, quantity: i32) -> NewStock {
    NewStock {
        product_name: product.to_string(),
        company_name: "AgriSeeds Ltd".into(),
        quantity,
        unit_price: Some(dec!(10)),
    }
}

fn sale(product: &str, quantity_sold: i32) -> NewSale {
    NewSale {
        product_name: product.to_string(),
        company_name: "AgriSeeds Ltd".into(),
        customer_name: "Ravi".into(),
        quantity_sold,
        unit_price: dec!(10),
        payment_status: None,
        payment_method: None,
    }
}

#[tokio::test]
#[ignore]
async fn upsert_merges_and_sale_commits_both_writes() {
    let store = store().await;
    let name = product("Wheat Seeds");

    store.upsert_stock(stock(&name, 250).validate().unwrap()).await.unwrap();
    let merged = store.upsert_stock(stock(&name, 250).validate().unwrap()).await.unwrap();
    assert!(!merged.created);
    assert_eq!(merged.item.quantity, 500);

    let recorded = store.record_sale(sale(&name, 50).validate().unwrap()).await.unwrap();
    assert_eq!(recorded.sale_amount, dec!(500));
    assert_eq!(store.get_stock(merged.item.id).await.unwrap().quantity, 450);

    let err = store.record_sale(sale(&name, 451).validate().unwrap()).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 450, .. }));
    assert_eq!(store.get_stock(merged.item.id).await.unwrap().quantity, 450);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn concurrent_sales_of_the_last_unit() {
    let store = Arc::new(store().await);
    let name = product("Urea");
    let item = store.upsert_stock(stock(&name, 1).validate().unwrap()).await.unwrap().item;

    let attempts: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            let draft = sale(&name, 1).validate().unwrap();
            tokio::spawn(async move { store.record_sale(draft).await })
        })
        .collect();

    let mut sold = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => sold += 1,
            Err(err) => assert!(matches!(err, AppError::InsufficientStock { .. })),
        }
    }
    assert_eq!(sold, 1);
    assert_eq!(store.get_stock(item.id).await.unwrap().quantity, 0);
}

#[tokio::test]
#[ignore]
async fn renamed_duplicates_are_reported() {
    let store = store().await;
    let name = product("DAP");
    store.upsert_stock(stock(&name, 5).validate().unwrap()).await.unwrap();
    let other = store
        .upsert_stock(stock(&format!("{name} bag"), 5).validate().unwrap())
        .await
        .unwrap()
        .item;

    let rename = StockPatch {
        product_name: Some(name.clone()),
        ..Default::default()
    };
    store.adjust_stock(other.id, rename.validate().unwrap()).await.unwrap();

    let err = store.record_sale(sale(&name, 1).validate().unwrap()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
