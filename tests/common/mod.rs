#![allow(dead_code)]

use std::str::FromStr;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use stockroom::config::AppConfig;
use stockroom::state::AppState;
use tower::ServiceExt;

/// The full router over a fresh in-memory store.
pub struct TestApp {
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig::from_lookup(|key| match key {
            "STORAGE" => Some("memory".to_string()),
            "BCRYPT_COST" => Some("4".to_string()),
            _ => None,
        })
        .expect("test config is valid");
        TestApp {
            router: stockroom::build_app(AppState::in_memory(config)),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {tok}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serializable body"))
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).expect("valid request"))
            .await
            .expect("router never fails")
    }

    /// Sends a request and decodes the JSON answer.
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        let bytes = body_bytes(response).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON response body")
        };
        (status, value)
    }

    pub async fn register_admin(&self) {
        let (status, _) = self
            .json(
                Method::POST,
                "/api/auth/register/admin",
                Some(json!({
                    "username": "owner",
                    "email": "owner@shop.in",
                    "password": "secret1",
                    "full_name": "Shop Owner",
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/auth/login",
                Some(json!({ "username": username, "password": password })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["session_token"].as_str().expect("token").to_string()
    }

    /// Registers the admin and returns a session token for it.
    pub async fn admin_token(&self) -> String {
        self.register_admin().await;
        self.login("owner", "secret1").await
    }

    /// Registers a salesperson through `admin` and logs them in.
    pub async fn salesperson_token(&self, admin: &str) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/auth/register/salesperson",
                Some(json!({
                    "username": "ravi",
                    "email": "ravi@shop.in",
                    "password": "counter9",
                    "full_name": "Ravi Kumar",
                })),
                Some(admin),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        self.login("ravi", "counter9").await
    }

    pub async fn add_stock(&self, token: &str, product: &str, company: &str, quantity: i32, price: &str) -> Value {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/stock",
                Some(json!({
                    "product_name": product,
                    "company_name": company,
                    "quantity": quantity,
                    "unit_price": price,
                })),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["stock"].clone()
    }

    pub async fn sell(
        &self,
        token: &str,
        product: &str,
        company: &str,
        quantity_sold: i32,
        price: &str,
    ) -> (StatusCode, Value) {
        self.json(
            Method::POST,
            "/api/sales",
            Some(json!({
                "product_name": product,
                "company_name": company,
                "customer_name": "Lakshmi Traders",
                "quantity_sold": quantity_sold,
                "unit_price": price,
            })),
            Some(token),
        )
        .await
    }

    pub async fn stock_quantity(&self, token: &str, id: i64) -> i64 {
        let (status, body) = self
            .json(Method::GET, &format!("/api/stock/{id}"), None, Some(token))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["quantity"].as_i64().expect("quantity")
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes()
        .to_vec()
}

/// Money fields travel as decimal strings.
pub fn money(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("money is a string")).expect("decimal")
}
