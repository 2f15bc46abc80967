mod common;

use axum::http::{header, Method, StatusCode};
use common::{body_bytes, money, TestApp};
use rust_decimal_macros::dec;

#[tokio::test]
async fn weekly_report_downloads_as_text() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    app.add_stock(&admin, "Wheat Seeds", "AgriSeeds Ltd", 100, "10").await;
    app.sell(&admin, "Wheat Seeds", "AgriSeeds Ltd", 5, "10").await;

    let response = app
        .request(Method::GET, "/api/reports/weekly/customer", None, Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"weekly_report_by_customer_"));
    assert!(disposition.ends_with(".txt\""));

    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.starts_with("SRI LAKSHMI ENTERPRISES"));
    assert!(text.contains("Customer: Lakshmi Traders"));
    assert!(text.contains("Grand Total: Rs.50.00"));
}

#[tokio::test]
async fn weekly_report_by_date_as_json() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    app.add_stock(&admin, "Wheat Seeds", "AgriSeeds Ltd", 100, "10").await;
    app.sell(&admin, "Wheat Seeds", "AgriSeeds Ltd", 5, "10").await;
    app.sell(&admin, "Wheat Seeds", "AgriSeeds Ltd", 1, "12").await;

    let (status, body) = app
        .json(Method::GET, "/api/reports/weekly/date?format=json", None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["grouping"], "date");
    assert_eq!(body["sections"].as_array().unwrap().len(), 1);
    assert_eq!(money(&body["grand_total"]), dec!(62));

    let (status, _) = app
        .json(Method::GET, "/api/reports/weekly/date?format=pdf", None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn receipt_for_one_sale() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    app.add_stock(&admin, "DAP", "IFFCO", 10, "1350").await;
    let (_, sale) = app.sell(&admin, "DAP", "IFFCO", 2, "1350").await;
    let id = sale["sale_id"].as_i64().unwrap();

    let (status, body) = app
        .json(Method::GET, &format!("/api/receipt/{id}?format=json"), None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["receipt_number"], format!("RCP-{id:06}"));
    assert_eq!(money(&body["sale"]["sale_amount"]), dec!(2700));

    let response = app
        .request(Method::GET, &format!("/api/receipt/{id}"), None, Some(&admin))
        .await;
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("TOTAL: Rs.2700.00"));

    let (status, _) = app
        .json(Method::GET, "/api/receipt/999", None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analytics_are_admin_only_except_alerts() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let seller = app.salesperson_token(&admin).await;
    app.add_stock(&admin, "Urea", "IFFCO", 3, "266").await;
    app.add_stock(&admin, "DAP", "IFFCO", 40, "1350").await;

    for uri in [
        "/api/analytics/dashboard-stats",
        "/api/analytics/top-selling-products",
        "/api/analytics/customer-analysis",
        "/api/analytics/stock-movement",
    ] {
        let (status, _) = app.json(Method::GET, uri, None, Some(&seller)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        let (status, _) = app.json(Method::GET, uri, None, Some(&admin)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }

    let (status, body) = app
        .json(Method::GET, "/api/analytics/low-stock-alerts", None, Some(&seller))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_alerts"], 1);
    assert_eq!(body["alerts"][0]["status"], "Critical");
    assert_eq!(body["alerts"][0]["alert_level"], "danger");
}

#[tokio::test]
async fn dashboard_reflects_recorded_sales() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    app.add_stock(&admin, "DAP", "IFFCO", 40, "1350").await;
    let (_, sale) = app.sell(&admin, "DAP", "IFFCO", 2, "1350").await;
    app.sell(&admin, "DAP", "IFFCO", 1, "1350").await;
    app.json(
        axum::http::Method::POST,
        &format!("/api/sales/{}/mark-paid", sale["sale_id"]),
        Some(serde_json::json!({ "payment_method": "Cash" })),
        Some(&admin),
    )
    .await;

    let (_, stats) = app
        .json(Method::GET, "/api/analytics/dashboard-stats", None, Some(&admin))
        .await;
    assert_eq!(stats["total_stats"]["total_sales"], 3);
    assert_eq!(money(&stats["total_stats"]["total_revenue"]), dec!(4050));
    assert_eq!(stats["today_stats"]["sales"], 3);
    assert_eq!(money(&stats["payment_stats"]["paid_amount"]), dec!(2700));
    assert_eq!(money(&stats["payment_stats"]["unpaid_amount"]), dec!(1350));
}

#[tokio::test]
async fn analytics_parameters_are_validated() {
    let app = TestApp::new();
    let admin = app.admin_token().await;

    for uri in [
        "/api/analytics/top-selling-products?days=0",
        "/api/analytics/customer-analysis?limit=0",
        "/api/analytics/stock-movement?days=-3",
        "/api/analytics/low-stock-alerts?threshold=-1",
        "/api/analytics/stock-movement?days=soon",
    ] {
        let (status, _) = app.json(Method::GET, uri, None, Some(&admin)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn stock_movement_reports_velocity() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    app.add_stock(&admin, "DAP", "IFFCO", 40, "1350").await;
    app.add_stock(&admin, "Urea", "IFFCO", 12, "266").await;
    app.sell(&admin, "DAP", "IFFCO", 14, "1350").await;

    let (status, body) = app
        .json(Method::GET, "/api/analytics/stock-movement?days=7", None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    let dap = &body["stock_movement"][0];
    assert_eq!(dap["product_name"], "DAP");
    assert_eq!(dap["sold_quantity"], 14);
    assert_eq!(dap["velocity_per_day"], 2.0);
    assert_eq!(dap["days_until_stockout"], 13);
    assert_eq!(dap["stock_status"], "Good");
    assert!(body["stock_movement"][1]["days_until_stockout"].is_null());
}
