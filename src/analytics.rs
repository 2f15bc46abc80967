//! Read-only rollups over stock and sale snapshots.
//!
//! Every function here is pure: callers load the rows (usually through the
//! ledger) and pass the current time in. Sales are joined to stock lines by
//! their copied product and company names, never by id.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::sale::Sale;
use crate::models::stock::StockItem;

/// At or below this many units a line is critical.
pub const CRITICAL_AT_OR_BELOW: i32 = 5;
/// At or below this many units a line is low.
pub const LOW_AT_OR_BELOW: i32 = 10;

const DEFAULT_DAYS: i64 = 30;
const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsParams {
    pub days: Option<i64>,
    pub limit: Option<i64>,
    pub threshold: Option<i32>,
}

impl AnalyticsParams {
    pub fn days(&self) -> Result<i64, AppError> {
        let days = self.days.unwrap_or(DEFAULT_DAYS);
        if days < 1 {
            return Err(AppError::validation("days must be at least 1"));
        }
        // Keeps `now - days` inside chrono's range.
        if days > 36_500 {
            return Err(AppError::validation("days must be at most 36500"));
        }
        Ok(days)
    }

    pub fn limit(&self) -> Result<usize, AppError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit < 1 {
            return Err(AppError::validation("limit must be at least 1"));
        }
        usize::try_from(limit).map_err(|_| AppError::validation("limit is out of range"))
    }

    pub fn threshold(&self) -> Result<i32, AppError> {
        let threshold = self.threshold.unwrap_or(LOW_AT_OR_BELOW);
        if threshold < 0 {
            return Err(AppError::validation("threshold cannot be negative"));
        }
        Ok(threshold)
    }
}

/// Start of the `days`-long window ending at `now`.
pub fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

/// `part / whole * 100`, two places; zero when `whole` is zero.
fn percentage(part: Decimal, whole: Decimal) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    (part / whole * Decimal::ONE_HUNDRED)
        .round_dp(2)
        .to_f64()
        .unwrap_or(0.0)
}

// ==================== Dashboard ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodStats {
    pub sales: usize,
    pub revenue: Decimal,
}

impl PeriodStats {
    fn add(&mut self, sale: &Sale) {
        self.sales += 1;
        self.revenue += sale.sale_amount;
    }
}

#[derive(Debug, Serialize)]
pub struct TotalStats {
    pub total_sales: usize,
    pub total_revenue: Decimal,
    pub total_products: usize,
    pub low_stock_items: usize,
    pub out_of_stock_items: usize,
}

#[derive(Debug, Serialize)]
pub struct PaymentStats {
    pub paid_amount: Decimal,
    pub unpaid_amount: Decimal,
    pub payment_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_stats: TotalStats,
    pub today_stats: PeriodStats,
    pub weekly_stats: PeriodStats,
    pub monthly_stats: PeriodStats,
    pub payment_stats: PaymentStats,
}

pub fn dashboard_stats(stock: &[StockItem], sales: &[Sale], now: DateTime<Utc>) -> DashboardStats {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);
    let week_start = window_start(now, 7);
    let month_start = window_start(now, 30);

    let mut total = PeriodStats::default();
    let mut today = PeriodStats::default();
    let mut weekly = PeriodStats::default();
    let mut monthly = PeriodStats::default();
    let mut paid_amount = Decimal::ZERO;

    for sale in sales {
        total.add(sale);
        if sale.sale_date >= midnight {
            today.add(sale);
        }
        if sale.sale_date >= week_start {
            weekly.add(sale);
        }
        if sale.sale_date >= month_start {
            monthly.add(sale);
        }
        if sale.is_paid() {
            paid_amount += sale.sale_amount;
        }
    }

    DashboardStats {
        total_stats: TotalStats {
            total_sales: total.sales,
            total_revenue: total.revenue,
            total_products: stock.len(),
            low_stock_items: stock.iter().filter(|i| i.quantity <= LOW_AT_OR_BELOW).count(),
            out_of_stock_items: stock.iter().filter(|i| i.quantity == 0).count(),
        },
        today_stats: today,
        weekly_stats: weekly,
        monthly_stats: monthly,
        payment_stats: PaymentStats {
            paid_amount,
            unpaid_amount: total.revenue - paid_amount,
            payment_rate: percentage(paid_amount, total.revenue),
        },
    }
}

// ==================== Products ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSales {
    pub product_name: String,
    pub company_name: String,
    pub total_quantity: i64,
    pub sale_count: usize,
    pub total_revenue: Decimal,
    pub avg_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct TopProducts {
    pub top_by_quantity: Vec<ProductSales>,
    pub top_by_revenue: Vec<ProductSales>,
    pub period_days: i64,
}

/// Products sold since `since`, grouped by (product, company).
pub fn top_products(sales: &[Sale], since: DateTime<Utc>, days: i64, limit: usize) -> TopProducts {
    let mut groups: HashMap<(&str, &str), ProductSales> = HashMap::new();
    for sale in sales.iter().filter(|s| s.sale_date >= since) {
        let entry = groups
            .entry((sale.product_name.as_str(), sale.company_name.as_str()))
            .or_insert_with(|| ProductSales {
                product_name: sale.product_name.clone(),
                company_name: sale.company_name.clone(),
                total_quantity: 0,
                sale_count: 0,
                total_revenue: Decimal::ZERO,
                avg_price: Decimal::ZERO,
            });
        entry.total_quantity += i64::from(sale.quantity_sold);
        entry.sale_count += 1;
        entry.total_revenue += sale.sale_amount;
    }

    let mut rows: Vec<ProductSales> = groups
        .into_values()
        .map(|mut row| {
            if row.total_quantity > 0 {
                row.avg_price = (row.total_revenue / Decimal::from(row.total_quantity)).round_dp(2);
            }
            row
        })
        .collect();

    // Name order first so equal ranks come out the same every time.
    rows.sort_by(|a, b| {
        (&a.product_name, &a.company_name).cmp(&(&b.product_name, &b.company_name))
    });

    let mut by_quantity = rows.clone();
    by_quantity.sort_by(|a, b| b.total_quantity.cmp(&a.total_quantity));
    by_quantity.truncate(limit);

    let mut by_revenue = rows;
    by_revenue.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));
    by_revenue.truncate(limit);

    TopProducts {
        top_by_quantity: by_quantity,
        top_by_revenue: by_revenue,
        period_days: days,
    }
}

// ==================== Customers ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSpend {
    pub customer_name: String,
    pub total_spent: Decimal,
    pub purchase_count: usize,
    pub total_items: i64,
    pub avg_purchase: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerPayments {
    pub customer_name: String,
    pub paid_amount: Decimal,
    pub unpaid_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct CustomerAnalysis {
    pub top_customers: Vec<CustomerSpend>,
    pub payment_behavior: Vec<CustomerPayments>,
    pub period_days: i64,
}

pub fn customer_analysis(
    sales: &[Sale],
    since: DateTime<Utc>,
    days: i64,
    limit: usize,
) -> CustomerAnalysis {
    struct Totals {
        spent: Decimal,
        paid: Decimal,
        count: usize,
        items: i64,
    }

    let mut groups: HashMap<&str, Totals> = HashMap::new();
    for sale in sales.iter().filter(|s| s.sale_date >= since) {
        let entry = groups.entry(sale.customer_name.as_str()).or_insert(Totals {
            spent: Decimal::ZERO,
            paid: Decimal::ZERO,
            count: 0,
            items: 0,
        });
        entry.spent += sale.sale_amount;
        entry.count += 1;
        entry.items += i64::from(sale.quantity_sold);
        if sale.is_paid() {
            entry.paid += sale.sale_amount;
        }
    }

    let mut names: Vec<&str> = groups.keys().copied().collect();
    names.sort_unstable();

    let mut top_customers: Vec<CustomerSpend> = names
        .iter()
        .map(|name| {
            let totals = &groups[name];
            CustomerSpend {
                customer_name: name.to_string(),
                total_spent: totals.spent,
                purchase_count: totals.count,
                total_items: totals.items,
                avg_purchase: (totals.spent / Decimal::from(totals.count)).round_dp(2),
            }
        })
        .collect();
    top_customers.sort_by(|a, b| b.total_spent.cmp(&a.total_spent));
    top_customers.truncate(limit);

    let mut payment_behavior: Vec<CustomerPayments> = names
        .iter()
        .map(|name| (name, &groups[name]))
        .filter(|(_, totals)| totals.spent > Decimal::ZERO)
        .map(|(name, totals)| CustomerPayments {
            customer_name: name.to_string(),
            paid_amount: totals.paid,
            unpaid_amount: totals.spent - totals.paid,
            total_amount: totals.spent,
            payment_rate: percentage(totals.paid, totals.spent),
        })
        .collect();
    payment_behavior.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
    payment_behavior.truncate(limit);

    CustomerAnalysis {
        top_customers,
        payment_behavior,
        period_days: days,
    }
}

// ==================== Stock movement ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockStatus {
    Critical,
    Low,
    Good,
}

impl StockStatus {
    pub fn for_quantity(quantity: i32) -> Self {
        if quantity <= CRITICAL_AT_OR_BELOW {
            StockStatus::Critical
        } else if quantity <= LOW_AT_OR_BELOW {
            StockStatus::Low
        } else {
            StockStatus::Good
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockMovement {
    pub id: i64,
    pub product_name: String,
    pub company_name: String,
    pub current_stock: i32,
    pub sold_quantity: i64,
    pub sale_transactions: usize,
    pub velocity_per_day: f64,
    /// `None` when nothing sold in the window.
    pub days_until_stockout: Option<i64>,
    pub stock_status: StockStatus,
}

#[derive(Debug, Serialize)]
pub struct StockMovementReport {
    pub stock_movement: Vec<StockMovement>,
    pub period_days: i64,
    pub analysis_date: String,
}

pub fn stock_movement(
    stock: &[StockItem],
    sales: &[Sale],
    now: DateTime<Utc>,
    days: i64,
) -> StockMovementReport {
    let since = window_start(now, days);
    let mut sold: HashMap<(&str, &str), (i64, usize)> = HashMap::new();
    for sale in sales.iter().filter(|s| s.sale_date >= since) {
        let entry = sold
            .entry((sale.product_name.as_str(), sale.company_name.as_str()))
            .or_insert((0, 0));
        entry.0 += i64::from(sale.quantity_sold);
        entry.1 += 1;
    }

    let mut rows: Vec<StockMovement> = stock
        .iter()
        .map(|item| {
            let (sold_quantity, sale_transactions) = sold
                .get(&(item.product_name.as_str(), item.company_name.as_str()))
                .copied()
                .unwrap_or((0, 0));
            let velocity = sold_quantity as f64 / days as f64;
            // floor(current / (sold / days)), kept in integers.
            let days_until_stockout = (sold_quantity > 0)
                .then(|| i64::from(item.quantity) * days / sold_quantity);
            StockMovement {
                id: item.id,
                product_name: item.product_name.clone(),
                company_name: item.company_name.clone(),
                current_stock: item.quantity,
                sold_quantity,
                sale_transactions,
                velocity_per_day: (velocity * 100.0).round() / 100.0,
                days_until_stockout,
                stock_status: StockStatus::for_quantity(item.quantity),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.sold_quantity.cmp(&a.sold_quantity).then(a.id.cmp(&b.id)));

    StockMovementReport {
        stock_movement: rows,
        period_days: days,
        analysis_date: now.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

// ==================== Alerts ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertStatus {
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    Critical,
    #[serde(rename = "Low Stock")]
    LowStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Danger,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAlert {
    pub id: i64,
    pub product_name: String,
    pub company_name: String,
    pub current_quantity: i32,
    pub status: AlertStatus,
    pub alert_level: AlertLevel,
}

#[derive(Debug, Serialize)]
pub struct LowStockAlerts {
    pub alerts: Vec<StockAlert>,
    pub total_alerts: usize,
    pub threshold: i32,
}

/// Lines at or below `threshold`, emptiest first.
pub fn low_stock_alerts(stock: &[StockItem], threshold: i32) -> LowStockAlerts {
    let mut low: Vec<&StockItem> = stock.iter().filter(|i| i.quantity <= threshold).collect();
    low.sort_by(|a, b| a.quantity.cmp(&b.quantity).then(a.id.cmp(&b.id)));

    let alerts: Vec<StockAlert> = low
        .into_iter()
        .map(|item| StockAlert {
            id: item.id,
            product_name: item.product_name.clone(),
            company_name: item.company_name.clone(),
            current_quantity: item.quantity,
            status: match item.quantity {
                0 => AlertStatus::OutOfStock,
                q if q <= CRITICAL_AT_OR_BELOW => AlertStatus::Critical,
                _ => AlertStatus::LowStock,
            },
            alert_level: if item.quantity <= CRITICAL_AT_OR_BELOW {
                AlertLevel::Danger
            } else {
                AlertLevel::Warning
            },
        })
        .collect();

    LowStockAlerts {
        total_alerts: alerts.len(),
        alerts,
        threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sale::PaymentStatus;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        "2024-06-15T12:00:00Z".parse().unwrap()
    }

    fn item(id: i64, product: &str, company: &str, quantity: i32) -> StockItem {
        StockItem {
            id,
            product_name: product.into(),
            company_name: company.into(),
            quantity,
            unit_price: dec!(10),
            date_added: now(),
        }
    }

    fn sale(
        product: &str,
        customer: &str,
        quantity_sold: i32,
        unit_price: Decimal,
        days_ago: i64,
        paid: bool,
    ) -> Sale {
        Sale {
            id: 0,
            product_name: product.into(),
            company_name: "AgriSeeds Ltd".into(),
            quantity_sold,
            customer_name: customer.into(),
            unit_price,
            sale_amount: unit_price * Decimal::from(quantity_sold),
            payment_status: if paid { PaymentStatus::Paid } else { PaymentStatus::Unpaid },
            payment_date: None,
            payment_method: None,
            sale_date: now() - Duration::days(days_ago) - Duration::minutes(1),
        }
    }

    #[test]
    fn params_reject_out_of_range_values() {
        let params = AnalyticsParams { days: Some(0), limit: Some(0), threshold: Some(-1) };
        assert!(params.days().is_err());
        assert!(params.limit().is_err());
        assert!(params.threshold().is_err());

        let defaults = AnalyticsParams::default();
        assert_eq!(defaults.days().unwrap(), 30);
        assert_eq!(defaults.limit().unwrap(), 10);
        assert_eq!(defaults.threshold().unwrap(), 10);
    }

    #[test]
    fn dashboard_buckets_by_age_and_payment() {
        let stock = vec![
            item(1, "Wheat Seeds", "AgriSeeds Ltd", 0),
            item(2, "Urea", "IFFCO", 8),
            item(3, "DAP", "IFFCO", 40),
        ];
        let sales = vec![
            sale("Wheat Seeds", "Ravi", 5, dec!(10), 0, true),
            sale("Wheat Seeds", "Ravi", 2, dec!(10), 3, false),
            sale("Urea", "Mani", 1, dec!(30), 20, false),
            sale("Urea", "Mani", 1, dec!(40), 90, true),
        ];

        let stats = dashboard_stats(&stock, &sales, now());
        assert_eq!(stats.total_stats.total_sales, 4);
        assert_eq!(stats.total_stats.total_revenue, dec!(140));
        assert_eq!(stats.total_stats.low_stock_items, 2);
        assert_eq!(stats.total_stats.out_of_stock_items, 1);
        assert_eq!(stats.today_stats, PeriodStats { sales: 1, revenue: dec!(50) });
        assert_eq!(stats.weekly_stats, PeriodStats { sales: 2, revenue: dec!(70) });
        assert_eq!(stats.monthly_stats, PeriodStats { sales: 3, revenue: dec!(100) });
        assert_eq!(stats.payment_stats.paid_amount, dec!(90));
        assert_eq!(stats.payment_stats.unpaid_amount, dec!(50));
        assert!((stats.payment_stats.payment_rate - 64.29).abs() < 1e-9);
    }

    #[test]
    fn empty_dashboard_has_zero_payment_rate() {
        let stats = dashboard_stats(&[], &[], now());
        assert_eq!(stats.payment_stats.payment_rate, 0.0);
        assert_eq!(stats.total_stats.total_revenue, Decimal::ZERO);
    }

    #[test]
    fn top_products_rank_by_quantity_and_revenue_separately() {
        let sales = vec![
            sale("Wheat Seeds", "Ravi", 10, dec!(2), 1, false),
            sale("Wheat Seeds", "Mani", 5, dec!(2), 2, false),
            sale("Tractor Oil", "Ravi", 1, dec!(500), 3, true),
            sale("Urea", "Ravi", 100, dec!(1), 60, true),
        ];
        let report = top_products(&sales, window_start(now(), 30), 30, 10);

        assert_eq!(report.top_by_quantity[0].product_name, "Wheat Seeds");
        assert_eq!(report.top_by_quantity[0].total_quantity, 15);
        assert_eq!(report.top_by_quantity[0].sale_count, 2);
        assert_eq!(report.top_by_quantity[0].avg_price, dec!(2));
        assert_eq!(report.top_by_revenue[0].product_name, "Tractor Oil");
        assert_eq!(report.top_by_quantity.len(), 2);

        let limited = top_products(&sales, window_start(now(), 30), 30, 1);
        assert_eq!(limited.top_by_quantity.len(), 1);
    }

    #[test]
    fn customer_analysis_tracks_spend_and_payment_rate() {
        let sales = vec![
            sale("Urea", "Ravi", 2, dec!(25), 1, true),
            sale("Urea", "Ravi", 1, dec!(50), 2, false),
            sale("Urea", "Mani", 1, dec!(0), 2, false),
        ];
        let report = customer_analysis(&sales, window_start(now(), 30), 30, 10);

        let ravi = &report.top_customers[0];
        assert_eq!(ravi.customer_name, "Ravi");
        assert_eq!(ravi.total_spent, dec!(100));
        assert_eq!(ravi.purchase_count, 2);
        assert_eq!(ravi.total_items, 3);
        assert_eq!(ravi.avg_purchase, dec!(50));
        assert_eq!(report.top_customers.len(), 2);

        // Mani spent nothing, so has no payment behaviour row.
        assert_eq!(report.payment_behavior.len(), 1);
        assert_eq!(report.payment_behavior[0].payment_rate, 50.0);
    }

    #[test]
    fn stock_movement_computes_velocity_and_stockout() {
        let stock = vec![
            item(1, "Wheat Seeds", "AgriSeeds Ltd", 100),
            item(2, "Urea", "AgriSeeds Ltd", 4),
        ];
        let sales = vec![
            sale("Wheat Seeds", "Ravi", 20, dec!(1), 1, false),
            sale("Wheat Seeds", "Ravi", 10, dec!(1), 5, false),
            sale("Wheat Seeds", "Ravi", 99, dec!(1), 45, false),
        ];
        let report = stock_movement(&stock, &sales, now(), 7);

        let wheat = &report.stock_movement[0];
        assert_eq!(wheat.sold_quantity, 30);
        assert_eq!(wheat.sale_transactions, 2);
        assert_eq!(wheat.velocity_per_day, 4.29);
        assert_eq!(wheat.days_until_stockout, Some(23));
        assert_eq!(wheat.stock_status, StockStatus::Good);

        let urea = &report.stock_movement[1];
        assert_eq!(urea.velocity_per_day, 0.0);
        assert_eq!(urea.days_until_stockout, None);
        assert_eq!(urea.stock_status, StockStatus::Critical);
        assert_eq!(report.analysis_date, "2024-06-15 12:00:00");
    }

    #[test]
    fn stock_status_thresholds() {
        assert_eq!(StockStatus::for_quantity(0), StockStatus::Critical);
        assert_eq!(StockStatus::for_quantity(5), StockStatus::Critical);
        assert_eq!(StockStatus::for_quantity(6), StockStatus::Low);
        assert_eq!(StockStatus::for_quantity(10), StockStatus::Low);
        assert_eq!(StockStatus::for_quantity(11), StockStatus::Good);
    }

    #[test]
    fn alerts_are_sorted_and_labelled() {
        let stock = vec![
            item(1, "A", "X", 9),
            item(2, "B", "X", 0),
            item(3, "C", "X", 5),
            item(4, "D", "X", 11),
        ];
        let alerts = low_stock_alerts(&stock, 10);
        assert_eq!(alerts.total_alerts, 3);
        let ids: Vec<i64> = alerts.alerts.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(alerts.alerts[0].status, AlertStatus::OutOfStock);
        assert_eq!(alerts.alerts[1].status, AlertStatus::Critical);
        assert_eq!(alerts.alerts[2].status, AlertStatus::LowStock);
        assert_eq!(alerts.alerts[1].alert_level, AlertLevel::Danger);
        assert_eq!(alerts.alerts[2].alert_level, AlertLevel::Warning);

        let json = serde_json::to_value(&alerts.alerts[0]).unwrap();
        assert_eq!(json["status"], "Out of Stock");
        assert_eq!(json["alert_level"], "danger");
    }
}
