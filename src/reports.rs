//! Weekly sales reports and single-sale receipts.
//!
//! A report is built as a plain document value first and only then rendered,
//! either as a fixed-width text table or as JSON. Building never touches the
//! ledger; handlers pass in the sales they loaded.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::sale::{PaymentStatus, Sale};

pub const REPORT_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormatParams {
    #[serde(default)]
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    Customer,
    Date,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportLine {
    pub sale_id: i64,
    pub sale_date: DateTime<Utc>,
    pub customer_name: String,
    pub product_name: String,
    pub company_name: String,
    pub quantity_sold: i32,
    pub unit_price: Decimal,
    pub sale_amount: Decimal,
    pub payment_status: PaymentStatus,
}

impl From<&Sale> for ReportLine {
    fn from(sale: &Sale) -> Self {
        ReportLine {
            sale_id: sale.id,
            sale_date: sale.sale_date,
            customer_name: sale.customer_name.clone(),
            product_name: sale.product_name.clone(),
            company_name: sale.company_name.clone(),
            quantity_sold: sale.quantity_sold,
            unit_price: sale.unit_price,
            sale_amount: sale.sale_amount,
            payment_status: sale.payment_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    /// Customer name, or the `YYYY-MM-DD` day.
    pub heading: String,
    pub lines: Vec<ReportLine>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub company_name: String,
    pub grouping: Grouping,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub sections: Vec<ReportSection>,
    pub grand_total: Decimal,
    pub generated_at: DateTime<Utc>,
}

/// Groups the sales inside `[since, until]` into sections.
pub fn weekly_report(
    sales: &[Sale],
    grouping: Grouping,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    company_name: &str,
) -> WeeklyReport {
    let mut in_period: Vec<&Sale> = sales
        .iter()
        .filter(|s| s.sale_date >= since && s.sale_date <= until)
        .collect();
    in_period.sort_by(|a, b| a.sale_date.cmp(&b.sale_date).then(a.id.cmp(&b.id)));

    let mut groups: BTreeMap<String, Vec<ReportLine>> = BTreeMap::new();
    for sale in in_period {
        let key = match grouping {
            Grouping::Customer => sale.customer_name.clone(),
            Grouping::Date => sale.sale_date.format("%Y-%m-%d").to_string(),
        };
        groups.entry(key).or_default().push(ReportLine::from(sale));
    }

    let sections: Vec<ReportSection> = groups
        .into_iter()
        .map(|(heading, lines)| ReportSection {
            total: lines.iter().map(|l| l.sale_amount).sum(),
            heading,
            lines,
        })
        .collect();

    WeeklyReport {
        company_name: company_name.to_string(),
        grouping,
        period_start: since,
        period_end: until,
        grand_total: sections.iter().map(|s| s.total).sum(),
        sections,
        generated_at: until,
    }
}

fn money(amount: Decimal) -> String {
    format!("Rs.{:.2}", amount.round_dp(2))
}

/// Renders `rows` under `header` with columns padded to their widest cell.
/// Columns listed in `right` are right-aligned.
fn table(out: &mut String, header: &[&str], rows: &[Vec<String>], right: &[usize]) {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    table_row(out, header, &widths, right);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        table_row(out, &cells, &widths, right);
    }
}

fn table_row(out: &mut String, cells: &[&str], widths: &[usize], right: &[usize]) {
    let rendered: Vec<String> = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            if right.contains(&i) {
                format!("{cell:>width$}", width = widths[i])
            } else {
                format!("{cell:<width$}", width = widths[i])
            }
        })
        .collect();
    let _ = writeln!(out, "{}", rendered.join(" | ").trim_end());
}

impl WeeklyReport {
    pub fn title(&self) -> &'static str {
        match self.grouping {
            Grouping::Customer => "Weekly Sales Report by Customer",
            Grouping::Date => "Weekly Sales Report by Date",
        }
    }

    pub fn file_name(&self) -> String {
        let kind = match self.grouping {
            Grouping::Customer => "customer",
            Grouping::Date => "date",
        };
        format!(
            "weekly_report_by_{kind}_{}.txt",
            self.generated_at.format("%Y%m%d")
        )
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.company_name);
        let _ = writeln!(out, "{}", self.title());
        let _ = writeln!(
            out,
            "({} to {})",
            self.period_start.format("%Y-%m-%d"),
            self.period_end.format("%Y-%m-%d")
        );

        if self.sections.is_empty() {
            let _ = writeln!(out, "\nNo sales found for this period.");
            return out;
        }

        let (label, first_column) = match self.grouping {
            Grouping::Customer => ("Customer", "Date"),
            Grouping::Date => ("Date", "Customer Name"),
        };
        let header = [first_column, "Product Name", "Company", "Qty", "Unit Price", "Amount (Rs.)"];

        for section in &self.sections {
            let _ = writeln!(out, "\n{label}: {}", section.heading);
            let mut rows: Vec<Vec<String>> = section
                .lines
                .iter()
                .map(|l| {
                    let first = match self.grouping {
                        Grouping::Customer => l.sale_date.format("%Y-%m-%d").to_string(),
                        Grouping::Date => l.customer_name.clone(),
                    };
                    vec![
                        first,
                        l.product_name.clone(),
                        l.company_name.clone(),
                        l.quantity_sold.to_string(),
                        money(l.unit_price),
                        money(l.sale_amount),
                    ]
                })
                .collect();
            rows.push(vec![
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                "Total:".to_string(),
                money(section.total),
            ]);
            table(&mut out, &header, &rows, &[3, 4, 5]);
        }

        let _ = writeln!(out, "\nGrand Total: {}", money(self.grand_total));
        out
    }
}

// ==================== Receipt ====================

#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub company_name: String,
    pub receipt_number: String,
    pub sale: Sale,
    pub generated_at: DateTime<Utc>,
}

impl Receipt {
    pub fn new(sale: Sale, company_name: &str, generated_at: DateTime<Utc>) -> Self {
        Receipt {
            company_name: company_name.to_string(),
            receipt_number: format!("RCP-{:06}", sale.id),
            sale,
            generated_at,
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "receipt_{}_{}.txt",
            self.sale.id,
            self.generated_at.format("%Y%m%d")
        )
    }

    pub fn render_text(&self) -> String {
        let sale = &self.sale;
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.company_name);
        let _ = writeln!(out, "SALES RECEIPT\n");

        let mut details = vec![
            vec!["Receipt No:".to_string(), self.receipt_number.clone()],
            vec![
                "Date:".to_string(),
                sale.sale_date.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
            vec!["Customer:".to_string(), sale.customer_name.clone()],
            vec!["Payment Status:".to_string(), sale.payment_status.as_str().to_uppercase()],
        ];
        if let Some(method) = &sale.payment_method {
            details.push(vec!["Payment Method:".to_string(), method.clone()]);
        }
        for row in &details {
            let _ = writeln!(out, "{:<16}{}", row[0], row[1]);
        }
        out.push('\n');

        table(
            &mut out,
            &["Product", "Company", "Qty", "Unit Price", "Amount (Rs.)"],
            &[vec![
                sale.product_name.clone(),
                sale.company_name.clone(),
                sale.quantity_sold.to_string(),
                money(sale.unit_price),
                money(sale.sale_amount),
            ]],
            &[2, 3, 4],
        );

        let _ = writeln!(out, "\nTOTAL: {}", money(sale.sale_amount));
        let _ = writeln!(out, "\nThank you for your business!");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        "2024-06-15T12:00:00Z".parse().unwrap()
    }

    fn sale(id: i64, customer: &str, quantity_sold: i32, unit_price: Decimal, days_ago: i64) -> Sale {
        Sale {
            id,
            product_name: "Wheat Seeds".into(),
            company_name: "AgriSeeds Ltd".into(),
            quantity_sold,
            customer_name: customer.into(),
            unit_price,
            sale_amount: unit_price * Decimal::from(quantity_sold),
            payment_status: PaymentStatus::Unpaid,
            payment_date: None,
            payment_method: None,
            sale_date: now() - Duration::days(days_ago),
        }
    }

    fn sales() -> Vec<Sale> {
        vec![
            sale(1, "Ravi", 2, dec!(10), 1),
            sale(2, "Mani", 1, dec!(12.5), 2),
            sale(3, "Ravi", 3, dec!(10), 2),
            sale(4, "Ravi", 9, dec!(10), 30),
        ]
    }

    #[test]
    fn groups_by_customer_within_the_week() {
        let since = now() - Duration::days(REPORT_DAYS);
        let report = weekly_report(&sales(), Grouping::Customer, since, now(), "SRI LAKSHMI ENTERPRISES");

        let headings: Vec<&str> = report.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["Mani", "Ravi"]);
        assert_eq!(report.sections[1].total, dec!(50));
        assert_eq!(report.sections[1].lines[0].sale_id, 3);
        assert_eq!(report.grand_total, dec!(62.5));
        assert_eq!(report.file_name(), "weekly_report_by_customer_20240615.txt");
    }

    #[test]
    fn groups_by_day() {
        let since = now() - Duration::days(REPORT_DAYS);
        let report = weekly_report(&sales(), Grouping::Date, since, now(), "Shop");

        let headings: Vec<&str> = report.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["2024-06-13", "2024-06-14"]);
        assert_eq!(report.sections[0].total, dec!(42.5));

        let text = report.render_text();
        assert!(text.contains("Weekly Sales Report by Date"));
        assert!(text.contains("Date: 2024-06-13"));
        assert!(text.contains("Rs.42.50"));
        assert!(text.contains("Grand Total: Rs.62.50"));
    }

    #[test]
    fn empty_week_says_so() {
        let since = now() - Duration::days(REPORT_DAYS);
        let text = weekly_report(&[], Grouping::Customer, since, now(), "Shop").render_text();
        assert!(text.contains("No sales found for this period."));
    }

    #[test]
    fn receipt_numbers_are_zero_padded() {
        let receipt = Receipt::new(sale(42, "Ravi", 2, dec!(10), 0), "Shop", now());
        assert_eq!(receipt.receipt_number, "RCP-000042");
        assert_eq!(receipt.file_name(), "receipt_42_20240615.txt");

        let text = receipt.render_text();
        assert!(text.contains("SALES RECEIPT"));
        assert!(text.contains("Payment Status: UNPAID"));
        assert!(text.contains("TOTAL: Rs.20.00"));
    }
}
