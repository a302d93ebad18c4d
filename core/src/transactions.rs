use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};
use tracing::{debug, warn};

use crate::api::{AdminApi, Task};
use crate::error::Failure;
use crate::model::{Transaction, TransactionStatus};
use crate::notify::Notifications;
use crate::table::{Align, Column, TableRow};
use crate::targets;

pub const CURRENCY_CODE: &str = "GTQ";
pub const DEFAULT_ROWS_PER_PAGE: usize = 10;

pub const TRANSACTION_COLUMNS: [Column; 6] = [
    Column::new("id", "ID", Align::Left),
    Column::new("client_name", "Client", Align::Left),
    Column::new("amount", "Amount", Align::Right),
    Column::new("status", "Status", Align::Center),
    Column::new("created_at", "Created", Align::Left),
    Column::new("actions", "Actions", Align::Center),
];

/// Badge colour for a transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Warning,
    Positive,
    Negative,
    Grey,
}

impl StatusColor {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusColor::Warning => "warning",
            StatusColor::Positive => "positive",
            StatusColor::Negative => "negative",
            StatusColor::Grey => "grey",
        }
    }
}

pub fn status_color(status: TransactionStatus) -> StatusColor {
    match status {
        TransactionStatus::Pending => StatusColor::Warning,
        TransactionStatus::Approved | TransactionStatus::Completed => StatusColor::Positive,
        TransactionStatus::Rejected | TransactionStatus::Failed => StatusColor::Negative,
        TransactionStatus::Unknown => StatusColor::Grey,
    }
}

/// en-US currency rendering with the fixed currency code, e.g. `GTQ 1,234.50`.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{sign}{CURRENCY_CODE} {}.{:02}",
        group_thousands(cents / 100),
        cents % 100
    )
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    format_timestamp_in(timestamp, &Local)
}

pub fn format_timestamp_in<Tz>(timestamp: &DateTime<Utc>, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    timestamp
        .with_timezone(zone)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

impl TableRow for Transaction {
    fn cell(&self, column: &str) -> String {
        match column {
            "id" => self.id.clone(),
            "client_name" => self.client_name.clone(),
            "amount" => format_amount(self.amount),
            "status" => self.status.to_string(),
            "created_at" => format_timestamp(&self.created_at),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub sort_by: &'static str,
    pub descending: bool,
    pub page: usize,
    /// Zero shows every row on one page.
    pub rows_per_page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            sort_by: "created_at",
            descending: true,
            page: 1,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }
}

/// Read-only projection over a list of transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionTable {
    rows: Vec<Transaction>,
    pagination: Pagination,
}

impl TransactionTable {
    pub fn new(rows: Vec<Transaction>) -> Self {
        Self {
            rows,
            pagination: Pagination::default(),
        }
    }

    pub fn set_rows(&mut self, rows: Vec<Transaction>) {
        self.rows = rows;
        self.clamp_page();
    }

    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Sorts by `column`. Re-selecting the current column flips direction;
    /// a new column starts ascending. Unsortable columns are ignored.
    pub fn sort_by(&mut self, column: &str) -> bool {
        let Some(column) = TRANSACTION_COLUMNS
            .iter()
            .find(|candidate| candidate.name == column && candidate.name != "actions")
        else {
            return false;
        };

        if self.pagination.sort_by == column.name {
            self.pagination.descending = !self.pagination.descending;
        } else {
            self.pagination.sort_by = column.name;
            self.pagination.descending = false;
        }
        self.pagination.page = 1;
        true
    }

    pub fn set_rows_per_page(&mut self, rows_per_page: usize) {
        self.pagination.rows_per_page = rows_per_page;
        self.pagination.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.pagination.page = page;
        self.clamp_page();
    }

    pub fn next_page(&mut self) {
        self.set_page(self.pagination.page.saturating_add(1));
    }

    pub fn previous_page(&mut self) {
        self.set_page(self.pagination.page.saturating_sub(1));
    }

    pub fn page_count(&self) -> usize {
        match self.pagination.rows_per_page {
            0 => 1,
            per_page => self.rows.len().div_ceil(per_page).max(1),
        }
    }

    pub fn sorted_rows(&self) -> Vec<&Transaction> {
        let mut rows: Vec<&Transaction> = self.rows.iter().collect();
        let column = self.pagination.sort_by;
        rows.sort_by(|left, right| {
            let ordering = compare_by(column, left, right);
            if self.pagination.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        rows
    }

    pub fn visible_rows(&self) -> Vec<&Transaction> {
        let rows = self.sorted_rows();
        let per_page = self.pagination.rows_per_page;
        if per_page == 0 {
            return rows;
        }
        rows.into_iter()
            .skip((self.pagination.page - 1) * per_page)
            .take(per_page)
            .collect()
    }

    fn clamp_page(&mut self) {
        self.pagination.page = self.pagination.page.clamp(1, self.page_count());
    }
}

fn compare_by(column: &str, left: &Transaction, right: &Transaction) -> Ordering {
    match column {
        "id" => left.id.cmp(&right.id),
        "client_name" => left.client_name.cmp(&right.client_name),
        "amount" => left.amount.total_cmp(&right.amount),
        "status" => left.status.as_str().cmp(right.status.as_str()),
        _ => left.created_at.cmp(&right.created_at),
    }
}

#[derive(Debug, Clone)]
pub enum TransactionEvent {
    Loaded(Result<Vec<Transaction>, Failure>),
}

/// Transactions tab: fetches the list and feeds the table.
#[derive(Debug)]
pub struct TransactionsView {
    api: AdminApi,
    table: TransactionTable,
    loading: bool,
    notifications: Notifications,
}

impl TransactionsView {
    pub fn new(api: AdminApi) -> Self {
        Self {
            api,
            table: TransactionTable::default(),
            loading: false,
            notifications: Notifications::default(),
        }
    }

    pub fn table(&self) -> &TransactionTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TransactionTable {
        &mut self.table
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    pub fn load(&mut self) -> Option<Task<TransactionEvent>> {
        if self.loading {
            return None;
        }
        self.loading = true;
        Some(crate::api::task(
            self.api.list_transactions(),
            TransactionEvent::Loaded,
        ))
    }

    pub fn apply(&mut self, event: TransactionEvent) {
        match event {
            TransactionEvent::Loaded(result) => {
                self.loading = false;
                match result {
                    Ok(rows) => {
                        debug!(target: targets::API, count = rows.len(), "Transactions loaded");
                        self.table.set_rows(rows);
                    }
                    Err(failure) => {
                        warn!(target: targets::API, error = %failure, "Transactions load failed");
                        self.notifications.negative(&failure);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockTransport;
    use crate::model::parse_timestamp;
    use serde_json::json;

    fn transaction(id: &str, amount: f64, created_at: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            client_name: format!("client-{id}"),
            amount,
            status: TransactionStatus::Pending,
            created_at: parse_timestamp(created_at).expect("timestamp"),
        }
    }

    fn ids(rows: &[&Transaction]) -> Vec<String> {
        rows.iter().map(|row| row.id.clone()).collect()
    }

    #[test]
    fn default_view_is_newest_first() {
        let table = TransactionTable::new(vec![
            transaction("b", 1.0, "2024-02-01T00:00:00Z"),
            transaction("c", 1.0, "2024-03-01T00:00:00Z"),
            transaction("a", 1.0, "2024-01-01T00:00:00Z"),
        ]);

        assert_eq!(table.pagination(), Pagination::default());
        assert_eq!(ids(&table.visible_rows()), ["c", "b", "a"]);
    }

    #[test]
    fn sorting_toggles_and_pages_are_clamped() {
        let rows = (0..25)
            .map(|index| {
                transaction(
                    &format!("t{index:02}"),
                    f64::from(index),
                    "2024-01-01T00:00:00Z",
                )
            })
            .collect();
        let mut table = TransactionTable::new(rows);
        assert_eq!(table.page_count(), 3);

        assert!(table.sort_by("amount"));
        assert!(!table.pagination().descending);
        assert_eq!(table.visible_rows()[0].id, "t00");

        assert!(table.sort_by("amount"));
        assert_eq!(table.visible_rows()[0].id, "t24");

        table.set_page(9);
        assert_eq!(table.pagination().page, 3);
        assert_eq!(table.visible_rows().len(), 5);

        table.previous_page();
        table.previous_page();
        table.previous_page();
        assert_eq!(table.pagination().page, 1);

        assert!(!table.sort_by("actions"));
    }

    #[test]
    fn status_colors_have_grey_fallback() {
        assert_eq!(status_color(TransactionStatus::Pending), StatusColor::Warning);
        assert_eq!(status_color(TransactionStatus::Completed), StatusColor::Positive);
        assert_eq!(status_color(TransactionStatus::Failed), StatusColor::Negative);
        assert_eq!(status_color(TransactionStatus::Unknown).as_str(), "grey");
    }

    #[test]
    fn amounts_use_grouping_and_currency_code() {
        assert_eq!(format_amount(1234.5), "GTQ 1,234.50");
        assert_eq!(format_amount(0.0), "GTQ 0.00");
        assert_eq!(format_amount(-5.0), "-GTQ 5.00");
        assert_eq!(format_amount(1_000_000.004), "GTQ 1,000,000.00");
    }

    #[test]
    fn timestamps_render_like_en_us_locale() {
        let timestamp = parse_timestamp("2024-03-05T14:07:09Z").expect("timestamp");
        assert_eq!(format_timestamp_in(&timestamp, &Utc), "3/5/2024, 2:07:09 PM");
    }

    fn run_future<T>(future: impl std::future::Future<Output = T>) -> T {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("tokio runtime");
        runtime.block_on(future)
    }

    #[test]
    fn view_loads_rows_and_reports_failures() {
        let transport = MockTransport::new();
        transport.push_json(json!([
            {"id": "t1", "client_name": "Ana", "amount": "10.5", "status": "approved",
             "created_at": "2024-01-01T00:00:00"}
        ]));
        let mut view = TransactionsView::new(AdminApi::new(transport.clone()));

        let task = view.load().expect("load task");
        assert!(view.load().is_none());
        let event = run_future(task);
        view.apply(event);

        assert!(!view.is_loading());
        assert_eq!(view.table().rows().len(), 1);
        assert_eq!(view.table().rows()[0].amount, 10.5);

        let task = view.load().expect("second load");
        view.apply(run_future(task));
        assert!(!view.is_loading());
        assert_eq!(view.table().rows().len(), 1);
        assert_eq!(view.notifications_mut().drain().len(), 1);
    }
}
