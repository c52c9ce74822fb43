//! Compact text lines for terminal output.

use near_dukaan::api::{Customer, DashboardMetrics, InventoryItem, Reminder, ReminderKind, Transaction};
use time::Date;

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

pub fn rupees(amount: f64) -> String {
    format!("₹{amount:.2}")
}

pub fn customer_line(customer: &Customer) -> String {
    format!(
        "{}  {}  {}  due {}  spent {}",
        customer.id,
        customer.name,
        customer.phone,
        rupees(customer.due_balance),
        rupees(customer.total_spent)
    )
}

pub fn transaction_line(txn: &Transaction) -> String {
    let mut line = format!("{}  {:<7}  {}", txn.id, txn.payment_type.as_str(), rupees(txn.amount));
    if !txn.items.is_empty() {
        let items: Vec<String> = txn.items.iter().map(|item| format!("{} x{}", item.name, item.quantity)).collect();
        line.push_str("  [");
        line.push_str(&items.join(", "));
        line.push(']');
    }
    if !txn.notes.is_empty() {
        line.push_str("  ");
        line.push_str(&txn.notes);
    }
    line
}

pub fn inventory_line(item: &InventoryItem, today: Date) -> String {
    let stock = if item.is_low_stock() { "  LOW STOCK" } else { "" };
    format!(
        "{}  {}  qty {}  cost {}  price {}  expiry {}{stock}",
        item.id,
        item.name,
        item.quantity,
        rupees(item.unit_cost),
        rupees(item.selling_price),
        item.expiry_status(today)
    )
}

pub fn metrics_lines(metrics: &DashboardMetrics) -> Vec<String> {
    vec![
        format!("Total outstanding dues: {}", rupees(metrics.total_outstanding_dues)),
        format!("Active customers: {}", metrics.active_customer_count),
        format!("Items low in stock: {}", metrics.items_low_in_stock),
        format!("Expiry alerts: {}", metrics.expiry_alerts),
    ]
}

/// One-line reminder text, worded per reminder kind.
pub fn reminder_line(reminder: &Reminder) -> String {
    let summary = match reminder.kind() {
        ReminderKind::Payment => format!(
            "{} due from {}.",
            rupees(reminder.amount_due.unwrap_or_default()),
            reminder.customer_name.as_deref().unwrap_or("unknown customer")
        ),
        ReminderKind::Inventory => format!(
            "Item: {}. Status: {}",
            reminder.item_name.as_deref().unwrap_or("unknown item"),
            reminder.status
        ),
        ReminderKind::Other => format!("Action Required. Status: {}", reminder.status),
    };
    format!("[{}] {summary}", reminder.reminder_type)
}
