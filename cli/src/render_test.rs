use super::*;
use serde_json::json;
use time::macros::date;

fn reminder(value: serde_json::Value) -> Reminder {
    serde_json::from_value(value).unwrap()
}

#[test]
fn rupees_uses_two_decimals() {
    assert_eq!(rupees(450.5), "₹450.50");
    assert_eq!(rupees(0.0), "₹0.00");
}

#[test]
fn payment_reminder_names_customer_and_amount() {
    let line = reminder_line(&reminder(json!({"id": "r1", "customerName": "Asha", "amountDue": 300})));
    assert_eq!(line, "[Payment Due] ₹300.00 due from Asha.");
}

#[test]
fn inventory_reminder_names_item_and_status() {
    let line = reminder_line(&reminder(json!({"id": "r2", "type": "Low Stock", "itemName": "Maggi", "status": "Open"})));
    assert_eq!(line, "[Low Stock] Item: Maggi. Status: Open");
}

#[test]
fn other_reminder_asks_for_action() {
    let line = reminder_line(&reminder(json!({"id": "r3", "type": "Follow up"})));
    assert_eq!(line, "[Follow up] Action Required. Status: Pending");
}

#[test]
fn inventory_line_flags_low_stock_and_expiry() {
    let item: InventoryItem = serde_json::from_value(json!({
        "id": "i1",
        "name": "Amul Butter",
        "quantity": 4,
        "unitCost": 48.0,
        "sellingPrice": 56.0,
        "expiryDate": "2025-10-20"
    }))
    .unwrap();
    let line = inventory_line(&item, date!(2025 - 10 - 14));
    assert!(line.ends_with("expiry 6 days left  LOW STOCK"), "{line}");
}

#[test]
fn transaction_line_lists_items() {
    let txn: Transaction = serde_json::from_value(json!({
        "id": "t1",
        "type": "credit",
        "amount": 120.0,
        "items": [{"name": "Atta", "quantity": 2, "price": 60, "total": 120}],
        "notes": "Items purchased"
    }))
    .unwrap();
    assert_eq!(transaction_line(&txn), "t1  credit   ₹120.00  [Atta x2]  Items purchased");
}
