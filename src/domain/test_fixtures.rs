use chrono::{NaiveDate, TimeZone, Utc};

use crate::db::models::{
    CollectionLocation, Committee, NatureOfReceipt, Receipt, ReceiptStatus, Role, Unit, User,
};

pub fn user(username: &str, role: Role, committee: Option<&str>) -> User {
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    User {
        id: format!("u-{username}"),
        username: username.to_string(),
        full_name: username.to_string(),
        email: None,
        role,
        committee: committee.map(str::to_string),
        created_at: now,
        updated_at: now,
    }
}

pub fn committee(id: &str, code: &str, name: &str) -> Committee {
    Committee {
        id: id.to_string(),
        code: code.to_string(),
        name: name.to_string(),
        district: Some("East Godavari".to_string()),
        state: Some("Andhra Pradesh".to_string()),
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// A minimal active market-fee receipt; tests override what they care about.
pub fn receipt(id: &str, committee_id: &str, date: &str) -> Receipt {
    let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    Receipt {
        id: id.to_string(),
        committee_id: committee_id.to_string(),
        committee_name: None,
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        book_number: "B1".to_string(),
        receipt_number: id.to_string(),
        trader_name: "Trader".to_string(),
        trader_address: "Main Road".to_string(),
        payee_name: "Payee".to_string(),
        payee_address: "Market Yard".to_string(),
        commodity: "Rice".to_string(),
        quantity: 1.0,
        unit: Unit::Quintals,
        value: 100.0,
        fees_paid: 1.0,
        nature_of_receipt: NatureOfReceipt::MarketFee,
        vehicle_number: None,
        invoice_number: None,
        collection_location: CollectionLocation::Office,
        collected_by: Some("supervisor_1".to_string()),
        checkpost_location: None,
        generated_by: "deo".to_string(),
        designation: "DEO".to_string(),
        created_by: "u-deo".to_string(),
        status: ReceiptStatus::Active,
        created_at: created,
        updated_at: created,
    }
}
