use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::api::auth::AuthUser;
use crate::api::server::AppState;
use crate::db::models::{
    Checkpost, CollectionLocation, Committee, Commodity, MonthlySummary, NatureOfReceipt, Receipt,
    ReceiptStatus, Role, Unit, User,
};
use crate::db::repo;
use crate::domain::filters::{self, ReceiptFilter};
use crate::domain::{access, analytics, export, period::MonthWindow};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptPayload {
    #[serde(default)]
    pub committee_id: Option<String>,
    pub date: NaiveDate,
    pub book_number: String,
    pub receipt_number: String,
    pub trader_name: String,
    #[serde(default)]
    pub trader_address: String,
    pub payee_name: String,
    #[serde(default)]
    pub payee_address: String,
    pub commodity: String,
    pub quantity: f64,
    pub unit: Unit,
    pub value: f64,
    pub fees_paid: f64,
    pub nature_of_receipt: NatureOfReceipt,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    pub collection_location: CollectionLocation,
    #[serde(default)]
    pub collected_by: Option<String>,
    #[serde(default)]
    pub checkpost_location: Option<String>,
    pub generated_by: String,
    #[serde(default)]
    pub designation: String,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Checks a receipt form against its committee and the commodity registry,
/// normalising it in place: text is trimmed, the commodity takes its
/// registered spelling, and only the sub-location matching the collection
/// location is kept.
pub fn validate_payload(
    payload: &mut ReceiptPayload,
    committee: &Committee,
    checkposts: &[Checkpost],
    commodities: &[Commodity],
) -> AppResult<()> {
    for (field, value) in [
        ("book_number", &mut payload.book_number),
        ("receipt_number", &mut payload.receipt_number),
        ("trader_name", &mut payload.trader_name),
        ("payee_name", &mut payload.payee_name),
        ("commodity", &mut payload.commodity),
        ("generated_by", &mut payload.generated_by),
    ] {
        *value = value.trim().to_string();
        if value.is_empty() {
            return Err(AppError::bad_request(format!("{field} is required")));
        }
    }
    payload.trader_address = payload.trader_address.trim().to_string();
    payload.payee_address = payload.payee_address.trim().to_string();
    payload.designation = payload.designation.trim().to_string();

    for (field, amount) in [
        ("quantity", payload.quantity),
        ("value", payload.value),
        ("fees_paid", payload.fees_paid),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(AppError::bad_request(format!(
                "{field} must be a non-negative number"
            )));
        }
    }

    if !commodities.is_empty() {
        let registered = commodities
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(&payload.commodity))
            .ok_or_else(|| AppError::bad_request(format!("Unknown commodity {}", payload.commodity)))?;
        payload.commodity = registered.name.clone();
    }

    payload.vehicle_number = trimmed(payload.vehicle_number.take());
    payload.invoice_number = trimmed(payload.invoice_number.take());
    let collected_by = trimmed(payload.collected_by.take());
    let checkpost = trimmed(payload.checkpost_location.take());

    match payload.collection_location {
        CollectionLocation::Office => {
            if collected_by.is_none() {
                return Err(AppError::bad_request(
                    "Please select who collected the receipt",
                ));
            }
            payload.collected_by = collected_by;
        }
        CollectionLocation::Checkpost => {
            if checkposts.is_empty() {
                return Err(AppError::bad_request(format!(
                    "{} does not have any checkpost locations",
                    committee.name
                )));
            }
            let name = checkpost
                .ok_or_else(|| AppError::bad_request("Please select checkpost location"))?;
            let known = checkposts
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&name))
                .ok_or_else(|| {
                    AppError::bad_request(format!("{name} is not a checkpost of {}", committee.name))
                })?;
            payload.checkpost_location = Some(known.name.clone());
        }
    }

    Ok(())
}

/// The committee a new receipt is filed under. Committee-bound users always
/// file under their own; JD has to say which.
fn target_committee<'a>(
    user: &User,
    committees: &'a [Committee],
    requested: Option<&str>,
) -> AppResult<&'a Committee> {
    if user.role.is_district_wide() {
        let id = requested.ok_or_else(|| AppError::bad_request("committee_id is required"))?;
        return committees
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::bad_request(format!("Unknown committee {id}")));
    }

    let own = access::resolve_committee(user, committees).ok_or_else(|| {
        AppError::forbidden(format!(
            "Committee {:?} not found. Please contact administrator.",
            user.committee.as_deref().unwrap_or_default()
        ))
    })?;

    match requested {
        Some(id) if id != own.id => Err(AppError::forbidden(
            "Receipts can only be created for your own committee",
        )),
        _ => Ok(own),
    }
}

fn duplicate_error(receipt: &Receipt) -> AppError {
    AppError::Conflict(format!(
        "A receipt with book number {} and receipt number {} already exists.",
        receipt.book_number, receipt.receipt_number
    ))
}

async fn load_visible(state: &AppState, user: &User) -> AppResult<Vec<Receipt>> {
    let committees = repo::list_committees(&state.db).await?;
    let receipts = repo::list_receipts(&state.db).await?;
    Ok(access::visible_receipts(user, &committees, receipts))
}

/// A receipt the caller may see, or 404 so other committees' receipts do
/// not leak through their ids.
async fn load_visible_receipt(state: &AppState, user: &User, id: &str) -> AppResult<(Committee, Receipt)> {
    let not_found = || AppError::not_found("Receipt not found");

    let receipt = repo::get_receipt(&state.db, id).await?.ok_or_else(not_found)?;
    let committees = repo::list_committees(&state.db).await?;
    if !access::can_view_committee(user, &committees, &receipt.committee_id) {
        return Err(not_found());
    }

    let committee = committees
        .into_iter()
        .find(|c| c.id == receipt.committee_id)
        .ok_or_else(not_found)?;
    Ok((committee, receipt))
}

fn ensure_can_modify(user: &User, receipt: &Receipt) -> AppResult<()> {
    if user.role == Role::Deo && receipt.created_by != user.id {
        return Err(AppError::forbidden(
            "Data entry operators can only modify receipts they created",
        ));
    }
    Ok(())
}

pub async fn create_receipt(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(mut payload): Json<ReceiptPayload>,
) -> AppResult<impl IntoResponse> {
    let committees = repo::list_committees(&state.db).await?;
    let committee = target_committee(&user, &committees, payload.committee_id.as_deref())?;

    let checkposts = repo::list_checkposts(&state.db, &committee.id).await?;
    let commodities = repo::list_commodities(&state.db).await?;
    validate_payload(&mut payload, committee, &checkposts, &commodities)?;

    let now = Utc::now();
    let receipt = Receipt {
        id: repo::new_id(),
        committee_id: committee.id.clone(),
        committee_name: Some(committee.name.clone()),
        date: payload.date,
        book_number: payload.book_number,
        receipt_number: payload.receipt_number,
        trader_name: payload.trader_name,
        trader_address: payload.trader_address,
        payee_name: payload.payee_name,
        payee_address: payload.payee_address,
        commodity: payload.commodity,
        quantity: payload.quantity,
        unit: payload.unit,
        value: payload.value,
        fees_paid: payload.fees_paid,
        nature_of_receipt: payload.nature_of_receipt,
        vehicle_number: payload.vehicle_number,
        invoice_number: payload.invoice_number,
        collection_location: payload.collection_location,
        collected_by: payload.collected_by,
        checkpost_location: payload.checkpost_location,
        generated_by: payload.generated_by,
        designation: payload.designation,
        created_by: user.id.clone(),
        status: ReceiptStatus::Active,
        created_at: now,
        updated_at: now,
    };

    if !repo::insert_receipt_if_unique(&state.db, &receipt).await? {
        return Err(duplicate_error(&receipt));
    }
    info!(
        "Receipt {}/{} added to {} by {}",
        receipt.book_number, receipt.receipt_number, committee.name, user.username
    );

    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Serialize)]
pub struct ReceiptList {
    pub title: &'static str,
    pub description: &'static str,
    pub count: usize,
    pub total_value: f64,
    pub commodities: Vec<String>,
    pub receipts: Vec<Receipt>,
}

pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(filter): Query<ReceiptFilter>,
) -> AppResult<Json<ReceiptList>> {
    let visible = load_visible(&state, &user).await?;
    let commodities = filters::distinct_commodities(&visible);
    let receipts = filter.apply(visible);

    Ok(Json(ReceiptList {
        title: analytics::receipt_list_title(user.role),
        description: analytics::receipt_list_description(user.role),
        count: receipts.len(),
        total_value: receipts.iter().map(|r| r.value).sum(),
        commodities,
        receipts,
    }))
}

pub async fn export_receipts(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(filter): Query<ReceiptFilter>,
) -> AppResult<impl IntoResponse> {
    let visible = load_visible(&state, &user).await?;
    let receipts = filter.apply(visible);
    let body = export::receipts_to_csv(&receipts)?;

    info!("{} exported {} receipts", user.username, receipts.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export::EXPORT_FILENAME),
            ),
        ],
        body,
    ))
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub book_number: String,
    #[serde(default)]
    pub receipt_number: String,
}

#[derive(Serialize)]
pub struct VerifyResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
}

pub async fn verify_receipt(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<VerifyQuery>,
) -> AppResult<Json<VerifyResult>> {
    let (book, number) = (query.book_number.trim(), query.receipt_number.trim());
    if book.is_empty() || number.is_empty() {
        return Err(AppError::bad_request(
            "book_number and receipt_number are required",
        ));
    }

    let committees = repo::list_committees(&state.db).await?;
    let matches = repo::find_receipts_by_numbers(&state.db, book, number).await?;
    let mut visible = access::visible_receipts(&user, &committees, matches);
    // An active match outranks a cancelled one with the same numbers.
    visible.sort_by_key(|r| !r.is_active());

    let result = match visible.into_iter().next() {
        Some(r) if r.is_active() => VerifyResult {
            status: "Genuine",
            receipt: Some(r),
        },
        Some(r) => VerifyResult {
            status: "Cancelled",
            receipt: Some(r),
        },
        None => VerifyResult {
            status: "Not Found",
            receipt: None,
        },
    };

    Ok(Json(result))
}

pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Receipt>> {
    let (_, receipt) = load_visible_receipt(&state, &user, &id).await?;
    Ok(Json(receipt))
}

pub async fn update_receipt(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(mut payload): Json<ReceiptPayload>,
) -> AppResult<Json<Receipt>> {
    let (committee, existing) = load_visible_receipt(&state, &user, &id).await?;
    ensure_can_modify(&user, &existing)?;

    if !existing.is_active() {
        return Err(AppError::Conflict("Cancelled receipts cannot be edited".into()));
    }
    if payload
        .committee_id
        .as_deref()
        .is_some_and(|requested| requested != existing.committee_id)
    {
        return Err(AppError::bad_request(
            "A receipt cannot be moved to another committee",
        ));
    }

    let checkposts = repo::list_checkposts(&state.db, &committee.id).await?;
    let commodities = repo::list_commodities(&state.db).await?;
    validate_payload(&mut payload, &committee, &checkposts, &commodities)?;

    let updated = Receipt {
        date: payload.date,
        book_number: payload.book_number,
        receipt_number: payload.receipt_number,
        trader_name: payload.trader_name,
        trader_address: payload.trader_address,
        payee_name: payload.payee_name,
        payee_address: payload.payee_address,
        commodity: payload.commodity,
        quantity: payload.quantity,
        unit: payload.unit,
        value: payload.value,
        fees_paid: payload.fees_paid,
        nature_of_receipt: payload.nature_of_receipt,
        vehicle_number: payload.vehicle_number,
        invoice_number: payload.invoice_number,
        collection_location: payload.collection_location,
        collected_by: payload.collected_by,
        checkpost_location: payload.checkpost_location,
        generated_by: payload.generated_by,
        designation: payload.designation,
        updated_at: Utc::now(),
        ..existing
    };

    if !repo::update_receipt_if_unique(&state.db, &updated).await? {
        return Err(duplicate_error(&updated));
    }
    info!("Receipt {} updated by {}", updated.id, user.username);

    Ok(Json(updated))
}

pub async fn cancel_receipt(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let (_, receipt) = load_visible_receipt(&state, &user, &id).await?;
    ensure_can_modify(&user, &receipt)?;

    if receipt.is_active() {
        repo::set_receipt_status(&state.db, &receipt.id, ReceiptStatus::Cancelled).await?;
        info!("Receipt {} cancelled by {}", receipt.id, user.username);
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn monthly_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((year, month, committee_id)): Path<(i32, u32, String)>,
) -> AppResult<Json<MonthlySummary>> {
    let window = MonthWindow::new(year, month)?;
    let committees = repo::list_committees(&state.db).await?;
    if !access::can_view_committee(&user, &committees, &committee_id) {
        return Err(AppError::forbidden(
            "You do not have access to this committee",
        ));
    }

    let summary = repo::monthly_summary(&state.db, &committee_id, &window).await?;
    Ok(Json(summary))
}
