use chrono::{NaiveDate, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::db::models::{
    Checkpost, Committee, Commodity, CommodityVolume, DistrictCumulative, DistrictMetrics,
    DistrictMonth, MonthlySummary, Receipt, ReceiptStatus, Trader, User,
};
use crate::domain::period::MonthWindow;

const SCHEMA: [&str; 9] = [
    r#"
    CREATE TABLE IF NOT EXISTS committees (
        id TEXT PRIMARY KEY,
        code TEXT UNIQUE NOT NULL COLLATE NOCASE,
        name TEXT NOT NULL,
        district TEXT,
        state TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS checkposts (
        id TEXT PRIMARY KEY,
        committee_id TEXT NOT NULL REFERENCES committees(id),
        name TEXT NOT NULL,
        UNIQUE (committee_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT UNIQUE NOT NULL,
        full_name TEXT NOT NULL,
        email TEXT,
        role TEXT NOT NULL,
        committee TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_credentials (
        user_id TEXT PRIMARY KEY REFERENCES users(id),
        password_hash TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS traders (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        address TEXT NOT NULL,
        joined_date TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS commodities (
        id TEXT PRIMARY KEY,
        name TEXT UNIQUE NOT NULL COLLATE NOCASE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS receipts (
        id TEXT PRIMARY KEY,
        committee_id TEXT NOT NULL REFERENCES committees(id),
        date TEXT NOT NULL,
        book_number TEXT NOT NULL,
        receipt_number TEXT NOT NULL,
        trader_name TEXT NOT NULL,
        trader_address TEXT NOT NULL,
        payee_name TEXT NOT NULL,
        payee_address TEXT NOT NULL,
        commodity TEXT NOT NULL,
        quantity REAL NOT NULL,
        unit TEXT NOT NULL,
        value REAL NOT NULL,
        fees_paid REAL NOT NULL,
        nature_of_receipt TEXT NOT NULL,
        vehicle_number TEXT,
        invoice_number TEXT,
        collection_location TEXT NOT NULL,
        collected_by TEXT,
        checkpost_location TEXT,
        generated_by TEXT NOT NULL,
        designation TEXT NOT NULL,
        created_by TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'Active',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_receipts_committee_date ON receipts (committee_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_receipts_numbers ON receipts (committee_id, book_number, receipt_number)",
];

const RECEIPT_SELECT: &str = r#"
    SELECT r.id, r.committee_id, c.name AS committee_name, r.date, r.book_number,
           r.receipt_number, r.trader_name, r.trader_address, r.payee_name,
           r.payee_address, r.commodity, r.quantity, r.unit, r.value, r.fees_paid,
           r.nature_of_receipt, r.vehicle_number, r.invoice_number,
           r.collection_location, r.collected_by, r.checkpost_location,
           r.generated_by, r.designation, r.created_by, r.status,
           r.created_at, r.updated_at
    FROM receipts r
    LEFT JOIN committees c ON c.id = r.committee_id
"#;

pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!("Schema ready ({} statements)", SCHEMA.len());
    Ok(())
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Profile and credential go in together or not at all.
pub async fn insert_user(pool: &SqlitePool, user: &User, password_hash: &str) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO users (id, username, full_name, email, role, committee, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.full_name)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(&user.committee)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO user_credentials (user_id, password_hash) VALUES (?, ?)")
        .bind(&user.id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
        .fetch_all(pool)
        .await
}

pub async fn update_user(pool: &SqlitePool, user: &User) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET full_name = ?, email = ?, role = ?, committee = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.full_name)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(&user.committee)
    .bind(Utc::now())
    .bind(&user.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_password_hash(pool: &SqlitePool, user_id: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT password_hash FROM user_credentials WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn set_password_hash(pool: &SqlitePool, user_id: &str, password_hash: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE user_credentials SET password_hash = ? WHERE user_id = ?")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Committees and checkposts
// ---------------------------------------------------------------------------

pub async fn insert_committee(pool: &SqlitePool, committee: &Committee) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO committees (id, code, name, district, state, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&committee.id)
    .bind(&committee.code)
    .bind(&committee.name)
    .bind(&committee.district)
    .bind(&committee.state)
    .bind(committee.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_committees(pool: &SqlitePool) -> Result<Vec<Committee>, sqlx::Error> {
    sqlx::query_as::<_, Committee>("SELECT * FROM committees ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn get_committee_by_code(pool: &SqlitePool, code: &str) -> Result<Option<Committee>, sqlx::Error> {
    sqlx::query_as::<_, Committee>("SELECT * FROM committees WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await
}

pub async fn insert_checkpost(pool: &SqlitePool, checkpost: &Checkpost) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO checkposts (id, committee_id, name) VALUES (?, ?, ?)")
        .bind(&checkpost.id)
        .bind(&checkpost.committee_id)
        .bind(&checkpost.name)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn list_checkposts(pool: &SqlitePool, committee_id: &str) -> Result<Vec<Checkpost>, sqlx::Error> {
    sqlx::query_as::<_, Checkpost>("SELECT * FROM checkposts WHERE committee_id = ? ORDER BY name")
        .bind(committee_id)
        .fetch_all(pool)
        .await
}

// ---------------------------------------------------------------------------
// Traders
// ---------------------------------------------------------------------------

pub async fn insert_trader(pool: &SqlitePool, trader: &Trader) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO traders (id, name, address, joined_date, is_active)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&trader.id)
    .bind(&trader.name)
    .bind(&trader.address)
    .bind(trader.joined_date)
    .bind(trader.is_active)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_active_traders(pool: &SqlitePool) -> Result<Vec<Trader>, sqlx::Error> {
    sqlx::query_as::<_, Trader>("SELECT * FROM traders WHERE is_active = 1 ORDER BY name")
        .fetch_all(pool)
        .await
}

/// Traders are never deleted; receipts keep referring to them by name.
pub async fn deactivate_trader(pool: &SqlitePool, trader_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE traders SET is_active = 0 WHERE id = ? AND is_active = 1")
        .bind(trader_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Commodities
// ---------------------------------------------------------------------------

pub async fn insert_commodity(pool: &SqlitePool, commodity: &Commodity) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO commodities (id, name) VALUES (?, ?)")
        .bind(&commodity.id)
        .bind(&commodity.name)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn list_commodities(pool: &SqlitePool) -> Result<Vec<Commodity>, sqlx::Error> {
    sqlx::query_as::<_, Commodity>("SELECT * FROM commodities ORDER BY name")
        .fetch_all(pool)
        .await
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Is there another active receipt in this committee with the same book and
/// receipt number? `exclude_id` skips the receipt being edited.
pub async fn active_duplicate_exists<'c>(
    conn: impl SqliteExecutor<'c>,
    committee_id: &str,
    book_number: &str,
    receipt_number: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let found: Option<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM receipts
        WHERE committee_id = ?
          AND book_number = ?
          AND receipt_number = ?
          AND status = 'Active'
          AND (? IS NULL OR id <> ?)
        LIMIT 1
        "#,
    )
    .bind(committee_id)
    .bind(book_number)
    .bind(receipt_number)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_optional(conn)
    .await?;

    Ok(found.is_some())
}

pub async fn insert_receipt<'c>(conn: impl SqliteExecutor<'c>, r: &Receipt) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO receipts (
            id, committee_id, date, book_number, receipt_number, trader_name,
            trader_address, payee_name, payee_address, commodity, quantity, unit,
            value, fees_paid, nature_of_receipt, vehicle_number, invoice_number,
            collection_location, collected_by, checkpost_location, generated_by,
            designation, created_by, status, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&r.id)
    .bind(&r.committee_id)
    .bind(r.date)
    .bind(&r.book_number)
    .bind(&r.receipt_number)
    .bind(&r.trader_name)
    .bind(&r.trader_address)
    .bind(&r.payee_name)
    .bind(&r.payee_address)
    .bind(&r.commodity)
    .bind(r.quantity)
    .bind(r.unit.as_str())
    .bind(r.value)
    .bind(r.fees_paid)
    .bind(r.nature_of_receipt.as_str())
    .bind(&r.vehicle_number)
    .bind(&r.invoice_number)
    .bind(r.collection_location.as_str())
    .bind(&r.collected_by)
    .bind(&r.checkpost_location)
    .bind(&r.generated_by)
    .bind(&r.designation)
    .bind(&r.created_by)
    .bind(r.status.as_str())
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Rewrites the editable fields; id, committee, creator and status stay put.
pub async fn update_receipt<'c>(conn: impl SqliteExecutor<'c>, r: &Receipt) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE receipts SET
            date = ?, book_number = ?, receipt_number = ?, trader_name = ?,
            trader_address = ?, payee_name = ?, payee_address = ?, commodity = ?,
            quantity = ?, unit = ?, value = ?, fees_paid = ?, nature_of_receipt = ?,
            vehicle_number = ?, invoice_number = ?, collection_location = ?,
            collected_by = ?, checkpost_location = ?, generated_by = ?,
            designation = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(r.date)
    .bind(&r.book_number)
    .bind(&r.receipt_number)
    .bind(&r.trader_name)
    .bind(&r.trader_address)
    .bind(&r.payee_name)
    .bind(&r.payee_address)
    .bind(&r.commodity)
    .bind(r.quantity)
    .bind(r.unit.as_str())
    .bind(r.value)
    .bind(r.fees_paid)
    .bind(r.nature_of_receipt.as_str())
    .bind(&r.vehicle_number)
    .bind(&r.invoice_number)
    .bind(r.collection_location.as_str())
    .bind(&r.collected_by)
    .bind(&r.checkpost_location)
    .bind(&r.generated_by)
    .bind(&r.designation)
    .bind(r.updated_at)
    .bind(&r.id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Duplicate check and insert under one write lock, so two submissions of
/// the same numbers cannot both pass the check. `false` means an active
/// receipt with these numbers already exists and nothing was written.
pub async fn insert_receipt_if_unique(pool: &SqlitePool, r: &Receipt) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    if active_duplicate_exists(&mut *tx, &r.committee_id, &r.book_number, &r.receipt_number, None).await? {
        return Ok(false);
    }
    insert_receipt(&mut *tx, r).await?;

    tx.commit().await?;
    Ok(true)
}

/// Same as [`insert_receipt_if_unique`] for an edit; the receipt itself is
/// excluded from the check.
pub async fn update_receipt_if_unique(pool: &SqlitePool, r: &Receipt) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    if active_duplicate_exists(
        &mut *tx,
        &r.committee_id,
        &r.book_number,
        &r.receipt_number,
        Some(&r.id),
    )
    .await?
    {
        return Ok(false);
    }
    update_receipt(&mut *tx, r).await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn set_receipt_status(
    pool: &SqlitePool,
    receipt_id: &str,
    status: ReceiptStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE receipts SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(receipt_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_receipt(pool: &SqlitePool, receipt_id: &str) -> Result<Option<Receipt>, sqlx::Error> {
    let sql = format!("{RECEIPT_SELECT} WHERE r.id = ?");
    sqlx::query_as::<_, Receipt>(&sql)
        .bind(receipt_id)
        .fetch_optional(pool)
        .await
}

/// Every receipt, newest first. Visibility is applied by the caller.
pub async fn list_receipts(pool: &SqlitePool) -> Result<Vec<Receipt>, sqlx::Error> {
    let sql = format!("{RECEIPT_SELECT} ORDER BY r.created_at DESC, r.rowid DESC");
    sqlx::query_as::<_, Receipt>(&sql).fetch_all(pool).await
}

pub async fn find_receipts_by_numbers(
    pool: &SqlitePool,
    book_number: &str,
    receipt_number: &str,
) -> Result<Vec<Receipt>, sqlx::Error> {
    let sql = format!(
        "{RECEIPT_SELECT} WHERE r.book_number = ? AND r.receipt_number = ? ORDER BY r.created_at DESC, r.rowid DESC"
    );
    sqlx::query_as::<_, Receipt>(&sql)
        .bind(book_number)
        .bind(receipt_number)
        .fetch_all(pool)
        .await
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

pub async fn monthly_summary(
    pool: &SqlitePool,
    committee_id: &str,
    window: &MonthWindow,
) -> Result<MonthlySummary, sqlx::Error> {
    sqlx::query_as::<_, MonthlySummary>(
        r#"
        SELECT
            COUNT(*)                    AS total_receipts,
            COUNT(DISTINCT trader_name) AS active_members,
            TOTAL(value)                AS total_value,
            TOTAL(fees_paid)            AS total_fees,
            CASE WHEN COUNT(*) = 0 THEN 0.0
                 ELSE ROUND(TOTAL(value) / COUNT(*), 2)
            END                         AS average_value
        FROM receipts
        WHERE committee_id = ?
          AND status = 'Active'
          AND date >= ?
          AND date < ?
        "#,
    )
    .bind(committee_id)
    .bind(window.start)
    .bind(window.end)
    .fetch_one(pool)
    .await
}

pub async fn top_commodities(
    pool: &SqlitePool,
    committee_id: &str,
    window: &MonthWindow,
    limit: i64,
) -> Result<Vec<CommodityVolume>, sqlx::Error> {
    sqlx::query_as::<_, CommodityVolume>(
        r#"
        SELECT commodity, TOTAL(quantity) AS total_quantity
        FROM receipts
        WHERE committee_id = ?
          AND status = 'Active'
          AND date >= ?
          AND date < ?
        GROUP BY commodity
        ORDER BY total_quantity DESC, commodity ASC
        LIMIT ?
        "#,
    )
    .bind(committee_id)
    .bind(window.start)
    .bind(window.end)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn district_metrics(
    pool: &SqlitePool,
    district: &str,
    window: &MonthWindow,
) -> Result<DistrictMetrics, sqlx::Error> {
    let month = sqlx::query_as::<_, DistrictMonth>(
        r#"
        SELECT
            COUNT(*)                      AS total_receipts_month,
            COUNT(DISTINCT r.trader_name) AS active_traders_month,
            TOTAL(r.value)                AS total_value_month,
            TOTAL(r.quantity)             AS total_quantity_month,
            CASE WHEN COUNT(*) = 0 THEN 0.0
                 ELSE ROUND(TOTAL(r.value) / COUNT(*), 2)
            END                           AS avg_receipt_value
        FROM receipts r
        JOIN committees c ON c.id = r.committee_id
        WHERE c.district = ? COLLATE NOCASE
          AND r.status = 'Active'
          AND r.date >= ?
          AND r.date < ?
        "#,
    )
    .bind(district)
    .bind(window.start)
    .bind(window.end)
    .fetch_one(pool)
    .await?;

    let cumulative = sqlx::query_as::<_, DistrictCumulative>(
        r#"
        SELECT
            TOTAL(r.value)    AS total_value_cumulative,
            TOTAL(r.quantity) AS quantity_cumulative
        FROM receipts r
        JOIN committees c ON c.id = r.committee_id
        WHERE c.district = ? COLLATE NOCASE
          AND r.status = 'Active'
          AND r.date < ?
        "#,
    )
    .bind(district)
    .bind(window.end)
    .fetch_one(pool)
    .await?;

    Ok(DistrictMetrics {
        district: district.to_string(),
        month,
        cumulative,
    })
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::test_pool;
    use crate::domain::analytics;
    use crate::domain::test_fixtures::{committee, receipt, user};

    async fn seeded() -> SqlitePool {
        let pool = test_pool().await;
        insert_committee(&pool, &committee("c1", "TUNI", "Tuni Agricultural Market Committee"))
            .await
            .unwrap();
        insert_committee(&pool, &committee("c2", "KKD", "Kakinada Agricultural Market Committee"))
            .await
            .unwrap();
        pool
    }

    fn trade(id: &str, committee_id: &str, date: &str, trader: &str, value: f64) -> Receipt {
        let mut r = receipt(id, committee_id, date);
        r.trader_name = trader.to_string();
        r.value = value;
        r.fees_paid = value / 100.0;
        r.quantity = value / 10.0;
        r
    }

    #[tokio::test]
    async fn test_user_round_trip_with_credentials() {
        let pool = seeded().await;
        let deo = user("deo1", Role::Deo, Some("Tuni AMC"));
        insert_user(&pool, &deo, "hash").await.unwrap();

        let found = get_user_by_username(&pool, "deo1").await.unwrap().unwrap();
        assert_eq!(found.id, deo.id);
        assert_eq!(found.role, Role::Deo);
        assert_eq!(found.committee.as_deref(), Some("Tuni AMC"));
        assert_eq!(
            get_password_hash(&pool, &deo.id).await.unwrap().as_deref(),
            Some("hash")
        );

        let err = insert_user(&pool, &deo, "other").await.unwrap_err();
        assert!(is_unique_violation(&err));
        // The failed insert rolled back; the original hash is untouched.
        assert_eq!(
            get_password_hash(&pool, &deo.id).await.unwrap().as_deref(),
            Some("hash")
        );
    }

    #[tokio::test]
    async fn test_receipt_insert_and_join() {
        let pool = seeded().await;
        insert_receipt(&pool, &receipt("r1", "c1", "2025-06-01")).await.unwrap();

        let r = get_receipt(&pool, "r1").await.unwrap().unwrap();
        assert_eq!(r.committee_name.as_deref(), Some("Tuni Agricultural Market Committee"));
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(r.is_active());

        assert!(get_receipt(&pool, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_check_is_per_committee_and_active_only() {
        let pool = seeded().await;
        let mut r = receipt("r1", "c1", "2025-06-01");
        r.book_number = "B9".into();
        r.receipt_number = "R9".into();
        insert_receipt(&pool, &r).await.unwrap();

        assert!(active_duplicate_exists(&pool, "c1", "B9", "R9", None).await.unwrap());
        assert!(!active_duplicate_exists(&pool, "c2", "B9", "R9", None).await.unwrap());
        assert!(!active_duplicate_exists(&pool, "c1", "B9", "R9", Some("r1")).await.unwrap());

        set_receipt_status(&pool, "r1", ReceiptStatus::Cancelled).await.unwrap();
        assert!(!active_duplicate_exists(&pool, "c1", "B9", "R9", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_guarded_writes_refuse_active_duplicates() {
        let pool = seeded().await;
        let first = receipt("r1", "c1", "2025-06-01");
        let mut second = receipt("r2", "c1", "2025-06-02");
        second.receipt_number = first.receipt_number.clone();

        assert!(insert_receipt_if_unique(&pool, &first).await.unwrap());
        assert!(!insert_receipt_if_unique(&pool, &second).await.unwrap());
        assert!(get_receipt(&pool, "r2").await.unwrap().is_none());

        second.receipt_number = "r2".into();
        assert!(insert_receipt_if_unique(&pool, &second).await.unwrap());

        // Renumbering r2 onto r1 collides; saving r1 unchanged does not.
        let mut renumbered = second.clone();
        renumbered.receipt_number = first.receipt_number.clone();
        assert!(!update_receipt_if_unique(&pool, &renumbered).await.unwrap());
        assert!(update_receipt_if_unique(&pool, &first).await.unwrap());
        assert_eq!(get_receipt(&pool, "r2").await.unwrap().unwrap().receipt_number, "r2");

        // The rejected write rolled back and left the pool usable.
        assert_eq!(list_receipts(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sql_summary_matches_in_memory_summary() {
        let pool = seeded().await;
        let receipts = vec![
            trade("r1", "c1", "2025-06-01", "Ravi", 100.0),
            trade("r2", "c1", "2025-06-30", "Sita", 250.0),
            trade("r3", "c1", "2025-06-15", "Ravi", 50.0),
            trade("r4", "c1", "2025-07-01", "Ravi", 1000.0),
            trade("r5", "c1", "2025-05-31", "Ravi", 1000.0),
            trade("r6", "c2", "2025-06-10", "Gopal", 1000.0),
        ];
        for r in &receipts {
            insert_receipt(&pool, r).await.unwrap();
        }

        let june = MonthWindow::new(2025, 6).unwrap();
        let sql = monthly_summary(&pool, "c1", &june).await.unwrap();
        assert_eq!(sql.total_receipts, 3);
        assert_eq!(sql.active_members, 2);
        assert_eq!(sql.total_value, 400.0);
        assert_eq!(sql.total_fees, 4.0);
        assert_eq!(sql.average_value, 133.33);

        let in_memory = analytics::monthly_summary(&receipts, Some("c1"), &june);
        assert_eq!(sql, in_memory);
    }

    #[tokio::test]
    async fn test_empty_month_summary() {
        let pool = seeded().await;
        let window = MonthWindow::new(2030, 1).unwrap();
        let summary = monthly_summary(&pool, "c1", &window).await.unwrap();
        assert_eq!(summary, MonthlySummary::default());
    }

    #[tokio::test]
    async fn test_top_commodities_orders_by_quantity() {
        let pool = seeded().await;
        for (id, commodity, qty) in [("r1", "Rice", 5.0), ("r2", "Cotton", 9.0), ("r3", "Rice", 6.0), ("r4", "Maize", 1.0)] {
            let mut r = receipt(id, "c1", "2025-06-05");
            r.commodity = commodity.into();
            r.quantity = qty;
            insert_receipt(&pool, &r).await.unwrap();
        }

        let june = MonthWindow::new(2025, 6).unwrap();
        let top = top_commodities(&pool, "c1", &june, 2).await.unwrap();
        assert_eq!(
            top,
            vec![
                CommodityVolume { commodity: "Rice".into(), total_quantity: 11.0 },
                CommodityVolume { commodity: "Cotton".into(), total_quantity: 9.0 },
            ]
        );
    }

    #[tokio::test]
    async fn test_district_metrics_month_and_cumulative() {
        let pool = seeded().await;
        let mut outside = committee("c3", "VSP", "Visakhapatnam Agricultural Market Committee");
        outside.district = Some("Visakhapatnam".into());
        insert_committee(&pool, &outside).await.unwrap();

        for r in [
            trade("r1", "c1", "2025-06-01", "Ravi", 100.0),
            trade("r2", "c2", "2025-06-20", "Sita", 300.0),
            trade("r3", "c1", "2025-05-10", "Ravi", 1000.0),
            trade("r4", "c1", "2025-07-01", "Ravi", 5000.0),
            trade("r5", "c3", "2025-06-02", "Gopal", 7000.0),
        ] {
            insert_receipt(&pool, &r).await.unwrap();
        }

        let june = MonthWindow::new(2025, 6).unwrap();
        let metrics = district_metrics(&pool, "east godavari", &june).await.unwrap();
        assert_eq!(metrics.month.total_receipts_month, 2);
        assert_eq!(metrics.month.active_traders_month, 2);
        assert_eq!(metrics.month.total_value_month, 400.0);
        assert_eq!(metrics.month.total_quantity_month, 40.0);
        assert_eq!(metrics.month.avg_receipt_value, 200.0);
        assert_eq!(metrics.cumulative.total_value_cumulative, 1400.0);
        assert_eq!(metrics.cumulative.quantity_cumulative, 140.0);
    }

    #[tokio::test]
    async fn test_trader_deactivation() {
        let pool = seeded().await;
        let trader = Trader {
            id: "t1".into(),
            name: "Test Trader".into(),
            address: "XYZ".into(),
            joined_date: NaiveDate::from_ymd_opt(2025, 6, 25).unwrap(),
            is_active: true,
        };
        insert_trader(&pool, &trader).await.unwrap();
        assert_eq!(list_active_traders(&pool).await.unwrap().len(), 1);

        assert!(deactivate_trader(&pool, "t1").await.unwrap());
        assert!(list_active_traders(&pool).await.unwrap().is_empty());
        assert!(!deactivate_trader(&pool, "t1").await.unwrap());
    }
}
