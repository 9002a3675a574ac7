use std::collections::HashSet;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::{Checkpost, Committee, Commodity};
use crate::db::repo;

const DISTRICT: &str = "East Godavari";
const STATE: &str = "Andhra Pradesh";

/// (code, name, checkposts)
const COMMITTEES: &[(&str, &str, &[&str])] = &[
    ("KRP", "Karapa Agricultural Market Committee", &["Penuguduru"]),
    ("KKR", "Kakinada Rural Agricultural Market Committee", &["Atchempeta", "Turangi Bypass"]),
    ("KKD", "Kakinada Agricultural Market Committee", &[]),
    ("PTP", "Pithapuram Agricultural Market Committee", &["Pithapuram", "Chebrolu"]),
    ("TUNI", "Tuni Agricultural Market Committee", &["Tuni", "K/P Puram", "Rekavanipalem"]),
    ("PRT", "Prathipadu Agricultural Market Committee", &["Kathipudi", "Prathipadu", "Yerravaram"]),
    ("JGP", "Jaggampeta Agricultural Market Committee", &["Jaggampeta", "Rajupalem"]),
    ("PDP", "Peddapuram Agricultural Market Committee", &["Peddapuram", "Peddapuram Bypass"]),
    ("RJY", "Rajahmundry Agricultural Market Committee", &["Rajahmundry Main", "Rajahmundry Bypass"]),
    ("AMP", "Amalapuram Agricultural Market Committee", &["Amalapuram", "Amalapuram Junction"]),
    ("RCP", "Ramachandrapuram Agricultural Market Committee", &["Ramachandrapuram", "RCP Junction"]),
    ("MDP", "Mandapeta Agricultural Market Committee", &["Mandapeta", "Mandapeta Bypass"]),
    ("KML", "Korumilli Agricultural Market Committee", &["Korumilli", "Korumilli Junction"]),
    ("SKV", "Sankhavaram Agricultural Market Committee", &["Sankhavaram", "Sankhavaram Bypass"]),
    ("YLM", "Yelamanchili Agricultural Market Committee", &["Yelamanchili", "Yelamanchili Junction"]),
];

const COMMODITIES: &[&str] = &[
    "Bajra", "Cotton", "Gram", "Jowar", "Maize", "Masur", "Moong", "Onion", "Potato", "Rice",
    "Sugarcane", "Tomato", "Tur", "Urad", "Wheat",
];

/// Inserts the district's committees, their checkposts and the commodity
/// list. Rows that already exist are left alone, so this runs on every start.
pub async fn seed_reference_data(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut committees_added = 0;

    for (code, name, checkposts) in COMMITTEES {
        if repo::get_committee_by_code(pool, code).await?.is_some() {
            continue;
        }

        let committee = Committee {
            id: repo::new_id(),
            code: code.to_string(),
            name: name.to_string(),
            district: Some(DISTRICT.to_string()),
            state: Some(STATE.to_string()),
            created_at: Utc::now(),
        };
        repo::insert_committee(pool, &committee).await?;

        for checkpost in *checkposts {
            repo::insert_checkpost(
                pool,
                &Checkpost {
                    id: repo::new_id(),
                    committee_id: committee.id.clone(),
                    name: checkpost.to_string(),
                },
            )
            .await?;
        }
        committees_added += 1;
    }

    let existing: HashSet<String> = repo::list_commodities(pool)
        .await?
        .into_iter()
        .map(|c| c.name.to_lowercase())
        .collect();

    let mut commodities_added = 0;
    for name in COMMODITIES {
        if existing.contains(&name.to_lowercase()) {
            continue;
        }
        repo::insert_commodity(
            pool,
            &Commodity {
                id: repo::new_id(),
                name: name.to_string(),
            },
        )
        .await?;
        commodities_added += 1;
    }

    info!("Reference data seeded: {committees_added} committees, {commodities_added} commodities added");
    Ok(())
}
