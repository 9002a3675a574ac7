use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Text-backed enums stored as TEXT columns and sent as plain JSON strings.
/// Parsing ignores case so form input like "deo" or "OFFICE" is accepted.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

text_enum!(
    /// Who a user is determines what they may see: JD is district-wide,
    /// everyone else is pinned to one committee.
    Role, "role" {
        Deo => "DEO",
        Supervisor => "Supervisor",
        Jd => "JD",
    }
);

text_enum!(Unit, "unit" {
    Quintals => "Quintals",
    Number => "Number",
    Bags => "Bags",
});

text_enum!(
    /// Category tag on a receipt.
    NatureOfReceipt, "nature of receipt" {
        MarketFee => "mf",
        LicenceFee => "lf",
        UserCharge => "uc",
        Others => "others",
    }
);

text_enum!(CollectionLocation, "collection location" {
    Office => "office",
    Checkpost => "checkpost",
});

text_enum!(ReceiptStatus, "receipt status" {
    Active => "Active",
    Cancelled => "Cancelled",
});

impl Role {
    pub fn is_district_wide(&self) -> bool {
        matches!(self, Role::Jd)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// Committee name or code as assigned by an administrator. Resolved to
    /// a committee id at request time.
    pub committee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Committee {
    pub id: String,
    pub code: String,
    pub name: String,
    pub district: Option<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Checkpost {
    pub id: String,
    pub committee_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Trader {
    pub id: String,
    pub name: String,
    pub address: String,
    pub joined_date: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Commodity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Receipt {
    pub id: String,
    pub committee_id: String,
    /// Filled from the committees join; absent when the committee row is gone.
    pub committee_name: Option<String>,
    pub date: NaiveDate,
    pub book_number: String,
    pub receipt_number: String,
    pub trader_name: String,
    pub trader_address: String,
    pub payee_name: String,
    pub payee_address: String,
    pub commodity: String,
    pub quantity: f64,
    #[sqlx(try_from = "String")]
    pub unit: Unit,
    pub value: f64,
    pub fees_paid: f64,
    #[sqlx(try_from = "String")]
    pub nature_of_receipt: NatureOfReceipt,
    pub vehicle_number: Option<String>,
    pub invoice_number: Option<String>,
    #[sqlx(try_from = "String")]
    pub collection_location: CollectionLocation,
    pub collected_by: Option<String>,
    pub checkpost_location: Option<String>,
    pub generated_by: String,
    pub designation: String,
    pub created_by: String,
    #[sqlx(try_from = "String")]
    pub status: ReceiptStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Receipt {
    pub fn is_active(&self) -> bool {
        self.status == ReceiptStatus::Active
    }

    pub fn committee_display_name(&self) -> &str {
        self.committee_name.as_deref().unwrap_or("Unknown Committee")
    }
}

/// Counts and sums for one committee over one month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub total_receipts: i64,
    pub active_members: i64,
    pub total_value: f64,
    pub total_fees: f64,
    pub average_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommodityVolume {
    pub commodity: String,
    pub total_quantity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DistrictMonth {
    pub total_receipts_month: i64,
    pub active_traders_month: i64,
    pub total_value_month: f64,
    pub total_quantity_month: f64,
    pub avg_receipt_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DistrictCumulative {
    pub total_value_cumulative: f64,
    pub quantity_cumulative: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistrictMetrics {
    pub district: String,
    #[serde(flatten)]
    pub month: DistrictMonth,
    #[serde(flatten)]
    pub cumulative: DistrictCumulative,
}
