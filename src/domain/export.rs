use crate::db::models::Receipt;
use crate::error::{AppError, AppResult};

pub const EXPORT_FILENAME: &str = "amc_receipts.csv";

const HEADER: [&str; 11] = [
    "Date",
    "Book Number",
    "Receipt Number",
    "Trader Name",
    "Payee Name",
    "Committee",
    "Commodity",
    "Quantity",
    "Unit",
    "Value",
    "Fees Paid",
];

/// One CSV row per receipt, in the order given.
pub fn receipts_to_csv(receipts: &[Receipt]) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for r in receipts {
        writer.write_record([
            r.date.format("%Y-%m-%d").to_string(),
            r.book_number.clone(),
            r.receipt_number.clone(),
            r.trader_name.clone(),
            r.payee_name.clone(),
            r.committee_display_name().to_string(),
            r.commodity.clone(),
            r.quantity.to_string(),
            r.unit.to_string(),
            r.value.to_string(),
            r.fees_paid.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV export failed: {}", e.error())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_fixtures::receipt;

    #[test]
    fn test_row_count_matches_receipts() {
        let receipts = vec![
            receipt("r1", "c1", "2025-06-01"),
            receipt("r2", "c1", "2025-06-02"),
            receipt("r3", "c1", "2025-06-03"),
        ];

        let bytes = receipts_to_csv(&receipts).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        assert_eq!(reader.headers().unwrap().len(), HEADER.len());
        assert_eq!(reader.records().count(), receipts.len());
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let mut r = receipt("r1", "c1", "2025-06-01");
        r.trader_name = "Rao, Sons & Co".into();
        r.committee_name = Some("Tuni Agricultural Market Committee".into());

        let text = String::from_utf8(receipts_to_csv(&[r]).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Date,Book Number,Receipt Number,Trader Name,Payee Name,Committee,Commodity,Quantity,Unit,Value,Fees Paid")
        );
        assert_eq!(
            lines.next(),
            Some("2025-06-01,B1,r1,\"Rao, Sons & Co\",Payee,Tuni Agricultural Market Committee,Rice,1,Quintals,100,1")
        );
    }

    #[test]
    fn test_empty_export_is_header_only() {
        let text = String::from_utf8(receipts_to_csv(&[]).unwrap()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
