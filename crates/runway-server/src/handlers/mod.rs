//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod balances;
pub mod entries;
pub mod invoices;
pub mod months;
pub mod reference;
pub mod rules;

// Re-export all handlers for use in router
pub use balances::*;
pub use entries::*;
pub use invoices::*;
pub use months::*;
pub use reference::*;
pub use rules::*;

use chrono::NaiveDate;

use crate::AppError;

/// Parse a comma-separated id list (`"1,2,3"`); absent or empty means none
pub(crate) fn parse_ids(raw: Option<&str>) -> Result<Vec<i64>, AppError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::bad_request(&format!("Invalid id: {}", s)))
        })
        .collect()
}

/// Today in server local time
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
