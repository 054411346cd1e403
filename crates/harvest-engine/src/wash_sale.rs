//! Wash Sale Rule
//!
//! Computes the window around a harvesting sale and the first date the
//! original security can be bought back.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Wash-sale timing policy.
///
/// The IRS window is 30 days on either side of the sale. Recommended rebuy
/// dates add a one-day safety margin on top of that, so a rebuy lands on day
/// 31 rather than on the last day of the window. The margin is our policy, not
/// an IRS number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WashSalePolicy {
    /// Days before and after the sale covered by the rule
    pub window_days: i64,
    /// Extra days added past the window end
    pub safety_margin_days: i64,
}

impl Default for WashSalePolicy {
    fn default() -> Self {
        Self {
            window_days: 30,
            safety_margin_days: 1,
        }
    }
}

impl WashSalePolicy {
    /// Earliest recommended repurchase date for a sale made on `sale_date`
    pub fn rebuy_date(&self, sale_date: NaiveDate) -> NaiveDate {
        sale_date + Duration::days(self.window_days + self.safety_margin_days)
    }

    /// Window created by a sale of `symbol` on `sale_date`
    pub fn window(&self, symbol: &str, sale_date: NaiveDate) -> WashSaleWindow {
        WashSaleWindow {
            symbol: symbol.to_string(),
            sale_date,
            window_start: sale_date - Duration::days(self.window_days),
            window_end: sale_date + Duration::days(self.window_days),
        }
    }
}

/// A wash sale window period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WashSaleWindow {
    pub symbol: String,
    pub sale_date: NaiveDate,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

impl WashSaleWindow {
    /// Check if a date is within this window
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.window_start && date <= self.window_end
    }
}
