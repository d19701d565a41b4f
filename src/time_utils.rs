// SPDX-License-Identifier: MIT

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The server's notion of "today" for usage rollover: the UTC calendar
/// date. Clients never supply this; an untrusted clock must not decide
/// when counters reset.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Current timestamp formatted for document fields.
pub fn now_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}
