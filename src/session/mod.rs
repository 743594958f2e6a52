//! Session information.
//!
//! The simulator publishes event metadata as YAML-like text next to the telemetry.
//! Two ways to read it:
//!
//! - [`query`] / [`query_str`] address one scalar by path without parsing the
//!   document, and tolerate text a YAML parser would reject
//! - [`SessionDocument`] deserializes the commonly used subset
//!
//! ```rust
//! use irtelemetry::session::{SessionDocument, query_str};
//!
//! let text = "DriverInfo:\n Drivers:\n - CarIdx: 5\n   UserName: Sam Hale\n";
//! assert_eq!(query_str(text, "DriverInfo:Drivers:CarIdx:{5}UserName:"), Some("Sam Hale"));
//!
//! let doc = SessionDocument::parse(text)?;
//! assert_eq!(doc.driver(5).map(|d| d.user_name.as_str()), Some("Sam Hale"));
//! # Ok::<(), irtelemetry::TelemetryError>(())
//! ```

mod info;
mod query;

pub use info::{DriverEntry, DriverInfo, SessionDocument, SessionEntry, SessionList, WeekendInfo};
pub use query::{query, query_str};
