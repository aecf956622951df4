//! Core library for the transit-report command line application.
//!
//! The pipeline is a single linear pass: the [`rpc`] session logs in, scopes
//! itself to one company and fetches the goods-in-transit report, [`flatten`]
//! turns the nested records into rows, and the adapters under [`io`] write
//! them to a local workbook and a Google Sheets worksheet. [`sync`] ties the
//! steps together.

pub mod config;
pub mod error;
pub mod flatten;
pub mod io;
pub mod logging;
pub mod retry;
pub mod rpc;
pub mod sync;

pub use error::{ReportError, Result};
