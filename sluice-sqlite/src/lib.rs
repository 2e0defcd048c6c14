//! SQLite driver for Sluice, built on the bundled `libsqlite3-sys`.
//!
//! ```rust,ignore
//! use sluice_sqlite::SqliteConnection;
//!
//! let mut connection = SqliteConnection::connect("sqlite://data.sqlite?mode=rwc")?;
//! ```
mod cbox;
mod connection;
mod extract;
mod prepared;

use libsqlite3_sys::{sqlite3, sqlite3_errmsg};
use sluice_core::Error;
use std::{
    ffi::{CStr, c_char},
    ptr,
};

pub(crate) use cbox::*;
pub use connection::*;
pub use prepared::*;

pub(crate) fn error_message_from_ptr(ptr: &'_ *const c_char) -> &'_ str {
    unsafe {
        if *ptr != ptr::null() {
            CStr::from_ptr(*ptr)
                .to_str()
                .unwrap_or("Unknown error (the error message was not a valid C string)")
        } else {
            "Unknown error (could not extract the error message)"
        }
    }
}

/// Most recent error reported on `connection`.
pub(crate) fn last_error(connection: *mut sqlite3) -> Error {
    unsafe { Error::msg(error_message_from_ptr(&sqlite3_errmsg(connection)).to_string()) }
}
