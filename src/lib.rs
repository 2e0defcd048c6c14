//! Named-parameter SQL over a synchronous database driver.
//!
//! ```rust,ignore
//! use sluice::{Deconstruct, FromRow, NamedParam, Query, RowWriter};
//!
//! #[derive(Deconstruct, FromRow)]
//! struct Account {
//!     id: i64,
//!     display_name: String,
//! }
//!
//! let writer = RowWriter::<Account>::derived()?;
//! Query::new("INSERT INTO account(id, display_name) VALUES(:id, :display_name)")
//!     .using(&writer, &account)
//!     .execute(&mut connection)?;
//! let accounts = Query::new("SELECT * FROM account WHERE id IN(:ids)")
//!     .on(NamedParam::values("ids", [1, 2, 3])?)
//!     .query_as(&mut connection, &Account::row_reader().list())?;
//! ```
pub use sluice_core::*;
pub use sluice_macros::*;
