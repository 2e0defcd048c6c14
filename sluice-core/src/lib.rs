mod as_value;
mod batch;
mod binder;
mod connection;
mod context;
mod convert;
mod executor;
mod parameters;
mod parse;
mod prepared;
mod query;
mod row;
mod row_reader;
mod row_writer;
mod transaction;
mod util;
mod value;

pub use as_value::*;
pub use batch::*;
pub use binder::*;
pub use connection::*;
pub use context::*;
pub use convert::*;
pub use executor::*;
pub use parameters::*;
pub use parse::*;
pub use prepared::*;
pub use query::*;
pub use row::*;
pub use row_reader::*;
pub use row_writer::*;
pub use transaction::*;
pub use util::*;
pub use value::*;

pub use ::anyhow::Context as ErrorContext;
pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
