//! TSRG2 mapping parsing and the in-memory symbol table.
//!
//! The table is built in a single pass over the mapping text and owns both
//! naming directions; everything downstream treats it as read-only.

mod error;
mod table;
mod tsrg;

pub use crate::error::MappingError;
pub use crate::table::{ClassMapping, FieldMapping, MemberKey, MethodMapping, SymbolTable};
pub use crate::tsrg::parse_tsrg2;
