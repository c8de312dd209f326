//! lifelog-domain
//!
//! Pure domain models (Category, Transaction, Goal, ledger summaries).
//! No I/O, no storage. Only data types, core enums, and their transitions.

pub mod category;
pub mod common;
pub mod goal;
pub mod summary;
pub mod transaction;

pub use category::*;
pub use common::*;
pub use goal::*;
pub use summary::*;
pub use transaction::*;
