//! Terminal front-end for the reconcile engine
//!
//! The library plans and executes; this module:
//! 1. Displaying - plan rendering with per-item attribute diffs
//! 2. Executing - progress bars, confirmation, summaries and dry runs

pub mod differ;
pub mod executor;

pub use differ::display_plan;
pub use executor::{BarProgress, confirm_proceed, print_summary, simulate};
