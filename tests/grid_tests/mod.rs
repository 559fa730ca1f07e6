//! Integration tests for grid lifecycle
//!
//! Tests are organized by the story they tell:
//!
//! - `create`: Stories about registering a grid and materializing its
//!   clusters, including partial failures and duplicate names
//!
//! - `delete`: Stories about tearing a grid down without touching clusters it
//!   only connected to

mod create;
mod delete;
mod helpers;
