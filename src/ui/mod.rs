//! Live terminal renderer: a bar chart of mean sentiment per category
//!
//! Strictly downstream of the snapshot contract; reads the watch cell and
//! never touches live aggregation state.

pub mod layout;
pub mod terminal;

pub use terminal::run_ui;
