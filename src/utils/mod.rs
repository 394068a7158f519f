//! Utility functions and types

pub mod data_loader;

pub use data_loader::{examples_from_frame, load_csv, load_examples, LoadSummary};
