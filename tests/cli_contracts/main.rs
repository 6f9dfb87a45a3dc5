//! Command-line parsing and JSON output contracts

mod output_contracts;
mod parse_matrix;
