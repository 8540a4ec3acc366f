//! Boundary adapters for callers; currently the CSV scripting interface
//! used by the CLI.

pub mod csv;
