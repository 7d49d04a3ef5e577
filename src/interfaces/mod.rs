//! Outer surfaces of the driver binary: argument parsing and CSV I/O.

pub mod cli;
pub mod csv;
