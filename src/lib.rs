// Library exports for surveygraph

pub mod codebook;
pub mod config;
pub mod csv_reader;
pub mod data;
pub mod error;
pub mod filter;
pub mod graph;
pub mod logging;
pub mod palette;
pub mod parser;
pub mod runtime;
pub mod summary;

// Aggregation
pub mod histogram;
pub mod resolve;
pub mod scale;
pub mod timeline;
pub mod transform;

// Layout and scene compilation
pub mod compiler;
pub mod ir;
pub mod layout;
pub mod wrap;

pub use error::{PlotError, Result};
