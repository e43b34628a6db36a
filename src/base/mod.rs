//! Base infrastructure - byte sources, binary readers, errors, paths
//!
//! Everything the PDF and font layers share sits here.

pub mod error;
pub mod geometry;
pub mod hash;
pub mod path;
pub mod reader;
pub mod stream;
