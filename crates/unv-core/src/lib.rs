//! unv-core: decoder and object model for BusinessObjects universe (.unv)
//! metadata files
//!
//! The format is proprietary and undocumented; every byte layout here was
//! inferred by reverse engineering. The crate is organized as:
//! - marker catalog and offset resolution (`offsets`)
//! - primitive cursor reads: integers, strings, dates (`binfmt`)
//! - section readers and the assembler (`reader`)
//! - the inert decoded model (`model`) and its JSON view (`json`)
//!
//! Sections whose layout is well understood are decoded structurally;
//! optional trailer sections are captured as opaque byte spans and never
//! block a decode of the core model.
pub mod binfmt;
pub mod error;
pub mod files;
pub mod json;
pub mod model;
pub mod offsets;
pub mod reader;

pub use error::DecodeError;
pub use model::Universe;
pub use reader::{DecodeOptions, decode, decode_file, decode_with};
