//! On-disk textual formats (§6): the Andersen points-to result, and
//! the two-section SVFG dump. Both are read/write pairs rather than
//! `serde`-derived: the wire shape is a fixed line grammar inherited
//! from the original tool's dump format, not a format this crate is
//! free to reshape, so a hand-rolled parser is the honest fit.

pub mod andersen_format;
pub mod svfg_format;

pub use andersen_format::{read_andersen_result, write_andersen_result};
pub use svfg_format::{read_svfg, write_svfg};
