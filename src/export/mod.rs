//! Export functionality: saving binary parts to disk.

pub mod attachment;
