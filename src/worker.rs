//! Running mockups on isolated workers.
//!
//! Each request is one task. Results come back as length-delimited [`Frame`]s (`data`, `end`,
//! `error`) so they can cross a thread or process boundary without sharing raster memory.

/// Frame model, wire codec and the `Write` adapter that turns output bytes into frames.
pub mod frame;
/// Thread pool that runs one isolated task per request.
pub mod pool;
