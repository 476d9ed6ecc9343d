// src/gps/mod.rs
//! Location fix sources and parsing

pub mod fix;
pub mod gpsd;
pub mod nmea;

pub use fix::LocationFix;
