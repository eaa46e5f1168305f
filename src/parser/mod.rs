//! Scan and parse `key;value` records.

pub mod func;

pub mod line;

pub mod models;

pub mod scan;
