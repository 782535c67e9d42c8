//! Page weight and carbon audit for lists of websites.
//!
//! Each configured page is loaded in headless Chrome, its transferred bytes
//! are split by resource type, archived snapshots are corrected for the
//! archive's own overhead and the total is priced in grams of CO2e.

pub mod app;
