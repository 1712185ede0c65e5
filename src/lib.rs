//! Trainee attendance tracking: chargeable absence hours, disciplinary
//! status tiers and the disciplinary note out of 20.
//!
//! The scoring engine in [`scoring`] is pure and shared by every surface of
//! the command-line tool; [`db`] and [`report`] feed it and render its output.

pub mod db;
pub mod models;
pub mod report;
pub mod scoring;
