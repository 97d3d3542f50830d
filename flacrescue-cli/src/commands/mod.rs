pub mod diagnose;
pub mod report;
