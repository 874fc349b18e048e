//! Port traits the engine consumes or produces through.

pub mod config_port;
pub mod data_port;
pub mod report_port;
