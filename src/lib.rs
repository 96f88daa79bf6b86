//! bbtest -- firewall-aware point-to-point throughput tests driven by bbcp.
//!
//! This crate negotiates which port range and connection direction bbcp can
//! use between two firewalled hosts, runs the transfer, and turns bbcp's
//! progress output into a time series of transfer rates.

pub mod config;
pub mod negotiate;
pub mod throughput;
