//! APRS balloon tracking through a KISS-over-TCP TNC.

pub mod aprs;
pub mod ax25;
pub mod config;
pub mod tnc;
pub mod web;
