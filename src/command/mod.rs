//! AT commands for Telit LE910 modules
//!
//! Following the *LE910 Cat.1/V2 AT Commands Reference Guide*. Every command
//! is terminated by a single carriage return, and the `timeout_ms` of each
//! definition is the time the module is given to produce its final result
//! code.
pub mod ftp;
pub mod general;
pub mod gps;
pub mod http;
pub mod network;
pub mod sms;
pub mod socket;
pub mod ssl;

use atat::atat_derive::{AtatCmd, AtatResp};
use embassy_time::Duration;

#[derive(Clone, AtatResp)]
pub struct NoResponse;

/// Attention
///
/// Used as a liveness check during the power on handshake.
#[derive(Clone, AtatCmd)]
#[at_cmd("", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct AT;

/// Time the module is given to answer `cmd`.
pub fn timeout_of<C: atat::AtatCmd>(_cmd: &C) -> Duration {
    Duration::from_millis(C::MAX_TIMEOUT_MS as u64)
}
