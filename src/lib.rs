#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod buffer;
pub mod command;
pub mod config;
pub mod connection;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod ftp;
pub mod gps;
pub mod http;
mod modem;
mod module_timing;
pub mod pwr;
pub mod sms;
pub mod socket;

#[cfg(test)]
mod test_helpers;

pub use config::{Apn, Config, NoPin, Timing};
pub use dispatcher::Dispatcher;
pub use error::{Error, ErrorCode};
pub use modem::Modem;
