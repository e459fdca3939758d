#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

#[macro_use]
mod fmt;

pub mod asynch;
pub(crate) mod commands;
pub mod responses;
pub mod server;
pub mod transaction;
pub mod urc;
pub mod wifi;

#[cfg(feature = "examples")]
pub mod example;

/// Baud rate of ESP-01 modules as shipped
pub const DEFAULT_BAUD_RATE: u32 = 9600;

#[cfg(test)]
mod tests;
