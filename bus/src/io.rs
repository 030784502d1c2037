//! Byte-stream access to a bound device, as consumed by userspace-style exercisers.
//!
//! The core does not interpret the bytes; their meaning belongs to the driver.
use crate::driver::DriverError;

/// Size of the buffer an exerciser writes in one go.
pub const TX_BUF_SIZE: usize = 8;

/// Size of the buffer an exerciser reads in one go.
pub const RX_BUF_SIZE: usize = 64;

pub trait SlaveIo: Send + Sync {
    /// Read up to `buf.len()` bytes; return how many were read.
    fn read(&self, buf: &mut [u8]) -> Result<usize, DriverError>;
    /// Write up to `buf.len()` bytes; return how many were accepted.
    fn write(&self, buf: &[u8]) -> Result<usize, DriverError>;
}
