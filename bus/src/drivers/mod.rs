//! Drivers shipped with the bus core.

pub mod echo;
