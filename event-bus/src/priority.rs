//! Priority bands for posted events. Lower is more urgent. `IMPORTANT` is
//! reserved for lifecycle and error events; application traffic normally
//! uses the coarser bands below it.

pub const IMPORTANT: u8 = 0;
pub const HIGHEST: u8 = 51;
pub const HIGH: u8 = 102;
pub const MEDIUM: u8 = 153;
pub const LOW: u8 = 204;
pub const LOWEST: u8 = 255;
