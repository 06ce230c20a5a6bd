//! Fixed window bucketing.
//!
//! Windows are aligned to the unix epoch: a `Minute` window always starts on a
//! multiple of 60 seconds, so every process sharing a counter store agrees on the
//! bucket without coordination.

use crate::Unit;

/// Start of the window containing `now`, in unix seconds.
pub fn bucket_start(now: u64, unit: Unit) -> u64 {
    now - now % unit.seconds()
}

/// Seconds from `now` until the window containing `now` ends. Always at least 1.
pub fn time_until_reset(now: u64, unit: Unit) -> u64 {
    let divider = unit.seconds();
    divider - now % divider
}
