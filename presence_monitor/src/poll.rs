//! Drain the radar's receive buffer once per cycle.
//!
//! Engineering frames are large and frequent; decoding only one per cycle lets the
//! driver's buffer fall behind. Polling continues until nothing is pending, capped so a
//! flooding link cannot starve the rest of the cycle.

use tracing::debug;

use crate::link::SensorLink;

/// Returns the number of frames decoded.
pub fn drain<L: SensorLink>(link: &mut L, max_polls: u32) -> u32 {
    let mut decoded = 0;
    for _ in 0..max_polls {
        match link.poll() {
            Ok(true) => decoded += 1,
            Ok(false) => break,
            Err(e) => {
                debug!("Radar poll failed: {e}");
                break;
            }
        }
    }
    decoded
}
