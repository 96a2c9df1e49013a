//! Unlock policy evaluation and the coarse proximity metric
//!
//! The gate order is fixed: completeness, authorization, secret, time, geo.
//! The first failing gate aborts the unlock with no state change, so a caller
//! never learns about a later gate before passing the earlier ones.

use crate::capsule::Capsule;
use crate::error::{VaultError, VaultResult};
use crate::types::GeoTarget;

/// Divisor turning summed microdegree deltas into approximate meters.
///
/// 1 microdegree of latitude is roughly 0.11 m, so 9 microdegrees ≈ 1 m.
pub const GEO_DIVISOR: u64 = 9;

/// Coarse proximity distance in meters: sum of absolute coordinate deltas,
/// scaled by [`GEO_DIVISOR`].
///
/// This is deliberately not a geodesic formula. It is a sanity re-check of
/// the oracle's already-verified location proof, so the cheap metric is kept
/// byte-for-byte as the source system defined it.
pub fn coarse_distance_m(lat_a: i64, long_a: i64, lat_b: i64, long_b: i64) -> u64 {
    (lat_a.abs_diff(lat_b) + long_a.abs_diff(long_b)) / GEO_DIVISOR
}

/// Whether a reported coordinate falls within the target radius (inclusive)
pub fn within_radius(target: &GeoTarget, lat_micro: i64, long_micro: i64) -> bool {
    coarse_distance_m(target.lat_micro, target.long_micro, lat_micro, long_micro)
        <= target.radius_m
}

/// Evaluate the full unlock policy for `requester` at time `now`.
///
/// Gates run strictly in order; the first failure wins:
/// 1. upload complete (`Incomplete`)
/// 2. requester authorized (`NotAuthorized`)
/// 3. secret byte-equal (`WrongSecret`)
/// 4. time gate, when configured (`TimeLocked`)
/// 5. geo gate, when configured (`GeoUnverified`)
pub(crate) fn evaluate_unlock(
    capsule: &Capsule,
    requester: &str,
    provided_secret: &[u8],
    now: i64,
) -> VaultResult<()> {
    if !capsule.is_complete() {
        return Err(VaultError::Incomplete(capsule.id()));
    }
    if !capsule.has_access(requester) {
        return Err(VaultError::NotAuthorized {
            requester: requester.to_string(),
            capsule: capsule.id(),
        });
    }
    if provided_secret != capsule.secret() {
        return Err(VaultError::WrongSecret);
    }
    if capsule.unlock_time() > 0 && now < capsule.unlock_time() {
        return Err(VaultError::TimeLocked {
            capsule: capsule.id(),
            unlock_time: capsule.unlock_time(),
        });
    }
    if capsule.geo().is_enabled() && !capsule.is_geo_verified() {
        return Err(VaultError::GeoUnverified(capsule.id()));
    }
    Ok(())
}
