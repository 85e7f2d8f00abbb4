use rand::Rng;

/// Draws a jittered TTL uniformly from `[0.8·ttl, 1.2·ttl]`, in whole
/// seconds.
///
/// De-synchronising expirations keeps a burst of same-moment fills from
/// expiring in the same moment again. A TTL of zero (no expiry) passes
/// through unchanged.
pub fn jitter(ttl_secs: u64) -> u64 {
    if ttl_secs == 0 {
        return 0;
    }
    let base = ttl_secs * 80 / 100;
    let spread = ttl_secs * 40 / 100;
    // Tiny TTLs must stay finite: 0 means "no expiry" to every cache tier.
    (base + rand::thread_rng().gen_range(0..=spread)).max(1)
}
