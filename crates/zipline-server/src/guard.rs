use crate::error::ServiceResult;
use tracing::{debug, warn};
use zipline_core::{KvCache, Scope};

/// Checks a decoded ID against the scope's published max-ID guard.
///
/// The guard value is written by the periodic publisher; between the first
/// startup and the first publication the key is absent and the check admits
/// everything. A present guard rejects any ID above it, which stops
/// enumeration probes before they reach the database.
///
/// Returns `Ok(true)` when the ID is admissible.
pub async fn admits_id<K: KvCache>(kv: &K, scope: Scope, id: i64) -> ServiceResult<bool> {
    let key = scope.max_id_key();
    let Some(raw) = kv.get(key).await? else {
        debug!(key = %key, "max-ID guard not yet published, admitting");
        return Ok(true);
    };

    let max_id: i64 = match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            // A corrupt guard value must not lock out every resolve.
            warn!(key = %key, value = %raw, error = %e, "max-ID guard is not a number, admitting");
            return Ok(true);
        }
    };

    Ok(id <= max_id)
}
