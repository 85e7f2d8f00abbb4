use serde::{Deserialize, Serialize};

/// Which namespace a mapping lives in.
///
/// Public and private mappings are stored in separate tables and cached
/// under separate key prefixes, so the same short key may exist in both
/// scopes and denote different records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Public,
    Private,
}

impl Scope {
    /// Derives the scope of a request.
    ///
    /// A non-zero user ID always forces the private scope; otherwise the
    /// caller-supplied `is_public` flag decides.
    pub fn derive(user_id: i64, is_public: bool) -> Self {
        if user_id != 0 || !is_public {
            Scope::Private
        } else {
            Scope::Public
        }
    }

    /// Cache-key prefix for short keys in this scope.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Scope::Public => "",
            Scope::Private => "user_",
        }
    }

    /// Backing table for this scope.
    pub fn table(self) -> &'static str {
        match self {
            Scope::Public => "url_map",
            Scope::Private => "url_map_user",
        }
    }

    /// KV key of this scope's bloom filter.
    pub fn bloom_key(self) -> &'static str {
        match self {
            Scope::Public => "shorturl:bloom",
            Scope::Private => "shorturl:user:bloom",
        }
    }

    /// KV key of this scope's max-ID guard value.
    pub fn max_id_key(self) -> &'static str {
        match self {
            Scope::Public => "url_map_max_id",
            Scope::Private => "url_map_user_max_id",
        }
    }

    /// Full cache key for a short key in this scope.
    pub fn cache_key(self, short_key: &str) -> String {
        format!("{}{}", self.key_prefix(), short_key)
    }
}

/// A stored short-URL mapping.
///
/// `short_key` is the Base62 encoding of `id` once the record is finalised;
/// the generator first allocates a bare row (empty `short_key`) to obtain the
/// ID and then writes the key and the original URL back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlMapping {
    pub id: i64,
    /// 0 means the mapping belongs to the public scope.
    pub user_id: i64,
    pub short_key: String,
    pub original_url: String,
    /// Access counter, incremented on every successful resolution.
    pub times: i64,
    /// Unix seconds.
    pub create_at: i64,
    /// Unix seconds.
    pub update_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_user_id_forces_private() {
        assert_eq!(Scope::derive(7, true), Scope::Private);
        assert_eq!(Scope::derive(7, false), Scope::Private);
    }

    #[test]
    fn zero_user_id_follows_is_public() {
        assert_eq!(Scope::derive(0, true), Scope::Public);
        assert_eq!(Scope::derive(0, false), Scope::Private);
    }

    #[test]
    fn cache_keys_are_disjoint_across_scopes() {
        assert_eq!(Scope::Public.cache_key("a1B"), "a1B");
        assert_eq!(Scope::Private.cache_key("a1B"), "user_a1B");
    }

    #[test]
    fn scope_tables_and_guard_keys() {
        assert_eq!(Scope::Public.table(), "url_map");
        assert_eq!(Scope::Private.table(), "url_map_user");
        assert_eq!(Scope::Public.max_id_key(), "url_map_max_id");
        assert_eq!(Scope::Private.max_id_key(), "url_map_user_max_id");
    }
}
