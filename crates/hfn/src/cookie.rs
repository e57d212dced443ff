//! The client-side cookie jar.
//!
//! Servers push cookies with SET_COOKIE messages; the client echoes the
//! applicable ones back on every outbound call. A cookie is either scoped
//! to the package that set it (private) or global. The jar persists as
//! JSON through the external [`Storage`](crate::Storage) collaborator.
//!
//! All methods take explicit timestamps so expiry is testable without
//! real clocks.

use serde::{Deserialize, Serialize};

/// Package id marking a globally scoped cookie.
pub const GLOBAL_PACKAGE: i64 = -1;

/// One stored cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieItem {
    /// Owning package id, or [`GLOBAL_PACKAGE`].
    pub package_id: i64,
    /// Cookie name, unique per scope.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Lifetime in seconds; `0` and `-1` mean non-expiring.
    pub max_age: i64,
    /// Creation timestamp in milliseconds.
    pub created_at_ms: u64,
}

impl CookieItem {
    fn expired(&self, now_ms: u64) -> bool {
        if self.max_age <= 0 {
            return false;
        }
        now_ms.saturating_sub(self.created_at_ms)
            > (self.max_age as u64) * 1000
    }
}

/// All cookies currently held by a client.
#[derive(Debug, Default)]
pub struct CookieJar {
    items: Vec<CookieItem>,
}

impl CookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a jar from its persisted JSON form, dropping cookies that
    /// expired while stored. Unparseable input yields an empty jar; stale
    /// persisted state is not worth failing startup over.
    pub fn from_json(json: &str, now_ms: u64) -> Self {
        let items: Vec<CookieItem> = match serde_json::from_str(json) {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!(%error, "discarding unparseable cookie jar");
                Vec::new()
            }
        };
        let mut jar = Self { items };
        jar.prune(now_ms);
        jar
    }

    /// The persisted JSON form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.items).unwrap_or_else(|_| "[]".into())
    }

    /// Stores a cookie, replacing any cookie with the same name in the
    /// same scope. Non-private cookies are stored globally regardless of
    /// the setting package. Expired cookies are pruned on every write.
    pub fn set(
        &mut self,
        package_id: i64,
        name: &str,
        value: &str,
        max_age: i64,
        is_private: bool,
        now_ms: u64,
    ) {
        let package_id = if is_private { package_id } else { GLOBAL_PACKAGE };
        self.items.retain(|item| {
            !(item.package_id == package_id && item.name == name)
                && !item.expired(now_ms)
        });
        self.items.push(CookieItem {
            package_id,
            name: name.to_owned(),
            value: value.to_owned(),
            max_age,
            created_at_ms: now_ms,
        });
    }

    /// The `[name, value]` pairs to send with a call into `package_id`:
    /// cookies scoped to that package or global, and not expired.
    pub fn for_package(
        &self,
        package_id: i64,
        now_ms: u64,
    ) -> Vec<(String, String)> {
        self.items
            .iter()
            .filter(|item| {
                (item.package_id == GLOBAL_PACKAGE
                    || item.package_id == package_id)
                    && !item.expired(now_ms)
            })
            .map(|item| (item.name.clone(), item.value.clone()))
            .collect()
    }

    /// Drops expired cookies.
    pub fn prune(&mut self, now_ms: u64) {
        self.items.retain(|item| !item.expired(now_ms));
    }

    /// Number of cookies held, including not-yet-pruned expired ones.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the jar holds no cookies.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;

    #[test]
    fn test_cookie_expires_after_max_age() {
        let mut jar = CookieJar::new();
        jar.set(1, "token", "abc", 5, true, T0);

        assert_eq!(jar.for_package(1, T0 + 4_000).len(), 1);
        assert!(jar.for_package(1, T0 + 6_000).is_empty());
    }

    #[test]
    fn test_zero_and_negative_max_age_never_expire() {
        let mut jar = CookieJar::new();
        jar.set(1, "forever", "x", 0, true, T0);
        jar.set(1, "also-forever", "y", -1, true, T0);

        let year = 365 * 24 * 3600 * 1000;
        assert_eq!(jar.for_package(1, T0 + year).len(), 2);
    }

    #[test]
    fn test_public_cookie_is_global() {
        let mut jar = CookieJar::new();
        jar.set(1, "session", "s", 0, false, T0);
        jar.set(1, "private", "p", 0, true, T0);

        // Package 2 sees only the global cookie.
        let pairs = jar.for_package(2, T0);
        assert_eq!(pairs, vec![("session".into(), "s".into())]);

        // Package 1 sees both.
        assert_eq!(jar.for_package(1, T0).len(), 2);
    }

    #[test]
    fn test_set_replaces_same_name_in_same_scope() {
        let mut jar = CookieJar::new();
        jar.set(1, "token", "old", 0, true, T0);
        jar.set(1, "token", "new", 0, true, T0 + 1000);

        let pairs = jar.for_package(1, T0 + 1000);
        assert_eq!(pairs, vec![("token".into(), "new".into())]);

        // Same name in a different scope is a different cookie.
        jar.set(2, "token", "other", 0, true, T0);
        assert_eq!(jar.len(), 2);
    }

    #[test]
    fn test_json_round_trip_prunes_expired() {
        let mut jar = CookieJar::new();
        jar.set(1, "keep", "k", 0, true, T0);
        jar.set(1, "drop", "d", 5, true, T0);
        let json = jar.to_json();

        let restored = CookieJar::from_json(&json, T0 + 10_000);
        assert_eq!(restored.len(), 1);
        assert_eq!(
            restored.for_package(1, T0 + 10_000),
            vec![("keep".into(), "k".into())]
        );
    }

    #[test]
    fn test_garbage_json_yields_empty_jar() {
        let jar = CookieJar::from_json("not json", T0);
        assert!(jar.is_empty());
    }
}
