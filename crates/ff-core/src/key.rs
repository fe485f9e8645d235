//! Component keys and the per-document key registry.
//!
//! Keys are interned once (cheap `Copy` handles, O(1) equality), but
//! *uniqueness* is the registry's job: every `FormDocument` owns its own
//! `KeyRegistry`, so two documents in the same process never see each
//! other's keys.

use crate::locate::walk;
use crate::model::Component;
use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for component keys. Storage only, never a
/// source of truth for which keys are taken.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Slug used when a label has no `[a-z0-9]` characters at all.
const FALLBACK_SLUG: &str = "component";

/// An interned component key (the Form.io `key` field).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentKey(Spur);

impl ComponentKey {
    /// Intern a string as a key, or return the existing handle.
    pub fn intern(s: &str) -> Self {
        ComponentKey(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.as_str().starts_with(prefix)
    }
}

// Ordered by string so `BTreeMap<ComponentKey, _>` iterates deterministically.
impl Ord for ComponentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for ComponentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.as_str())
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ComponentKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ComponentKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ComponentKey::intern(&s))
    }
}

/// Lowercase a label and keep only `[a-z0-9]`.
///
/// `"Group A"` → `"groupa"`, `"E-mail (work)"` → `"emailwork"`.
pub fn slugify(label: &str) -> String {
    label
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Session-scoped uniqueness authority for component keys.
///
/// Keys are checked only at allocation time: the registry never scans the
/// tree, so anything sourced from outside (imports, pasted JSON) must go
/// through [`KeyRegistry::register`] or [`KeyRegistry::register_tree`]
/// before further allocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyRegistry {
    used: HashSet<ComponentKey>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn is_reserved(&self, key: ComponentKey) -> bool {
        self.used.contains(&key)
    }

    /// Reserve `key`. Returns `false` if it was already taken.
    pub fn register(&mut self, key: ComponentKey) -> bool {
        self.used.insert(key)
    }

    /// Give `key` back. Returns `false` if it was not reserved.
    pub fn release(&mut self, key: ComponentKey) -> bool {
        self.used.remove(&key)
    }

    /// Reserve every key in the tree, pre-order. Returns the keys that were
    /// already taken (duplicates inside the tree or against earlier
    /// allocations), in the order they were met.
    pub fn register_tree(&mut self, components: &[Component]) -> Vec<ComponentKey> {
        let mut taken = Vec::new();
        walk(components, &mut |_, component| {
            if !self.used.insert(component.key) {
                taken.push(component.key);
            }
        });
        taken
    }

    /// Slugify `label` and append a numeric suffix until the key is free.
    ///
    /// The bare slug is tried first, then `slug1`, `slug2`, …
    pub fn generate_unique_key(&mut self, label: &str) -> ComponentKey {
        let slug = slugify(label);
        let base = if slug.is_empty() {
            FALLBACK_SLUG
        } else {
            slug.as_str()
        };
        self.generate_prefixed_key(base)
    }

    /// Like [`generate_unique_key`](Self::generate_unique_key) but keeps
    /// `prefix` verbatim (no slugging), so case-sensitive prefixes such as
    /// `answerKey` survive.
    pub fn generate_prefixed_key(&mut self, prefix: &str) -> ComponentKey {
        let bare = ComponentKey::intern(prefix);
        if self.used.insert(bare) {
            return bare;
        }
        let mut n: u32 = 1;
        loop {
            let candidate = ComponentKey::intern(&format!("{prefix}{n}"));
            if self.used.insert(candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Try `base + preferred_suffix` verbatim; fall back to
    /// `generate_unique_key(base)`.
    pub fn ensure_globally_unique_key(
        &mut self,
        base: &str,
        preferred_suffix: &str,
    ) -> ComponentKey {
        let preferred = format!("{base}{preferred_suffix}");
        if !preferred.is_empty() {
            let key = ComponentKey::intern(&preferred);
            if self.used.insert(key) {
                return key;
            }
        }
        self.generate_unique_key(base)
    }

    /// Release `old` and allocate a fresh key from `new_label`.
    pub fn update_unique_key(&mut self, old: ComponentKey, new_label: &str) -> ComponentKey {
        self.release(old);
        self.generate_unique_key(new_label)
    }

    /// Every reserved key, sorted.
    pub fn keys(&self) -> Vec<ComponentKey> {
        let mut keys: Vec<_> = self.used.iter().copied().collect();
        keys.sort();
        keys
    }
}
