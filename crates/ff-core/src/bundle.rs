//! Actions bundles: an owner component, a driver radio, and the followers
//! whose visibility the driver controls.
//!
//! The relation lives in [`BundleTable`], not on the components. It is
//! written to the wire as two markers (`_actionsDriverKey` on the owner,
//! `_actionsDriver` on the driver) and rebuilt from them on import.

use crate::document::FormDocument;
use crate::error::FormError;
use crate::factory::create_component_with_key;
use crate::key::ComponentKey;
use crate::locate;
use crate::model::{Component, ComponentType, Conditional};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};

/// Owner → driver marker on the wire.
pub const DRIVER_KEY_FIELD: &str = "_actionsDriverKey";
/// Driver marker on the wire.
pub const DRIVER_FLAG: &str = "_actionsDriver";

/// Labels and key prefix used when creating bundles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionsConfig {
    pub driver_label: String,
    pub follower_label: String,
    /// Driver keys are `{key_prefix}1`, `{key_prefix}2`, … in document order.
    pub key_prefix: String,
    /// Driver option labels. The first one reveals the default follower.
    pub options: Vec<String>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            driver_label: "Actions".into(),
            follower_label: "Comment".into(),
            key_prefix: "actions".into(),
            options: vec!["Comment".into(), "Action".into()],
        }
    }
}

/// Driver plus followers of one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub driver: ComponentKey,
    pub followers: SmallVec<[ComponentKey; 2]>,
}

/// Owner → bundle relation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleTable {
    by_owner: BTreeMap<ComponentKey, Bundle>,
}

impl BundleTable {
    pub fn len(&self) -> usize {
        self.by_owner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }

    pub fn get(&self, owner: ComponentKey) -> Option<&Bundle> {
        self.by_owner.get(&owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentKey, &Bundle)> {
        self.by_owner.iter().map(|(k, b)| (*k, b))
    }

    pub fn owner_of_driver(&self, driver: ComponentKey) -> Option<ComponentKey> {
        self.by_owner
            .iter()
            .find(|(_, b)| b.driver == driver)
            .map(|(owner, _)| *owner)
    }

    /// Owner of a driver or follower.
    pub fn owner_of_member(&self, key: ComponentKey) -> Option<ComponentKey> {
        self.by_owner
            .iter()
            .find(|(_, b)| b.driver == key || b.followers.contains(&key))
            .map(|(owner, _)| *owner)
    }

    pub fn is_member(&self, key: ComponentKey) -> bool {
        self.owner_of_member(key).is_some()
    }

    /// Driver then followers of `owner`; empty when it has no bundle.
    pub fn members(&self, owner: ComponentKey) -> Vec<ComponentKey> {
        match self.by_owner.get(&owner) {
            Some(b) => std::iter::once(b.driver)
                .chain(b.followers.iter().copied())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn insert(&mut self, owner: ComponentKey, bundle: Bundle) {
        self.by_owner.insert(owner, bundle);
    }

    pub fn remove(&mut self, owner: ComponentKey) -> Option<Bundle> {
        self.by_owner.remove(&owner)
    }

    pub fn remove_follower(&mut self, follower: ComponentKey) -> bool {
        for bundle in self.by_owner.values_mut() {
            if let Some(pos) = bundle.followers.iter().position(|f| *f == follower) {
                bundle.followers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Follow a key rename in every role.
    pub fn rename(&mut self, old: ComponentKey, new: ComponentKey) {
        if let Some(bundle) = self.by_owner.remove(&old) {
            self.by_owner.insert(new, bundle);
        }
        for bundle in self.by_owner.values_mut() {
            if bundle.driver == old {
                bundle.driver = new;
            }
            for f in bundle.followers.iter_mut() {
                if *f == old {
                    *f = new;
                }
            }
        }
    }

    /// Drop owners or drivers that are no longer in the tree and followers
    /// that are gone.
    pub fn retain_live(&mut self, live: &dyn Fn(ComponentKey) -> bool) {
        self.by_owner
            .retain(|owner, bundle| live(*owner) && live(bundle.driver));
        for bundle in self.by_owner.values_mut() {
            bundle.followers.retain(|f| live(*f));
        }
    }
}

impl FormDocument {
    /// Attach (`enable`) or detach the Actions bundle of `owner`.
    ///
    /// Enabling inserts a driver radio and one follower text area right
    /// after the owner, in the owner's list. Returns whether anything
    /// changed.
    pub fn toggle_actions(&mut self, owner: ComponentKey, enable: bool) -> Result<bool, FormError> {
        let slot = self.slot_of(owner).ok_or_else(|| FormError::not_found(owner))?;
        if self.bundles.is_member(owner) {
            return Err(FormError::Invalid(format!(
                "`{owner}` is part of another component's actions"
            )));
        }

        if !enable {
            let Some(bundle) = self.bundles.remove(owner) else {
                return Ok(false);
            };
            self.detach(bundle.driver);
            for follower in &bundle.followers {
                self.detach(*follower);
            }
            log::debug!("bundle: removed actions of `{owner}`");
            self.compact_bundles();
            return Ok(true);
        }
        if self.bundles.get(owner).is_some() {
            return Ok(false);
        }

        let next = (self.bundles.len() + 1).to_string();
        let driver_key = self
            .registry
            .ensure_globally_unique_key(&self.actions.key_prefix, &next);
        let driver = create_component_with_key(
            ComponentType::Radio,
            driver_key,
            &self.actions.driver_label,
            &self.actions.options,
            false,
        );
        let trigger = driver
            .choice()
            .and_then(|c| c.options.first())
            .map(|o| o.value.clone())
            .unwrap_or_default();
        let follower_label = self.actions.follower_label.clone();
        let follower = self.new_follower(driver_key, &follower_label, &trigger);
        let follower_key = follower.key;

        self.place(slot.parent, slot.column, slot.index + 1, vec![driver, follower])?;
        let mut followers = SmallVec::new();
        followers.push(follower_key);
        self.bundles.insert(
            owner,
            Bundle {
                driver: driver_key,
                followers,
            },
        );
        log::debug!("bundle: `{owner}` → driver `{driver_key}`");
        self.compact_bundles();
        Ok(true)
    }

    /// Add another follower to an existing bundle, shown when the driver
    /// equals `eq`. It goes after the last member of the bundle.
    pub fn add_follower(
        &mut self,
        owner: ComponentKey,
        label: &str,
        eq: &str,
    ) -> Result<ComponentKey, FormError> {
        let bundle = self
            .bundles
            .get(owner)
            .cloned()
            .ok_or_else(|| FormError::Invalid(format!("`{owner}` has no actions")))?;
        let last = bundle.followers.last().copied().unwrap_or(bundle.driver);
        let slot = self.slot_of(last).ok_or_else(|| FormError::not_found(last))?;

        let follower = self.new_follower(bundle.driver, label, eq);
        let key = follower.key;
        self.place(slot.parent, slot.column, slot.index + 1, vec![follower])?;
        if let Some(b) = self.bundles.by_owner.get_mut(&owner) {
            b.followers.push(key);
        }
        Ok(key)
    }

    fn new_follower(&mut self, driver: ComponentKey, label: &str, eq: &str) -> Component {
        let key = self.registry.generate_unique_key(label);
        let mut follower = create_component_with_key(ComponentType::TextArea, key, label, &[], false);
        follower.conditional = Some(Conditional {
            show: true,
            when: driver,
            eq: eq.to_string(),
        });
        follower
    }

    /// Renumber driver keys `{prefix}1..N` in document order.
    ///
    /// All current driver keys are released first so the numbering can
    /// shift freely, and keys of deleted drivers are reused. A wanted key
    /// held by an unrelated component falls back to the next free
    /// `{prefix}N`. Every follower conditional is rewritten in the same
    /// pass.
    pub fn compact_bundles(&mut self) {
        let components = &self.components;
        self.bundles
            .retain_live(&|k| locate::contains_key(components, k));

        let mut owners = Vec::new();
        locate::walk(&self.components, &mut |_, c| {
            if self.bundles.get(c.key).is_some() {
                owners.push(c.key);
            }
        });

        let prefix = self.actions.key_prefix.clone();
        let wanted: Vec<ComponentKey> = (1..=owners.len())
            .map(|n| ComponentKey::intern(&format!("{prefix}{n}")))
            .collect();
        let current: Vec<ComponentKey> = owners
            .iter()
            .filter_map(|o| self.bundles.get(*o).map(|b| b.driver))
            .collect();
        if current == wanted {
            return;
        }

        for driver in &current {
            self.registry.release(*driver);
        }
        let mut renames: HashMap<ComponentKey, ComponentKey> = HashMap::new();
        for (i, owner) in owners.iter().enumerate() {
            let old = current[i];
            let free = self.registry.register(wanted[i])
                || !locate::contains_key(&self.components, wanted[i]);
            let new = if free {
                wanted[i]
            } else {
                self.registry.generate_prefixed_key(&prefix)
            };
            if old != new {
                renames.insert(old, new);
            }
            if let Some(b) = self.bundles.by_owner.get_mut(owner) {
                b.driver = new;
            }
        }
        if renames.is_empty() {
            return;
        }
        log::debug!("bundle: renumbered {} driver(s)", renames.len());
        locate::walk_mut(&mut self.components, &mut |c| {
            if let Some(new) = renames.get(&c.key) {
                c.key = *new;
            }
            if let Some(cond) = c.conditional.as_mut() {
                if let Some(new) = renames.get(&cond.when) {
                    cond.when = *new;
                }
            }
        });
    }

    /// Rebuild the table from wire markers and strip them from `extra`.
    ///
    /// Followers are the components whose conditional names the driver.
    /// An owner whose driver is missing loses its bundle.
    pub(crate) fn absorb_bundle_markers(&mut self) {
        let mut links: Vec<(ComponentKey, ComponentKey)> = Vec::new();
        locate::walk_mut(&mut self.components, &mut |c| {
            if let Some(Value::String(driver)) = c.extra.remove(DRIVER_KEY_FIELD) {
                if !driver.is_empty() {
                    links.push((c.key, ComponentKey::intern(&driver)));
                }
            }
            c.extra.remove(DRIVER_FLAG);
        });

        self.bundles = BundleTable::default();
        for (owner, driver) in links {
            if !locate::contains_key(&self.components, driver) {
                log::warn!("bundle: driver `{driver}` of `{owner}` is missing, dropped");
                continue;
            }
            let mut followers = SmallVec::new();
            locate::walk(&self.components, &mut |_, c| {
                if c.conditional.as_ref().is_some_and(|k| k.when == driver) {
                    followers.push(c.key);
                }
            });
            self.bundles.insert(owner, Bundle { driver, followers });
        }
    }
}
