//! Tree locator: depth-first search over the component tree.
//!
//! Every search descends into container children and into every column of
//! every columns wrapper, in display order, and returns the first match.
//! A miss is `None`; callers treat it as a no-op.

use crate::key::ComponentKey;
use crate::model::{Component, ComponentKind};
use smallvec::SmallVec;
use std::fmt;

// ─── Paths ───────────────────────────────────────────────────────────────

/// One hop down the tree.
///
/// `column` picks which child list of the *previous* component to index
/// into: `None` is the container's own children, `Some(c)` is column `c`
/// of a columns wrapper. The first step of a path always indexes the root
/// list and has `column: None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub column: Option<usize>,
    pub index: usize,
}

/// Position of a component in the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ComponentPath(SmallVec<[PathStep; 4]>);

impl ComponentPath {
    /// Path to `root[index]`.
    pub fn root(index: usize) -> Self {
        let mut steps = SmallVec::new();
        steps.push(PathStep {
            column: None,
            index,
        });
        ComponentPath(steps)
    }

    /// Path to a child of the component at `self`.
    #[must_use]
    pub fn child(&self, column: Option<usize>, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep { column, index });
        ComponentPath(steps)
    }

    /// Path of the component whose child list holds `self`.
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() < 2 {
            return None;
        }
        let mut steps = self.0.clone();
        steps.pop();
        Some(ComponentPath(steps))
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn last(&self) -> Option<PathStep> {
        self.0.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` is `other` or lies underneath it.
    pub fn starts_with(&self, other: &ComponentPath) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl From<Vec<PathStep>> for ComponentPath {
    fn from(steps: Vec<PathStep>) -> Self {
        ComponentPath(SmallVec::from_vec(steps))
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match step.column {
                Some(c) => write!(f, "c{c}.{}", step.index)?,
                None => write!(f, "{}", step.index)?,
            }
        }
        Ok(())
    }
}

// ─── Search ──────────────────────────────────────────────────────────────

/// Container-tagged kinds matched by [`find_container_by_key`].
fn is_container_kind(component: &Component) -> bool {
    matches!(
        component.kind,
        ComponentKind::Fieldset { .. }
            | ComponentKind::EditGrid { .. }
            | ComponentKind::Columns { .. }
            | ComponentKind::Quiz { .. }
    )
}

/// First component with `key`, any kind.
pub fn find_component_by_key(components: &[Component], key: ComponentKey) -> Option<&Component> {
    for component in components {
        if component.key == key {
            log::trace!("locate: hit {key}");
            return Some(component);
        }
        for (_, list) in component.child_lists() {
            if let Some(found) = find_component_by_key(list, key) {
                return Some(found);
            }
        }
    }
    None
}

pub fn find_component_by_key_mut(
    components: &mut [Component],
    key: ComponentKey,
) -> Option<&mut Component> {
    for component in components.iter_mut() {
        if component.key == key {
            return Some(component);
        }
        for (_, list) in component.child_lists_mut() {
            if let Some(found) = find_component_by_key_mut(list, key) {
                return Some(found);
            }
        }
    }
    None
}

/// First fieldset / edit-grid / columns / quiz with `key`.
///
/// Non-container components with a matching key are skipped, so a search
/// for a leaf's key returns `None`.
pub fn find_container_by_key(components: &[Component], key: ComponentKey) -> Option<&Component> {
    for component in components {
        if component.key == key && is_container_kind(component) {
            return Some(component);
        }
        for (_, list) in component.child_lists() {
            if let Some(found) = find_container_by_key(list, key) {
                return Some(found);
            }
        }
    }
    None
}

pub fn find_container_by_key_mut(
    components: &mut [Component],
    key: ComponentKey,
) -> Option<&mut Component> {
    for component in components.iter_mut() {
        if component.key == key && is_container_kind(component) {
            return Some(component);
        }
        for (_, list) in component.child_lists_mut() {
            if let Some(found) = find_container_by_key_mut(list, key) {
                return Some(found);
            }
        }
    }
    None
}

pub fn contains_key(components: &[Component], key: ComponentKey) -> bool {
    find_component_by_key(components, key).is_some()
}

/// Path to the first component with `key`.
pub fn path_of(components: &[Component], key: ComponentKey) -> Option<ComponentPath> {
    fn search(
        list: &[Component],
        key: ComponentKey,
        prefix: &ComponentPath,
        column: Option<usize>,
    ) -> Option<ComponentPath> {
        for (index, component) in list.iter().enumerate() {
            let here = if prefix.is_empty() {
                ComponentPath::root(index)
            } else {
                prefix.child(column, index)
            };
            if component.key == key {
                return Some(here);
            }
            for (col, sub) in component.child_lists() {
                if let Some(found) = search(sub, key, &here, col) {
                    return Some(found);
                }
            }
        }
        None
    }
    search(components, key, &ComponentPath::default(), None)
}

/// Component at `path`.
pub fn resolve<'a>(components: &'a [Component], path: &ComponentPath) -> Option<&'a Component> {
    let (first, rest) = path.steps().split_first()?;
    if first.column.is_some() {
        return None;
    }
    let mut node = components.get(first.index)?;
    for step in rest {
        node = node.child_list(step.column)?.get(step.index)?;
    }
    Some(node)
}

pub fn resolve_mut<'a>(
    components: &'a mut [Component],
    path: &ComponentPath,
) -> Option<&'a mut Component> {
    let (first, rest) = path.steps().split_first()?;
    if first.column.is_some() {
        return None;
    }
    let mut node = components.get_mut(first.index)?;
    for step in rest {
        node = node.child_list_mut(step.column)?.get_mut(step.index)?;
    }
    Some(node)
}

/// The list that holds the component at `path`, with its index in that list.
pub fn containing_list_mut<'a>(
    components: &'a mut Vec<Component>,
    path: &ComponentPath,
) -> Option<(&'a mut Vec<Component>, usize)> {
    let last = path.last()?;
    match path.parent() {
        None => Some((components, last.index)),
        Some(parent) => {
            let owner = resolve_mut(components, &parent)?;
            Some((owner.child_list_mut(last.column)?, last.index))
        }
    }
}

/// Key of the nearest ancestor of the component at `path`.
pub fn parent_of(components: &[Component], path: &ComponentPath) -> Option<ComponentKey> {
    resolve(components, &path.parent()?).map(|c| c.key)
}

/// Whether `descendant` sits anywhere inside the subtree rooted at `ancestor`.
pub fn is_descendant(
    components: &[Component],
    ancestor: ComponentKey,
    descendant: ComponentKey,
) -> bool {
    if ancestor == descendant {
        return false;
    }
    find_component_by_key(components, ancestor).is_some_and(|root| {
        root.child_lists()
            .into_iter()
            .any(|(_, list)| contains_key(list, descendant))
    })
}

// ─── Traversal ───────────────────────────────────────────────────────────

/// Pre-order visit of every component with its path.
pub fn walk<F>(components: &[Component], visit: &mut F)
where
    F: FnMut(&ComponentPath, &Component),
{
    fn go<F>(list: &[Component], prefix: Option<&ComponentPath>, column: Option<usize>, visit: &mut F)
    where
        F: FnMut(&ComponentPath, &Component),
    {
        for (index, component) in list.iter().enumerate() {
            let here = match prefix {
                Some(p) => p.child(column, index),
                None => ComponentPath::root(index),
            };
            visit(&here, component);
            for (col, sub) in component.child_lists() {
                go(sub, Some(&here), col, visit);
            }
        }
    }
    go(components, None, None, visit);
}

/// Pre-order visit with mutable access. Structure must not change during
/// the visit (only fields).
pub fn walk_mut<F>(components: &mut [Component], visit: &mut F)
where
    F: FnMut(&mut Component),
{
    for component in components.iter_mut() {
        visit(component);
        for (_, list) in component.child_lists_mut() {
            walk_mut(list, visit);
        }
    }
}

/// All keys, pre-order.
pub fn keys(components: &[Component]) -> Vec<ComponentKey> {
    let mut out = Vec::new();
    walk(components, &mut |_, c| out.push(c.key));
    out
}
