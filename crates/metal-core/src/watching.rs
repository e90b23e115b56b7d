#![forbid(unsafe_code)]

//! Watch reference counts, dependent keys and path chains.
//!
//! A key is *watched* while its count is positive; only watched keys pay
//! for change notification. Counts are raised by observers and by computed
//! properties declaring the key as a dependency.
//!
//! # Chains
//!
//! Watching a compound path such as `a.b.c` on `root` installs a chain:
//! every `(object, key)` pair along the currently resolved path (`root.a`,
//! `a.b`, `b.c`) is watched and records a back-link to `root`. A change to
//! any linked key is re-announced on `root` as a change of `a.b.c`, and on
//! the did-change side the chain is re-resolved so it follows the new
//! intermediate objects. Global prefixes and `*` targets are resolved once,
//! when the chain is installed.
//!
//! # Invariants
//!
//! 1. Each live link contributes exactly one count to the key it watches.
//! 2. A root holds a chain for a path exactly while the path's count on the
//!    root is positive.
//! 3. Links reference objects weakly; a chain never keeps its
//!    intermediates alive.

use std::rc::Rc;

use crate::accessors::get;
use crate::error::Result;
use crate::guid::Guid;
use crate::meta::Key;
use crate::object::{Object, WeakObject};
use crate::path::normalize_path;
use crate::property_events::{property_did_change, property_will_change};
use crate::realm::Realm;

/// Where a chain starts resolving.
#[derive(Debug, Clone)]
pub(crate) enum ChainStart {
    /// The object owning the chain.
    Root,
    /// A target resolved at install time (a global or `*` prefix).
    Fixed(WeakObject),
    /// The install-time target did not exist; nothing is linked.
    Detached,
}

#[derive(Debug, Clone)]
pub(crate) struct Chain {
    start: ChainStart,
    segments: Vec<Rc<str>>,
    links: Vec<(WeakObject, Rc<str>)>,
}

/// Back-link stored on an object that a chain passes through.
#[derive(Debug, Clone)]
pub(crate) struct ChainLink {
    root: WeakObject,
    root_guid: Guid,
    path: Rc<str>,
}

fn is_compound(path: &str) -> bool {
    path.contains(['.', '*'])
}

impl Realm {
    /// Start watching `path` on `obj`.
    pub fn watch(&self, obj: &Object, path: &str) -> Result<()> {
        if obj.is_destroyed() {
            return Ok(());
        }
        let path = normalize_path(path)?;
        let tuple = if is_compound(&path) {
            Some(self.resolve_tuple(Some(obj), &path)?)
        } else {
            None
        };

        let count = obj.meta_mut().adjust_watch(&path, 1);
        if let Some((target, rest)) = tuple
            && count == 1
        {
            let start = match target {
                Some(target) if target == *obj => ChainStart::Root,
                Some(target) => ChainStart::Fixed(target.downgrade()),
                None => ChainStart::Detached,
            };
            let segments = rest
                .split(['.', '*'])
                .filter(|seg| !seg.is_empty())
                .map(Rc::from)
                .collect();
            let chain = Chain {
                start,
                segments,
                links: Vec::new(),
            };
            obj.meta_mut().chains.insert(Key::from(&*path), chain);
            relink(obj, &path);
        }
        Ok(())
    }

    /// Release one watch of `path` on `obj`.
    pub fn unwatch(&self, obj: &Object, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        unwatch_path(obj, &path);
        Ok(())
    }

    #[must_use]
    pub fn is_watching(&self, obj: &Object, key: &str) -> bool {
        watch_count(obj, key) > 0
    }

    /// Record that `dependent` must be notified whenever `source` changes,
    /// and watch `source`.
    pub fn add_dependent_key(&self, obj: &Object, dependent: &str, source: &str) -> Result<()> {
        let source = normalize_path(source)?;
        *obj.meta_mut()
            .deps_for_mut(&source)
            .entry(Key::from(dependent))
            .or_default() += 1;
        self.watch(obj, &source)
    }

    /// Inverse of [`Realm::add_dependent_key`].
    pub fn remove_dependent_key(&self, obj: &Object, dependent: &str, source: &str) -> Result<()> {
        let source = normalize_path(source)?;
        remove_dependent_key(obj, dependent, &source);
        Ok(())
    }
}

pub fn watch_count(obj: &Object, key: &str) -> usize {
    obj.meta().watch_count(key)
}

pub(crate) fn unwatch_path(obj: &Object, path: &str) {
    if obj.meta().watch_count(path) == 0 {
        return;
    }
    let count = obj.meta_mut().adjust_watch(path, -1);
    if count == 0 {
        let chain = obj.meta_mut().chains.remove(path);
        if let Some(chain) = chain {
            unlink(obj.guid(), path, &chain.links);
        }
    }
}

pub(crate) fn remove_dependent_key(obj: &Object, dependent: &str, source: &str) {
    let Ok(source) = normalize_path(source) else {
        return;
    };
    *obj.meta_mut()
        .deps_for_mut(&source)
        .entry(Key::from(dependent))
        .or_default() -= 1;
    unwatch_path(obj, &source);
}

/// Drop the back-links and watch counts a chain placed on its objects.
fn unlink(root_guid: Guid, path: &str, links: &[(WeakObject, Rc<str>)]) {
    for (weak, seg) in links {
        let Some(obj) = weak.upgrade() else {
            continue;
        };
        let mut meta = obj.meta_mut();
        if let Some(list) = meta.chain_links.get_mut(&**seg)
            && let Some(pos) = list
                .iter()
                .position(|link| link.root_guid == root_guid && &*link.path == path)
        {
            list.remove(pos);
            if list.is_empty() {
                meta.chain_links.remove(&**seg);
            }
        }
        meta.adjust_watch(seg, -1);
    }
}

/// Re-resolve the chain for `path` on `root` against the current values.
pub(crate) fn relink(root: &Object, path: &str) {
    let chain = root.meta_mut().chains.remove(path);
    let Some(mut chain) = chain else {
        return;
    };
    unlink(root.guid(), path, &chain.links);
    chain.links.clear();

    let mut current = match &chain.start {
        ChainStart::Root => Some(root.clone()),
        ChainStart::Fixed(target) => target.upgrade(),
        ChainStart::Detached => None,
    };
    let link = ChainLink {
        root: root.downgrade(),
        root_guid: root.guid(),
        path: Rc::from(path),
    };
    let last = chain.segments.len().saturating_sub(1);

    for (idx, seg) in chain.segments.iter().enumerate() {
        let Some(obj) = current.take() else {
            break;
        };
        if obj.is_destroyed() {
            break;
        }
        {
            let mut meta = obj.meta_mut();
            meta.chain_links
                .entry(Rc::clone(seg))
                .or_default()
                .push(link.clone());
            meta.adjust_watch(seg, 1);
        }
        chain.links.push((obj.downgrade(), Rc::clone(seg)));
        if idx < last {
            current = get(&obj, seg).as_object().cloned();
        }
    }

    tracing::trace!(
        message = "chain.relink",
        guid = %root.guid(),
        path,
        links = chain.links.len()
    );
    if !root.is_destroyed() {
        root.meta_mut().chains.insert(Key::from(path), chain);
    } else {
        unlink(root.guid(), path, &chain.links);
    }
}

fn links_for(obj: &Object, key: &str) -> Vec<ChainLink> {
    obj.meta().chain_links.get(key).cloned().unwrap_or_default()
}

/// Announce an upcoming change of `key` on every chain passing through it.
pub(crate) fn chains_will_change(obj: &Object, key: &str) {
    for link in links_for(obj, key) {
        if let Some(root) = link.root.upgrade() {
            property_will_change(&root, &link.path);
        }
    }
}

/// Re-resolve and announce every chain passing through `key`.
pub(crate) fn chains_did_change(obj: &Object, key: &str) {
    for link in links_for(obj, key) {
        if let Some(root) = link.root.upgrade() {
            relink(&root, &link.path);
            property_did_change(&root, &link.path);
        }
    }
}

/// Re-resolve chains passing through `key` without notifying.
pub(crate) fn refresh_links(obj: &Object, key: &str) {
    for link in links_for(obj, key) {
        if let Some(root) = link.root.upgrade() {
            relink(&root, &link.path);
        }
    }
}

/// Re-anchor the parent's chains on a freshly extended child.
///
/// The child inherited the parent's watch counts, including the counts
/// contributed by links that live on the parent. Those links are not
/// inherited, so their counts are subtracted, then every chain rooted at
/// the parent is rebuilt with the child as its root.
pub(crate) fn inherit_chains(parent: &Object, child: &Object) {
    let (link_counts, chains): (Vec<(Key, usize)>, Vec<(Key, Chain)>) = {
        let meta = parent.meta();
        (
            meta.chain_links
                .iter()
                .map(|(seg, links)| (Rc::clone(seg), links.len()))
                .collect(),
            meta.chains
                .iter()
                .map(|(path, chain)| (Rc::clone(path), chain.clone()))
                .collect(),
        )
    };

    {
        let mut meta = child.meta_mut();
        for (seg, n) in link_counts {
            meta.adjust_watch(&seg, -isize::try_from(n).unwrap_or(isize::MAX));
        }
        for (path, chain) in &chains {
            let fresh = Chain {
                start: chain.start.clone(),
                segments: chain.segments.clone(),
                links: Vec::new(),
            };
            meta.chains.insert(Rc::clone(path), fresh);
        }
    }

    for (path, _) in chains {
        relink(child, &path);
    }
}

/// Unlink every chain rooted at `obj`.
pub(crate) fn teardown_chains(obj: &Object) {
    let chains: Vec<(Key, Chain)> = obj.meta_mut().chains.drain().collect();
    for (path, chain) in chains {
        unlink(obj.guid(), &path, &chain.links);
    }
}
