//! Ancestor-chain resolution and inherited-change propagation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::analysis::{
    relative_id, Construct, FileIndex, LanguageIndexer, Lookup, ScanCache, TypeLocation,
};
use crate::config::ScanPolicy;
use crate::repo::Repository;

use super::{ChangeType, InheritedChange};

/// One resolved ancestor of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    pub path: String,
    pub qualname: String,
    /// 1 for direct parents.
    pub depth: usize,
    /// Types between the subscriber and this ancestor, nearest first.
    pub via: Vec<TypeLocation>,
}

/// Resolves base-class names to definitions at one revision.
pub struct InheritanceResolver<'a> {
    repo: &'a dyn Repository,
    cache: &'a ScanCache,
    indexer: &'a dyn LanguageIndexer,
    revision: &'a str,
    files: &'a [String],
    max_depth: usize,
}

impl<'a> InheritanceResolver<'a> {
    pub fn new(
        repo: &'a dyn Repository,
        cache: &'a ScanCache,
        indexer: &'a dyn LanguageIndexer,
        revision: &'a str,
        files: &'a [String],
    ) -> Self {
        Self {
            repo,
            cache,
            indexer,
            revision,
            files,
            max_depth: 10,
        }
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn load(&self, path: &str) -> Option<Arc<FileIndex>> {
        match self.cache.index_with(self.repo, self.indexer, self.revision, path) {
            Ok(index) => Some(index),
            Err(e) => {
                trace!(path, error = %e, "skipping unreadable base candidate");
                None
            }
        }
    }

    /// Flattened, deduplicated, parent-first ancestor chain.
    pub fn ancestors(&self, start: &Construct, start_index: &Arc<FileIndex>) -> Vec<Ancestor> {
        let mut result = Vec::new();
        let mut visited: HashSet<(String, String)> = HashSet::new();
        visited.insert((start.path.clone(), start.qualname.clone()));

        let mut queue: VecDeque<(Arc<FileIndex>, Construct, Vec<TypeLocation>, usize)> =
            VecDeque::new();
        queue.push_back((Arc::clone(start_index), start.clone(), Vec::new(), 0));

        while let Some((index, construct, via, depth)) = queue.pop_front() {
            if depth >= self.max_depth {
                debug!(qualname = %construct.qualname, "inheritance depth bound reached");
                continue;
            }
            for base in &construct.base_classes {
                let (parent_index, parent) = match self.resolve_base(&index, &construct, base) {
                    Some(found) => found,
                    None => {
                        trace!(base = %base, owner = %construct.qualname, "unresolved base");
                        continue;
                    }
                };
                let key = (parent.path.clone(), parent.qualname.clone());
                if !visited.insert(key) {
                    continue;
                }

                result.push(Ancestor {
                    path: parent.path.clone(),
                    qualname: parent.qualname.clone(),
                    depth: depth + 1,
                    via: via.clone(),
                });

                let mut next_via = via.clone();
                next_via.push(TypeLocation::new(&parent.path, &parent.qualname));
                queue.push_back((parent_index, parent, next_via, depth + 1));
            }
        }
        result
    }

    /// Same file (innermost enclosing scope first), then imports, then
    /// language-specific unimported lookup. First unique type wins.
    fn resolve_base(
        &self,
        index: &Arc<FileIndex>,
        owner: &Construct,
        base: &str,
    ) -> Option<(Arc<FileIndex>, Construct)> {
        let mut scope = owner.parent_qualname();
        loop {
            let qualname = match scope {
                Some(s) => format!("{}.{}", s, base),
                None => base.to_string(),
            };
            if qualname != owner.qualname {
                if let Lookup::Found(c) = index.lookup_type(&qualname) {
                    return Some((Arc::clone(index), c));
                }
            }
            scope = match scope {
                Some(s) => s.rsplit_once('.').map(|(parent, _)| parent),
                None => break,
            };
        }

        let segments: Vec<&str> = base.split('.').collect();
        let imported = (1..=segments.len()).rev().find_map(|n| {
            let key = segments[..n].join(".");
            index.imports.get(&key).map(|binding| (binding, n))
        });

        let candidates = match imported {
            Some((binding, n)) => {
                self.indexer
                    .import_targets(binding, &segments[n..], &owner.path, self.files)
            }
            None => self.indexer.unimported_targets(base, &owner.path, self.files),
        };

        for candidate in candidates {
            let candidate_index = match self.load(&candidate.path) {
                Some(i) => i,
                None => continue,
            };
            if let Lookup::Found(c) = candidate_index.lookup_type(&candidate.qualname) {
                return Some((candidate_index, c));
            }
        }
        None
    }
}

/// Changed ancestor members that reach `subscriber` between two revisions.
///
/// The chain is resolved at `target_revision`; each ancestor's direct
/// members are diffed against the same (path, qualname) at `base_revision`.
/// Members overridden by the subscriber or by a class on the discovery path
/// are dropped.
pub struct Propagator<'a> {
    pub repo: &'a dyn Repository,
    pub cache: &'a ScanCache,
    pub indexer: &'a dyn LanguageIndexer,
    pub base_revision: &'a str,
    pub target_revision: &'a str,
    pub files: &'a [String],
    pub policy: &'a ScanPolicy,
}

impl Propagator<'_> {
    pub fn inherited_changes(
        &self,
        subscriber: &Construct,
        subscriber_index: &Arc<FileIndex>,
    ) -> Vec<InheritedChange> {
        let resolver = InheritanceResolver::new(
            self.repo,
            self.cache,
            self.indexer,
            self.target_revision,
            self.files,
        )
        .max_depth(self.policy.max_inheritance_depth);

        let ancestors = resolver.ancestors(subscriber, subscriber_index);
        if ancestors.is_empty() {
            return Vec::new();
        }
        debug!(
            subscriber = %subscriber.qualname,
            count = ancestors.len(),
            "resolved ancestors"
        );

        let own_keys = self.override_keys(&subscriber_index.constructs, &subscriber.qualname);
        let mut via_keys: HashMap<TypeLocation, HashSet<String>> = HashMap::new();
        let mut changes = Vec::new();

        for ancestor in &ancestors {
            let target_index =
                match self
                    .cache
                    .index_with(self.repo, self.indexer, self.target_revision, &ancestor.path)
                {
                    Ok(i) => i,
                    Err(_) => continue,
                };
            let base_index =
                match self
                    .cache
                    .index_with(self.repo, self.indexer, self.base_revision, &ancestor.path)
                {
                    Ok(i) => i,
                    Err(_) => {
                        trace!(path = %ancestor.path, "ancestor absent at base revision");
                        continue;
                    }
                };

            let before = self
                .indexer
                .members_of(&base_index.constructs, &ancestor.qualname, true);
            let after = self
                .indexer
                .members_of(&target_index.constructs, &ancestor.qualname, true);

            for member in &after {
                let rel = match relative_id(&member.qualname, &ancestor.qualname) {
                    Some(r) => r,
                    None => continue,
                };
                let old = before
                    .iter()
                    .find(|b| relative_id(&b.qualname, &ancestor.qualname) == Some(rel));
                let change_type = match old {
                    Some(old) if old.interface_hash != member.interface_hash => {
                        ChangeType::Structural
                    }
                    Some(old) if old.body_hash != member.body_hash => ChangeType::Content,
                    _ => continue,
                };

                if member.private && !self.policy.propagate_private_members {
                    continue;
                }
                let key = match self.indexer.override_key(rel, member) {
                    Some(k) => k,
                    None => continue,
                };
                if own_keys.contains(&key) {
                    trace!(member = rel, "overridden by subscriber");
                    continue;
                }
                let hidden = ancestor.via.iter().any(|loc| {
                    via_keys
                        .entry(loc.clone())
                        .or_insert_with(|| self.keys_at(loc))
                        .contains(&key)
                });
                if hidden {
                    trace!(member = rel, "overridden by intermediate class");
                    continue;
                }

                changes.push(InheritedChange {
                    origin_path: ancestor.path.clone(),
                    origin_class: ancestor.qualname.clone(),
                    member: rel.to_string(),
                    change_type,
                    via: ancestor.via.iter().map(|l| l.qualname.clone()).collect(),
                });
            }
        }
        changes
    }

    fn override_keys(&self, constructs: &[Construct], container: &str) -> HashSet<String> {
        self.indexer
            .members_of(constructs, container, true)
            .iter()
            .filter_map(|m| {
                let rel = relative_id(&m.qualname, container)?;
                self.indexer.override_key(rel, m)
            })
            .collect()
    }

    fn keys_at(&self, loc: &TypeLocation) -> HashSet<String> {
        match self
            .cache
            .index_with(self.repo, self.indexer, self.target_revision, &loc.path)
        {
            Ok(index) => self.override_keys(&index.constructs, &loc.qualname),
            Err(_) => HashSet::new(),
        }
    }
}
