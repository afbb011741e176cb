//! Creating subscriptions and re-baselining them from proposals.

use crate::analysis::{
    get_indexer_for_path, Construct, ConstructKind, FileIndex, LanguageIndexer, Lookup,
    ScanCache,
};
use crate::repo::Repository;

use super::container::member_fingerprints;
use super::{Proposal, SemanticTarget, Subscription, FINGERPRINT_VERSION};

/// Container tracking flags for a semantic subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerOptions {
    pub include_members: bool,
    pub include_private: bool,
    pub track_decorators: bool,
}

pub fn create_line_subscription(
    id: impl Into<String>,
    path: impl Into<String>,
    start_line: usize,
    end_line: usize,
) -> anyhow::Result<Subscription> {
    if start_line == 0 || start_line > end_line {
        anyhow::bail!("invalid line range {}-{}", start_line, end_line);
    }
    Ok(Subscription {
        id: id.into(),
        path: path.into(),
        start_line,
        end_line,
        label: None,
        active: true,
        semantic: None,
    })
}

/// Locate `qualname` in `path` at `revision` and subscribe to it.
pub fn create_semantic_subscription(
    repo: &dyn Repository,
    revision: &str,
    path: &str,
    qualname: &str,
    kind: Option<ConstructKind>,
    id: impl Into<String>,
    options: ContainerOptions,
) -> anyhow::Result<Subscription> {
    let indexer = get_indexer_for_path(path)
        .ok_or_else(|| anyhow::anyhow!("no indexer handles {}", path))?;
    let revision = repo.resolve_revision(revision)?;
    let cache = ScanCache::new();
    let index = cache.index_with(repo, indexer, &revision, path)?;
    let construct = locate(&index, qualname, kind)?;

    if options.include_members && !indexer.is_container_kind(construct.kind) {
        anyhow::bail!(
            "{} is a {}, which cannot be tracked as a container in {}",
            construct.qualname,
            construct.kind,
            indexer.language_id()
        );
    }

    Ok(Subscription {
        id: id.into(),
        path: construct.path.clone(),
        start_line: construct.start_line,
        end_line: construct.end_line,
        label: None,
        active: true,
        semantic: Some(semantic_target(indexer, &construct, &index, options)),
    })
}

fn locate(index: &FileIndex, qualname: &str, kind: Option<ConstructKind>) -> anyhow::Result<Construct> {
    match index.lookup(qualname, kind) {
        Lookup::Found(c) => Ok(c),
        Lookup::NotFound => anyhow::bail!("{} not found in {}", qualname, index.path),
        Lookup::Ambiguous(matches) => anyhow::bail!(
            "{} is ambiguous in {} ({} definitions)",
            qualname,
            index.path,
            matches.len()
        ),
    }
}

/// Build the stored identity for a located construct.
pub fn semantic_target(
    indexer: &dyn LanguageIndexer,
    construct: &Construct,
    index: &FileIndex,
    options: ContainerOptions,
) -> SemanticTarget {
    let (baseline_members, baseline_container_qualname) = if options.include_members {
        (
            member_fingerprints(
                indexer,
                &index.constructs,
                &construct.qualname,
                options.include_private,
            ),
            Some(construct.qualname.clone()),
        )
    } else {
        Default::default()
    };

    SemanticTarget {
        language: indexer.language_id().to_string(),
        kind: construct.kind,
        qualname: construct.qualname.clone(),
        role: construct.role.clone(),
        interface_hash: construct.interface_hash.clone(),
        body_hash: construct.body_hash.clone(),
        fingerprint_version: FINGERPRINT_VERSION,
        include_members: options.include_members,
        include_private: options.include_private,
        track_decorators: options.track_decorators,
        baseline_members,
        baseline_container_qualname,
    }
}

/// Re-sync a subscription to a proposal's location at `revision`.
///
/// Semantic targets are re-baselined from the construct found at the new
/// location, so the next scan compares against it.
pub fn apply_proposal(
    sub: &mut Subscription,
    proposal: &Proposal,
    repo: &dyn Repository,
    revision: &str,
) -> anyhow::Result<()> {
    if proposal.subscription_id != sub.id {
        anyhow::bail!(
            "proposal for {} cannot be applied to {}",
            proposal.subscription_id,
            sub.id
        );
    }

    if let Some(target) = &sub.semantic {
        let indexer = get_indexer_for_path(&proposal.new_path)
            .ok_or_else(|| anyhow::anyhow!("no indexer handles {}", proposal.new_path))?;
        let revision = repo.resolve_revision(revision)?;
        let cache = ScanCache::new();
        let index = cache.index_with(repo, indexer, &revision, &proposal.new_path)?;
        let qualname = proposal.new_qualname.as_deref().unwrap_or(&target.qualname);
        let kind = proposal.new_kind.unwrap_or(target.kind);
        let construct = locate(&index, qualname, Some(kind))?;

        let options = ContainerOptions {
            include_members: target.include_members,
            include_private: target.include_private,
            track_decorators: target.track_decorators,
        };
        let updated = semantic_target(indexer, &construct, &index, options);
        sub.path = construct.path.clone();
        sub.start_line = construct.start_line;
        sub.end_line = construct.end_line;
        sub.semantic = Some(updated);
    } else {
        sub.path = proposal.new_path.clone();
        sub.start_line = proposal.new_start;
        sub.end_line = proposal.new_end;
    }
    Ok(())
}
