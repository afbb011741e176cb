//! Scan runner that evaluates every active subscription.

use globset::GlobSet;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::ScanCache;
use crate::config::{ScanPolicy, SubscriptionsFile};
use crate::errors::{IndexError, ScanError};
use crate::repo::Repository;

use super::{Detector, Outcome, ScanIssue, ScanResult, Subscription};

/// Runs scans of subscriptions against one repository.
pub struct Scanner<'a> {
    repo: &'a dyn Repository,
    policy: ScanPolicy,
    excluded: GlobSet,
}

impl<'a> Scanner<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self {
            repo,
            policy: ScanPolicy::default(),
            excluded: GlobSet::empty(),
        }
    }

    /// Set the inheritance policy.
    pub fn with_policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Paths matching `excluded` are skipped by the cross-file search.
    pub fn with_excluded(mut self, excluded: GlobSet) -> Self {
        self.excluded = excluded;
        self
    }

    /// Scanner configured from a subscriptions file.
    pub fn from_config(repo: &'a dyn Repository, config: &SubscriptionsFile) -> anyhow::Result<Self> {
        Ok(Self::new(repo)
            .with_policy(config.policy.clone())
            .with_excluded(config.excluded_matcher()?))
    }

    /// Evaluate all active subscriptions between `base_ref` and `target_ref`.
    ///
    /// Only an unresolvable revision fails the scan. Read failures for one
    /// subscription are collected in [`ScanResult::errors`].
    pub fn scan(
        &self,
        subscriptions: &[Subscription],
        base_ref: &str,
        target_ref: &str,
    ) -> Result<ScanResult, ScanError> {
        let base = self
            .repo
            .resolve_revision(base_ref)
            .map_err(|source| ScanError::Revision {
                which: "base",
                reference: base_ref.to_string(),
                source,
            })?;
        let target = self
            .repo
            .resolve_revision(target_ref)
            .map_err(|source| ScanError::Revision {
                which: "target",
                reference: target_ref.to_string(),
                source,
            })?;

        let mut result = ScanResult {
            base_ref: base_ref.to_string(),
            target_ref: target_ref.to_string(),
            base_revision: base.clone(),
            target_revision: target.clone(),
            ..Default::default()
        };

        let active: Vec<&Subscription> = subscriptions.iter().filter(|s| s.active).collect();
        info!(
            base = %base,
            target = %target,
            subscriptions = active.len(),
            "scanning"
        );

        if base == target {
            debug!("identical revisions; nothing to compare");
            result.unchanged = active.iter().map(|s| s.id.clone()).collect();
            return Ok(result);
        }

        let cache = ScanCache::new();
        let detector = Detector::new(
            self.repo,
            &cache,
            &base,
            &target,
            &self.policy,
            &self.excluded,
        );

        let outcomes: Vec<(&Subscription, Result<Outcome, IndexError>)> = active
            .par_iter()
            .map(|sub| (*sub, detector.evaluate(sub)))
            .collect();

        for (sub, outcome) in outcomes {
            match outcome {
                Ok(outcome) => result.push(&sub.id, outcome),
                Err(e) => {
                    warn!(id = %sub.id, error = %e, "subscription could not be evaluated");
                    result.errors.push(ScanIssue {
                        subscription_id: sub.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let stats = cache.stats();
        debug!(
            hits = stats.hits,
            misses = stats.misses,
            entries = stats.entries,
            "index cache"
        );
        info!(
            triggers = result.triggers.len(),
            proposals = result.proposals.len(),
            unchanged = result.unchanged.len(),
            errors = result.errors.len(),
            "scan complete"
        );
        Ok(result)
    }
}
