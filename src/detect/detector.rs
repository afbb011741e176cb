//! Per-subscription locate-and-classify state machine.
//!
//! Stage 1 looks the stored qualname up at the target revision. Stage 2
//! searches the same file by fingerprint, Stage 3 every other file of the
//! same language. Stage 4 reports the construct missing. Once a stage
//! locates the construct, later stages are never consulted.

use std::sync::Arc;

use globset::GlobSet;
use tracing::{debug, trace, warn};

use crate::analysis::fingerprint::NO_BODY_HASH;
use crate::analysis::{
    get_indexer_by_id, get_indexer_for_path, Construct, FileIndex, LanguageIndexer, Lookup,
    ScanCache,
};
use crate::config::ScanPolicy;
use crate::errors::IndexError;
use crate::repo::Repository;

use super::container::{diff_container, member_fingerprints};
use super::inheritance::Propagator;
use super::lines::evaluate_lines;
use super::{
    Candidate, ChangeType, Confidence, ContainerChanges, InheritedChange, Outcome, Proposal,
    SemanticTarget, Subscription, Trigger, TriggerDetails,
};

/// Fingerprint match quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    /// Interface and body hashes both match.
    Exact,
    /// Only the body hash matches.
    BodyOnly,
}

enum Pick {
    Unique(Construct, Tier),
    Multiple(Vec<Construct>),
    Nothing,
}

/// Collects change entries for one subscription; finalized once.
struct TriggerBuilder {
    subscription_id: String,
    path: String,
    start_line: usize,
    end_line: usize,
    reasons: Vec<String>,
    direct: Option<ChangeType>,
    inherited: Option<ChangeType>,
    details: TriggerDetails,
}

impl TriggerBuilder {
    fn new(subscription_id: &str, path: &str, start_line: usize, end_line: usize) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            path: path.to_string(),
            start_line,
            end_line,
            reasons: Vec::new(),
            direct: None,
            inherited: None,
            details: TriggerDetails::default(),
        }
    }

    fn at(subscription_id: &str, construct: &Construct) -> Self {
        Self::new(
            subscription_id,
            &construct.path,
            construct.start_line,
            construct.end_line,
        )
    }

    fn reason(&mut self, reason: &str) {
        if !self.reasons.iter().any(|r| r == reason) {
            self.reasons.push(reason.to_string());
        }
    }

    fn direct(&mut self, change_type: ChangeType, reason: &str) {
        self.direct = Some(change_type);
        self.reason(reason);
    }

    fn parse_error(&mut self, message: String) {
        self.direct(ChangeType::ParseError, "parse_error");
        self.details.parse_error = Some(message);
    }

    fn candidates(&mut self, candidates: &[Construct]) {
        self.details.candidates = candidates.iter().map(Candidate::from).collect();
    }

    fn aggregate(&mut self, changes: ContainerChanges) {
        for reason in changes.reasons() {
            self.reason(&reason);
        }
        self.direct = Some(ChangeType::Aggregate);
        self.details.container_changes = Some(changes);
    }

    /// Inherited entries never replace a direct change type.
    fn inherited(&mut self, changes: Vec<InheritedChange>) {
        for change in &changes {
            let reason = match change.change_type {
                ChangeType::Structural => "inherited_interface_changed",
                _ => "inherited_body_changed",
            };
            self.reason(reason);
            self.inherited = match (self.inherited, change.change_type) {
                (Some(ChangeType::Structural), _) | (_, ChangeType::Structural) => {
                    Some(ChangeType::Structural)
                }
                _ => Some(ChangeType::Content),
            };
        }
        self.details.inherited_changes.extend(changes);
    }

    fn finish(self) -> Option<Trigger> {
        let change_type = self.direct.or(self.inherited)?;
        Some(Trigger {
            subscription_id: self.subscription_id,
            path: self.path,
            start_line: self.start_line,
            end_line: self.end_line,
            reasons: self.reasons,
            change_type,
            details: self.details,
            matching_hunks: Vec::new(),
        })
    }
}

/// Evaluates subscriptions for one resolved (base, target) pair.
pub struct Detector<'a> {
    repo: &'a dyn Repository,
    cache: &'a ScanCache,
    base: &'a str,
    target: &'a str,
    policy: &'a ScanPolicy,
    excluded: &'a GlobSet,
}

impl<'a> Detector<'a> {
    pub fn new(
        repo: &'a dyn Repository,
        cache: &'a ScanCache,
        base: &'a str,
        target: &'a str,
        policy: &'a ScanPolicy,
        excluded: &'a GlobSet,
    ) -> Self {
        Self {
            repo,
            cache,
            base,
            target,
            policy,
            excluded,
        }
    }

    /// Evaluate one subscription. `Err` is a repository read failure that
    /// only affects this subscription.
    pub fn evaluate(&self, sub: &Subscription) -> Result<Outcome, IndexError> {
        match &sub.semantic {
            Some(target) => self.evaluate_semantic(sub, target),
            None => Ok(evaluate_lines(self.repo, self.base, self.target, sub)?),
        }
    }

    fn evaluate_semantic(
        &self,
        sub: &Subscription,
        target: &SemanticTarget,
    ) -> Result<Outcome, IndexError> {
        let indexer = get_indexer_by_id(&target.language).ok_or_else(|| {
            IndexError::analyze(&sub.path, format!("no indexer for {}", target.language))
        })?;

        let current = match self
            .cache
            .index_with(self.repo, indexer, self.target, &sub.path)
        {
            Ok(index) => Some(index),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        if let Some(index) = &current {
            // Stage 1: exact qualname
            match index.lookup(&target.qualname, Some(target.kind)) {
                Lookup::Found(construct) => {
                    debug!(id = %sub.id, "stage 1: located by qualname");
                    let proposal = line_shift(sub, &construct);
                    return self.classify(sub, target, indexer, &construct, proposal);
                }
                Lookup::Ambiguous(matches) => {
                    debug!(id = %sub.id, count = matches.len(), "stage 1: duplicate qualname");
                    let mut builder =
                        TriggerBuilder::new(&sub.id, &sub.path, sub.start_line, sub.end_line);
                    builder.direct(ChangeType::Ambiguous, "duplicate_qualname");
                    builder.candidates(&matches);
                    return Ok(Outcome {
                        trigger: builder.finish(),
                        proposal: None,
                    });
                }
                Lookup::NotFound => {}
            }

            if let Some(error) = &index.syntax_error {
                let mut builder =
                    TriggerBuilder::new(&sub.id, &sub.path, sub.start_line, sub.end_line);
                builder.parse_error(format!(
                    "{} does not parse at {} (line {}: {})",
                    sub.path, self.target, error.line, error.message
                ));
                return Ok(Outcome {
                    trigger: builder.finish(),
                    proposal: None,
                });
            }

            // Stage 2: same file, by fingerprint
            match self.pick(indexer, target, index.constructs.iter()) {
                Pick::Unique(construct, tier) => {
                    debug!(id = %sub.id, qualname = %construct.qualname, "stage 2: relocated in file");
                    let confidence = match tier {
                        Tier::Exact => Confidence::High,
                        Tier::BodyOnly => Confidence::Medium,
                    };
                    let mut reasons = identity_reasons(target, &construct);
                    if reasons.is_empty() {
                        reasons.push("moved_within_file".to_string());
                    }
                    let proposal = relocation(sub, target, &construct, reasons, confidence);
                    return self.classify(sub, target, indexer, &construct, Some(proposal));
                }
                Pick::Multiple(matches) => {
                    debug!(id = %sub.id, count = matches.len(), "stage 2: ambiguous relocation");
                    let mut builder =
                        TriggerBuilder::new(&sub.id, &sub.path, sub.start_line, sub.end_line);
                    builder.direct(ChangeType::Ambiguous, "ambiguous_relocation");
                    builder.candidates(&matches);
                    return Ok(Outcome {
                        trigger: builder.finish(),
                        proposal: None,
                    });
                }
                Pick::Nothing => {}
            }
        }

        // Stage 3: every other file of the same language
        let files = self.cache.list_files(self.repo, self.target)?;
        let mut others: Vec<Arc<FileIndex>> = Vec::new();
        for path in files.iter() {
            if *path == sub.path || self.excluded.is_match(path) {
                continue;
            }
            match get_indexer_for_path(path) {
                Some(other) if other.language_id() == indexer.language_id() => {}
                _ => continue,
            }
            match self.cache.index_with(self.repo, indexer, self.target, path) {
                Ok(index) => others.push(index),
                Err(e) => warn!(path = %path, error = %e, "skipping file in cross-file search"),
            }
        }

        let mut fallthrough = Vec::new();
        match self.pick(indexer, target, others.iter().flat_map(|i| i.constructs.iter())) {
            Pick::Unique(construct, tier) => {
                debug!(id = %sub.id, path = %construct.path, "stage 3: relocated across files");
                let confidence = match tier {
                    Tier::Exact => Confidence::High,
                    Tier::BodyOnly => Confidence::Low,
                };
                let mut reasons = vec!["moved_cross_file".to_string()];
                reasons.extend(identity_reasons(target, &construct));
                let proposal = relocation(sub, target, &construct, reasons, confidence);
                return self.classify(sub, target, indexer, &construct, Some(proposal));
            }
            Pick::Multiple(matches) => {
                debug!(id = %sub.id, count = matches.len(), "stage 3: no unique match");
                fallthrough = matches;
            }
            Pick::Nothing => {}
        }

        // Stage 4: missing
        debug!(id = %sub.id, "stage 4: construct missing");
        let mut builder = TriggerBuilder::new(&sub.id, &sub.path, sub.start_line, sub.end_line);
        let reason = if current.is_none() {
            "file_deleted"
        } else {
            "construct_missing"
        };
        builder.direct(ChangeType::Missing, reason);
        builder.candidates(&fallthrough);
        Ok(Outcome {
            trigger: builder.finish(),
            proposal: None,
        })
    }

    /// Tiered fingerprint search. Constructs that already existed under the
    /// same (path, qualname) at the base revision are not relocations.
    fn pick<'c>(
        &self,
        indexer: &dyn LanguageIndexer,
        target: &SemanticTarget,
        constructs: impl Iterator<Item = &'c Construct>,
    ) -> Pick {
        let mut exact = Vec::new();
        let mut body_only = Vec::new();
        for c in constructs {
            if c.body_hash != target.body_hash {
                continue;
            }
            if c.interface_hash == target.interface_hash {
                exact.push(c);
            } else if c.body_hash != NO_BODY_HASH {
                body_only.push(c);
            }
        }

        for (matches, tier) in [(exact, Tier::Exact), (body_only, Tier::BodyOnly)] {
            let mut fresh: Vec<Construct> = matches
                .into_iter()
                .filter(|c| self.is_new_at_target(indexer, c))
                .cloned()
                .collect();
            match fresh.len() {
                0 => continue,
                1 => return Pick::Unique(fresh.remove(0), tier),
                _ => return Pick::Multiple(fresh),
            }
        }
        Pick::Nothing
    }

    fn is_new_at_target(&self, indexer: &dyn LanguageIndexer, construct: &Construct) -> bool {
        match self
            .cache
            .index_with(self.repo, indexer, self.base, &construct.path)
        {
            Ok(index) => matches!(
                index.lookup(&construct.qualname, Some(construct.kind)),
                Lookup::NotFound
            ),
            Err(_) => true,
        }
    }

    /// Compare a located construct with the stored baseline.
    fn classify(
        &self,
        sub: &Subscription,
        target: &SemanticTarget,
        indexer: &dyn LanguageIndexer,
        construct: &Construct,
        proposal: Option<Proposal>,
    ) -> Result<Outcome, IndexError> {
        let index = self
            .cache
            .index_with(self.repo, indexer, self.target, &construct.path)?;
        let mut builder = TriggerBuilder::at(&sub.id, construct);

        if let Some(message) = self.parse_error(sub, target, indexer, construct, &index) {
            builder.parse_error(message);
            return Ok(Outcome {
                trigger: builder.finish(),
                proposal,
            });
        }

        if target.include_members && indexer.is_container_kind(construct.kind) {
            let current = member_fingerprints(
                indexer,
                &index.constructs,
                &construct.qualname,
                target.include_private,
            );
            let changes = diff_container(target, construct, &current);
            if !changes.is_empty() {
                builder.aggregate(changes);
            }
        } else if construct.interface_hash != target.interface_hash {
            builder.direct(ChangeType::Structural, "interface_changed");
        } else if construct.body_hash != target.body_hash {
            builder.direct(ChangeType::Content, "body_changed");
        }

        if self.policy.track_inheritance && construct.kind.is_type() {
            let files = self.cache.list_files(self.repo, self.target)?;
            let propagator = Propagator {
                repo: self.repo,
                cache: self.cache,
                indexer,
                base_revision: self.base,
                target_revision: self.target,
                files: &files,
                policy: self.policy,
            };
            let inherited = propagator.inherited_changes(construct, &index);
            if !inherited.is_empty() {
                trace!(id = %sub.id, count = inherited.len(), "inherited changes");
                builder.inherited(inherited);
            }
        }

        Ok(Outcome {
            trigger: builder.finish(),
            proposal,
        })
    }

    /// Parse errors on either revision, described for humans.
    fn parse_error(
        &self,
        sub: &Subscription,
        target: &SemanticTarget,
        indexer: &dyn LanguageIndexer,
        construct: &Construct,
        index: &FileIndex,
    ) -> Option<String> {
        if construct.has_parse_error {
            return Some(describe_parse_error(index, self.target));
        }
        let base = self
            .cache
            .index_with(self.repo, indexer, self.base, &sub.path)
            .ok()?;
        match base.lookup(&target.qualname, Some(target.kind)) {
            Lookup::Found(old) if old.has_parse_error => Some(describe_parse_error(&base, self.base)),
            _ => None,
        }
    }
}

fn describe_parse_error(index: &FileIndex, revision: &str) -> String {
    match &index.syntax_error {
        Some(error) => format!(
            "{} does not parse at {} (line {}: {})",
            index.path, revision, error.line, error.message
        ),
        None => format!("{} does not parse at {}", index.path, revision),
    }
}

fn identity_reasons(target: &SemanticTarget, construct: &Construct) -> Vec<String> {
    let mut reasons = Vec::new();
    if construct.qualname != target.qualname {
        reasons.push("renamed".to_string());
    }
    if construct.kind != target.kind {
        reasons.push("kind_changed".to_string());
    }
    reasons
}

fn relocation(
    sub: &Subscription,
    target: &SemanticTarget,
    construct: &Construct,
    reasons: Vec<String>,
    confidence: Confidence,
) -> Proposal {
    Proposal {
        subscription_id: sub.id.clone(),
        old_path: sub.path.clone(),
        old_start: sub.start_line,
        old_end: sub.end_line,
        new_path: construct.path.clone(),
        new_start: construct.start_line,
        new_end: construct.end_line,
        reasons,
        confidence,
        new_qualname: (construct.qualname != target.qualname).then(|| construct.qualname.clone()),
        new_kind: (construct.kind != target.kind).then_some(construct.kind),
    }
}

/// Stage 1 found the construct on other lines.
fn line_shift(sub: &Subscription, construct: &Construct) -> Option<Proposal> {
    if construct.start_line == sub.start_line && construct.end_line == sub.end_line {
        return None;
    }
    Some(Proposal {
        subscription_id: sub.id.clone(),
        old_path: sub.path.clone(),
        old_start: sub.start_line,
        old_end: sub.end_line,
        new_path: construct.path.clone(),
        new_start: construct.start_line,
        new_end: construct.end_line,
        reasons: vec!["line_shift".to_string()],
        confidence: Confidence::High,
        new_qualname: None,
        new_kind: None,
    })
}
