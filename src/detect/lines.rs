//! Line-range subscriptions evaluated against raw hunks.

use crate::errors::RepoError;
use crate::repo::{Hunk, Repository};

use super::{ChangeType, Confidence, Outcome, Proposal, Subscription, Trigger, TriggerDetails};

/// Whether a hunk touches the inclusive line range `start..=end`.
/// An insertion counts when it lands strictly inside the range.
pub fn overlaps(hunk: &Hunk, start: usize, end: usize) -> bool {
    match hunk.old_end() {
        Some(old_end) => hunk.old_start <= end && old_end >= start,
        None => hunk.old_start > start && hunk.old_start <= end,
    }
}

/// Whether a hunk lies wholly above the range and so only shifts it.
pub fn is_above(hunk: &Hunk, start: usize) -> bool {
    match hunk.old_end() {
        Some(old_end) => old_end < start,
        None => hunk.old_start <= start,
    }
}

pub fn evaluate_lines(
    repo: &dyn Repository,
    base: &str,
    target: &str,
    sub: &Subscription,
) -> Result<Outcome, RepoError> {
    match repo.show_file(target, &sub.path) {
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            return Ok(Outcome {
                trigger: Some(Trigger {
                    subscription_id: sub.id.clone(),
                    path: sub.path.clone(),
                    start_line: sub.start_line,
                    end_line: sub.end_line,
                    reasons: vec!["file_deleted".to_string()],
                    change_type: ChangeType::Missing,
                    details: TriggerDetails::default(),
                    matching_hunks: Vec::new(),
                }),
                proposal: None,
            })
        }
        Err(e) => return Err(e),
    }

    let hunks = repo.diff_hunks(base, target, &sub.path)?;
    let matching: Vec<Hunk> = hunks
        .iter()
        .filter(|h| overlaps(h, sub.start_line, sub.end_line))
        .copied()
        .collect();

    if !matching.is_empty() {
        return Ok(Outcome {
            trigger: Some(Trigger {
                subscription_id: sub.id.clone(),
                path: sub.path.clone(),
                start_line: sub.start_line,
                end_line: sub.end_line,
                reasons: vec!["overlap_hunk".to_string()],
                change_type: ChangeType::Content,
                details: TriggerDetails::default(),
                matching_hunks: matching,
            }),
            proposal: None,
        });
    }

    let shift: isize = hunks
        .iter()
        .filter(|h| is_above(h, sub.start_line))
        .map(Hunk::delta)
        .sum();
    if shift == 0 {
        return Ok(Outcome::unchanged());
    }

    let moved = |line: usize| (line as isize + shift).max(1) as usize;
    Ok(Outcome {
        trigger: None,
        proposal: Some(Proposal {
            subscription_id: sub.id.clone(),
            old_path: sub.path.clone(),
            old_start: sub.start_line,
            old_end: sub.end_line,
            new_path: sub.path.clone(),
            new_start: moved(sub.start_line),
            new_end: moved(sub.end_line),
            reasons: vec!["line_shift".to_string()],
            confidence: Confidence::High,
            new_qualname: None,
            new_kind: None,
        }),
    })
}
