//! Subscriptions file schema.
//!
//! A subscriptions file lists the watched constructs/line ranges for one
//! repository plus the scan policy.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::detect::Subscription;

/// Top-level subscriptions document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SubscriptionsFile {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    #[serde(default)]
    pub policy: ScanPolicy,
    /// Glob patterns for paths never searched for moved constructs
    /// (e.g., "**/vendor/**", "tests/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

/// Knobs for inheritance propagation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanPolicy {
    /// Ancestor traversal bound.
    pub max_inheritance_depth: usize,
    /// Whether changes to private ancestor members reach subclasses.
    pub propagate_private_members: bool,
    /// Disable to skip ancestor resolution entirely.
    pub track_inheritance: bool,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            max_inheritance_depth: 10,
            propagate_private_members: true,
            track_inheritance: true,
        }
    }
}

impl SubscriptionsFile {
    /// Parse and validate a subscriptions file from YAML.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        let file: SubscriptionsFile = serde_yaml::from_str(content)?;
        validate(&file)?;
        Ok(file)
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Compiled matcher for `excluded_paths`.
    pub fn excluded_matcher(&self) -> anyhow::Result<GlobSet> {
        build_globset(&self.excluded_paths)
    }

    pub fn subscription_mut(&mut self, id: &str) -> Option<&mut Subscription> {
        self.subscriptions.iter_mut().find(|s| s.id == id)
    }

    /// Insert or replace a subscription by id.
    pub fn upsert(&mut self, subscription: Subscription) {
        match self
            .subscriptions
            .iter()
            .position(|s| s.id == subscription.id)
        {
            Some(i) => self.subscriptions[i] = subscription,
            None => self.subscriptions.push(subscription),
        }
    }
}

pub fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn validate(file: &SubscriptionsFile) -> anyhow::Result<()> {
    let mut ids = HashSet::new();
    for sub in &file.subscriptions {
        if sub.id.is_empty() {
            anyhow::bail!("subscription for {:?} has an empty id", sub.path);
        }
        if !ids.insert(sub.id.as_str()) {
            anyhow::bail!("duplicate subscription id {:?}", sub.id);
        }
        if sub.start_line == 0 || sub.start_line > sub.end_line {
            anyhow::bail!(
                "subscription {:?} has invalid line range {}-{}",
                sub.id,
                sub.start_line,
                sub.end_line
            );
        }
    }
    if file.policy.max_inheritance_depth == 0 && file.policy.track_inheritance {
        anyhow::bail!("policy.max_inheritance_depth must be at least 1");
    }
    build_globset(&file.excluded_paths)?;
    Ok(())
}
