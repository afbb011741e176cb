//! Command-line interface for codesub.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::analysis::{get_indexer_for_path, ConstructKind};
use crate::config::SubscriptionsFile;
use crate::detect::{
    apply_proposal, create_line_subscription, create_semantic_subscription, ContainerOptions,
    Scanner,
};
use crate::repo::SnapshotRepository;
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Subscriptions file looked up under the repository root.
const DEFAULT_SUBSCRIPTIONS: &str = "codesub.yaml";

/// Code subscriptions - know when the code you depend on changes.
///
/// Subscribe to functions, classes, fields or line ranges, then scan two
/// revisions to see which subscriptions were touched, moved or removed.
#[derive(Parser)]
#[command(name = "codesub")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare two revisions and report triggered subscriptions
    #[command(visible_alias = "check")]
    Scan(ScanArgs),
    /// Print the constructs found in a source file
    Index(IndexArgs),
    /// Add or replace a subscription
    Subscribe(SubscribeArgs),
}

/// Arguments for the scan command.
#[derive(Parser)]
pub struct ScanArgs {
    /// Snapshot root; each revision is a directory under it
    pub root: PathBuf,

    /// Base revision
    #[arg(short, long)]
    pub base: String,

    /// Target revision
    #[arg(short, long)]
    pub target: String,

    /// Subscriptions file (default: <root>/codesub.yaml)
    #[arg(short, long)]
    pub subscriptions: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Re-sync subscriptions to the proposed locations and save the file
    #[arg(long)]
    pub apply: bool,
}

/// Arguments for the index command.
#[derive(Parser)]
pub struct IndexArgs {
    /// Source file to index
    pub file: PathBuf,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Arguments for the subscribe command.
#[derive(Parser)]
pub struct SubscribeArgs {
    /// Snapshot root; each revision is a directory under it
    pub root: PathBuf,

    /// Revision the subscription is taken at
    #[arg(short, long)]
    pub rev: String,

    /// Repository-relative file path
    #[arg(short, long)]
    pub path: String,

    /// Subscription id
    #[arg(long)]
    pub id: String,

    /// Subscriptions file (default: <root>/codesub.yaml)
    #[arg(short, long)]
    pub subscriptions: Option<PathBuf>,

    #[command(flatten)]
    pub target: SubscribeTarget,

    /// Track the members of a class, interface or enum
    #[arg(long, requires = "qualname")]
    pub members: bool,

    /// Include private members when tracking members
    #[arg(long, requires = "members")]
    pub include_private: bool,

    /// Report decorator/annotation changes on the container itself
    #[arg(long, requires = "members")]
    pub track_decorators: bool,

    /// Construct kind, to disambiguate equal qualnames
    #[arg(long, requires = "qualname")]
    pub kind: Option<ConstructKind>,

    /// Optional human label
    #[arg(long)]
    pub label: Option<String>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct SubscribeTarget {
    /// Qualified construct name, e.g. User.validate
    #[arg(long)]
    pub qualname: Option<String>,

    /// Line range A-B (1-based, inclusive)
    #[arg(long)]
    pub lines: Option<String>,
}

fn subscriptions_path(root: &Path, explicit: &Option<PathBuf>) -> PathBuf {
    explicit
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_SUBSCRIPTIONS))
}

/// Parse `A-B` into an inclusive line range.
pub fn parse_line_range(s: &str) -> anyhow::Result<(usize, usize)> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("expected a line range like 10-20, got {:?}", s))?;
    let start: usize = start.trim().parse()?;
    let end: usize = end.trim().parse()?;
    if start == 0 || start > end {
        anyhow::bail!("invalid line range {}-{}", start, end);
    }
    Ok((start, end))
}

/// Run the scan command.
pub fn run_scan(args: &ScanArgs) -> anyhow::Result<i32> {
    let path = subscriptions_path(&args.root, &args.subscriptions);
    let mut config = match SubscriptionsFile::parse_file(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error parsing subscriptions {}: {}", path.display(), e);
            return Ok(EXIT_ERROR);
        }
    };

    let repo = SnapshotRepository::new(&args.root);
    let scanner = Scanner::from_config(&repo, &config)?;
    let result = match scanner.scan(&config.subscriptions, &args.base, &args.target) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    match args.format.as_str() {
        "json" => report::write_json(&result)?,
        _ => report::write_pretty(&args.root.to_string_lossy(), &result),
    }

    if args.apply && !result.proposals.is_empty() {
        let mut applied = 0;
        for proposal in &result.proposals {
            let Some(sub) = config.subscription_mut(&proposal.subscription_id) else {
                continue;
            };
            match apply_proposal(sub, proposal, &repo, &result.target_revision) {
                Ok(()) => applied += 1,
                Err(e) => warn!(id = %proposal.subscription_id, error = %e, "proposal not applied"),
            }
        }
        config.write_file(&path)?;
        eprintln!("Applied {} proposal(s) to {}", applied, path.display());
    }

    if result.has_triggers() {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the index command.
pub fn run_index(args: &IndexArgs) -> anyhow::Result<i32> {
    let display = args.file.to_string_lossy().replace('\\', "/");
    let Some(indexer) = get_indexer_for_path(&display) else {
        eprintln!("Error: no indexer handles {}", display);
        return Ok(EXIT_ERROR);
    };
    let source = std::fs::read_to_string(&args.file)?;
    let index = indexer.analyze(&source, &display)?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&index.constructs)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("  {} ({})", display.blue(), index.language.dimmed());
    if let Some(error) = &index.syntax_error {
        println!(
            "  {}",
            format!("parse error at line {}: {}", error.line, error.message).red()
        );
    }
    println!();
    for c in &index.constructs {
        print!("    {:<10}", c.kind.as_str().dimmed());
        print!("{:<40}", c.qualname);
        print!("{}", format!("{}-{}", c.start_line, c.end_line).dimmed());
        if let Some(role) = &c.role {
            print!("  {}", role.yellow());
        }
        println!();
    }
    Ok(EXIT_SUCCESS)
}

/// Run the subscribe command.
pub fn run_subscribe(args: &SubscribeArgs) -> anyhow::Result<i32> {
    let path = subscriptions_path(&args.root, &args.subscriptions);
    let mut config = if path.exists() {
        SubscriptionsFile::parse_file(&path)?
    } else {
        SubscriptionsFile {
            version: "1".to_string(),
            ..Default::default()
        }
    };

    let repo = SnapshotRepository::new(&args.root);
    let result = match (&args.target.qualname, &args.target.lines) {
        (Some(qualname), _) => {
            let options = ContainerOptions {
                include_members: args.members,
                include_private: args.include_private,
                track_decorators: args.track_decorators,
            };
            create_semantic_subscription(
                &repo,
                &args.rev,
                &args.path,
                qualname,
                args.kind,
                args.id.clone(),
                options,
            )
        }
        (None, Some(lines)) => parse_line_range(lines)
            .and_then(|(start, end)| create_line_subscription(args.id.clone(), &args.path, start, end)),
        (None, None) => Err(anyhow::anyhow!("either --qualname or --lines is required")),
    };

    let mut subscription = match result {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    subscription.label = args.label.clone();

    println!(
        "Subscribed {} to {}:{}-{}",
        subscription.id.bold(),
        subscription.path,
        subscription.start_line,
        subscription.end_line
    );
    config.upsert(subscription);
    config.write_file(&path)?;
    Ok(EXIT_SUCCESS)
}
