//! Output formatting for scan results.
//!
//! Two formats:
//! - Pretty: colored terminal output for humans
//! - JSON: the serialized [`ScanResult`] for tooling

use colored::*;

use crate::detect::{ChangeType, Confidence, Proposal, ScanIssue, ScanResult, Trigger};

/// Render results as pretty-printed JSON.
pub fn render_json(result: &ScanResult) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Write results in JSON format to stdout.
pub fn write_json(result: &ScanResult) -> anyhow::Result<()> {
    println!("{}", render_json(result)?);
    Ok(())
}

/// Write results with colors for terminal display.
pub fn write_pretty(root: &str, result: &ScanResult) {
    println!();
    print!("  ");
    print!("{}", "codesub".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Repository: ".dimmed());
    println!("{}", root);
    print!("  {}", "Base:       ".dimmed());
    println!("{}", describe_ref(&result.base_ref, &result.base_revision));
    print!("  {}", "Target:     ".dimmed());
    println!("{}", describe_ref(&result.target_ref, &result.target_revision));
    println!();

    write_summary(result);
    println!();

    if !result.triggers.is_empty() {
        write_triggers(&result.triggers);
    }

    if !result.proposals.is_empty() {
        write_proposals(&result.proposals);
    }

    if !result.errors.is_empty() {
        write_errors(&result.errors);
    }
}

fn describe_ref(reference: &str, revision: &str) -> String {
    if reference == revision {
        reference.to_string()
    } else {
        format!("{} ({})", reference, revision)
    }
}

fn write_summary(result: &ScanResult) {
    if result.has_triggers() {
        print!("  {}", "✗ CHANGED".red());
    } else {
        print!("  {}", "✓ CLEAN".green());
    }
    print!(
        "  triggers: {}  proposals: {}  unchanged: {}",
        result.triggers.len(),
        result.proposals.len(),
        result.unchanged.len()
    );
    if !result.errors.is_empty() {
        print!("  {}", format!("errors: {}", result.errors.len()).red());
    }
    println!();
}

fn write_triggers(triggers: &[Trigger]) {
    println!("  {} ({}):", "Triggers".bold(), triggers.len());
    println!();

    for t in triggers {
        write_change_tag(t.change_type);
        print!("{:<24}", t.subscription_id);
        print!("{}", t.path.blue());
        println!("{}", format!(":{}-{}", t.start_line, t.end_line).dimmed());
        println!("            {}", t.reasons.join(", "));

        if let Some(message) = &t.details.parse_error {
            println!("            {}", message.dimmed());
        }
        if let Some(changes) = &t.details.container_changes {
            if let (Some(old), Some(new)) = (&changes.old_qualname, &changes.new_qualname) {
                println!("            {}", format!("renamed {} -> {}", old, new).dimmed());
            }
            for id in &changes.members_added {
                println!("            {} {}", "+".green(), id);
            }
            for id in &changes.members_removed {
                println!("            {} {}", "-".red(), id);
            }
            for member in &changes.members_changed {
                println!(
                    "            {} {} ({:?})",
                    "~".yellow(),
                    member.id,
                    member.change_type
                );
            }
        }
        for inherited in &t.details.inherited_changes {
            println!(
                "            {}",
                format!(
                    "{}.{} ({}) in {}",
                    inherited.origin_class,
                    inherited.member,
                    inherited.change_type,
                    inherited.origin_path
                )
                .dimmed()
            );
        }
        for candidate in &t.details.candidates {
            println!(
                "            {}",
                format!(
                    "candidate {} {}:{}-{}",
                    candidate.qualname, candidate.path, candidate.start_line, candidate.end_line
                )
                .dimmed()
            );
        }
        println!();
    }
}

fn write_change_tag(change_type: ChangeType) {
    let tag = format!("{:<12}", change_type.as_str());
    match change_type {
        ChangeType::Missing | ChangeType::Structural => print!("    {} ", tag.red()),
        ChangeType::Content | ChangeType::Aggregate => print!("    {} ", tag.yellow()),
        ChangeType::Ambiguous | ChangeType::ParseError => print!("    {} ", tag.magenta()),
    }
}

fn write_proposals(proposals: &[Proposal]) {
    println!("  {} ({}):", "Proposals".bold(), proposals.len());
    println!();

    for p in proposals {
        let confidence = match p.confidence {
            Confidence::High => "high  ".green(),
            Confidence::Medium => "medium".yellow(),
            Confidence::Low => "low   ".red(),
        };
        print!("    {} ", confidence);
        print!("{:<24}", p.subscription_id);
        println!(
            "{}:{}-{} -> {}:{}-{}",
            p.old_path, p.old_start, p.old_end, p.new_path, p.new_start, p.new_end
        );
        let mut reasons = p.reasons.join(", ");
        if let Some(qualname) = &p.new_qualname {
            reasons.push_str(&format!(" (now {})", qualname));
        }
        println!("            {}", reasons.dimmed());
    }
    println!();
}

fn write_errors(errors: &[ScanIssue]) {
    println!("  {} ({}):", "Errors".red().bold(), errors.len());
    for e in errors {
        println!("    {:<24}{}", e.subscription_id, e.message);
    }
    println!();
}
