//! Change detection for subscriptions.

mod container;
mod detector;
mod inheritance;
mod lines;
mod runner;
mod subscription;
mod types;

pub use container::{diff_container, member_fingerprints};
pub use detector::Detector;
pub use inheritance::{Ancestor, InheritanceResolver, Propagator};
pub use lines::{evaluate_lines, is_above, overlaps};
pub use runner::Scanner;
pub use subscription::{
    apply_proposal, create_line_subscription, create_semantic_subscription, semantic_target,
    ContainerOptions,
};
pub use types::*;
