//! Member-level diffing of containers against a stored baseline.

use crate::analysis::{relative_id, Construct, LanguageIndexer};

use super::{
    BaselineMembers, ContainerChanges, MemberChange, MemberChangeType, MemberFingerprint,
    SemanticTarget,
};

/// Fingerprints of a container's direct members keyed by relative id.
pub fn member_fingerprints(
    indexer: &dyn LanguageIndexer,
    constructs: &[Construct],
    container_qualname: &str,
    include_private: bool,
) -> BaselineMembers {
    indexer
        .members_of(constructs, container_qualname, include_private)
        .into_iter()
        .filter_map(|m| {
            let id = relative_id(&m.qualname, container_qualname)?.to_string();
            Some((
                id,
                MemberFingerprint {
                    kind: m.kind,
                    interface_hash: m.interface_hash,
                    body_hash: m.body_hash,
                },
            ))
        })
        .collect()
}

/// Compare the located container with the subscription's baseline.
///
/// `current` comes from [`member_fingerprints`] on the located container.
/// Member ids are relative, so renaming the container alone never shows up
/// as added/removed members.
pub fn diff_container(
    target: &SemanticTarget,
    container: &Construct,
    current: &BaselineMembers,
) -> ContainerChanges {
    let mut changes = ContainerChanges::default();

    let baseline_qualname = target
        .baseline_container_qualname
        .as_deref()
        .unwrap_or(&target.qualname);
    if container.qualname != baseline_qualname {
        changes.renamed = true;
        changes.old_qualname = Some(baseline_qualname.to_string());
        changes.new_qualname = Some(container.qualname.clone());
    }

    if target.track_decorators && container.interface_hash != target.interface_hash {
        changes.interface_changed = true;
    }

    for (id, baseline) in &target.baseline_members {
        match current.get(id) {
            None => changes.members_removed.push(id.clone()),
            Some(now) if now.interface_hash != baseline.interface_hash => {
                changes.members_changed.push(MemberChange {
                    id: id.clone(),
                    change_type: MemberChangeType::Structural,
                })
            }
            Some(now) if now.body_hash != baseline.body_hash => {
                changes.members_changed.push(MemberChange {
                    id: id.clone(),
                    change_type: MemberChangeType::Content,
                })
            }
            Some(_) => {}
        }
    }

    changes.members_added = current
        .keys()
        .filter(|id| !target.baseline_members.contains_key(*id))
        .cloned()
        .collect();

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ConstructKind, LanguageIndexer, PythonIndexer};
    use crate::detect::FINGERPRINT_VERSION;
    use pretty_assertions::assert_eq;

    const BASE: &str = r#"
class User:
    name = "x"

    def validate(self):
        return True

    def _secret(self):
        return 1
"#;

    fn target_for(source: &str, qualname: &str, include_private: bool) -> SemanticTarget {
        let indexer = PythonIndexer::new();
        let index = indexer.analyze(source, "m.py").unwrap();
        let container = index.lookup(qualname, None).into_unique().unwrap();
        SemanticTarget {
            language: "python".to_string(),
            kind: container.kind,
            qualname: container.qualname.clone(),
            role: None,
            interface_hash: container.interface_hash.clone(),
            body_hash: container.body_hash.clone(),
            fingerprint_version: FINGERPRINT_VERSION,
            include_members: true,
            include_private,
            track_decorators: true,
            baseline_members: member_fingerprints(
                &indexer,
                &index.constructs,
                qualname,
                include_private,
            ),
            baseline_container_qualname: Some(container.qualname.clone()),
        }
    }

    fn diff(target: &SemanticTarget, source: &str, qualname: &str) -> ContainerChanges {
        let indexer = PythonIndexer::new();
        let index = indexer.analyze(source, "m.py").unwrap();
        let container = index.lookup(qualname, None).into_unique().unwrap();
        let current = member_fingerprints(
            &indexer,
            &index.constructs,
            qualname,
            target.include_private,
        );
        diff_container(target, &container, &current)
    }

    #[test]
    fn test_unchanged_container_is_empty() {
        let target = target_for(BASE, "User", false);
        assert!(diff(&target, BASE, "User").is_empty());
    }

    #[test]
    fn test_added_removed_and_changed_members() {
        let target = target_for(BASE, "User", false);
        let edited = r#"
class User:
    age = 0

    def validate(self, strict: bool):
        return True
"#;
        let changes = diff(&target, edited, "User");
        assert_eq!(changes.members_added, vec!["age".to_string()]);
        assert_eq!(changes.members_removed, vec!["name".to_string()]);
        assert_eq!(
            changes.members_changed,
            vec![MemberChange {
                id: "validate".to_string(),
                change_type: MemberChangeType::Structural,
            }]
        );
        assert!(!changes.renamed);
    }

    #[test]
    fn test_rename_produces_no_member_noise() {
        let target = target_for(BASE, "User", false);
        let renamed = BASE.replace("class User:", "class UserAccount:");
        let changes = diff(&target, &renamed, "UserAccount");
        assert!(changes.renamed);
        assert_eq!(changes.old_qualname.as_deref(), Some("User"));
        assert_eq!(changes.new_qualname.as_deref(), Some("UserAccount"));
        assert!(changes.members_added.is_empty());
        assert!(changes.members_removed.is_empty());
        assert!(changes.members_changed.is_empty());
        assert_eq!(changes.reasons(), vec!["container_renamed"]);
    }

    #[test]
    fn test_private_members_follow_flag() {
        let public = target_for(BASE, "User", false);
        assert!(!public.baseline_members.contains_key("_secret"));

        let all = target_for(BASE, "User", true);
        assert_eq!(all.baseline_members["_secret"].kind, ConstructKind::Method);

        let edited = BASE.replace("return 1", "return 2");
        assert!(diff(&public, &edited, "User").is_empty());
        assert_eq!(diff(&all, &edited, "User").members_changed.len(), 1);
    }

    #[test]
    fn test_decorator_change_on_container() {
        let target = target_for(BASE, "User", false);
        let decorated = BASE.replace("class User:", "@dataclass\nclass User:");
        let changes = diff(&target, &decorated, "User");
        assert!(changes.interface_changed);
        assert_eq!(changes.reasons(), vec!["container_interface_changed"]);
    }
}
