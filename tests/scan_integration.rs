//! Integration tests for the full scan pipeline.
//!
//! Each scenario builds two revisions in a `MemoryRepository`, subscribes at
//! the first and scans against the second.

use codesub::analysis::ConstructKind;
use codesub::detect::{
    create_line_subscription, create_semantic_subscription, ChangeType, Confidence,
    ContainerOptions, ScanResult, Scanner, Subscription,
};
use codesub::{apply_proposal, MemoryRepository, ScanError, ScanPolicy};
use pretty_assertions::assert_eq;

const MODELS: &str = r#"class User:
    name = "anon"

    def validate(self):
        return len(self.name) > 0

    def greet(self):
        return "hi " + self.name
"#;

const ADMIN: &str = r#"from models import User


class Admin(User):
    level = 1
"#;

fn repo_with(base: &[(&str, &str)], target: &[(&str, &str)]) -> MemoryRepository {
    let mut repo = MemoryRepository::new();
    repo.insert_revision("v1", base.iter().copied());
    repo.insert_revision("v2", target.iter().copied());
    repo.set_alias("HEAD", "v2");
    repo
}

fn subscribe(repo: &MemoryRepository, id: &str, path: &str, qualname: &str) -> Subscription {
    create_semantic_subscription(
        repo,
        "v1",
        path,
        qualname,
        None,
        id,
        ContainerOptions::default(),
    )
    .expect("subscription should be created")
}

fn subscribe_container(repo: &MemoryRepository, id: &str, path: &str, qualname: &str) -> Subscription {
    let options = ContainerOptions {
        include_members: true,
        ..Default::default()
    };
    create_semantic_subscription(repo, "v1", path, qualname, None, id, options)
        .expect("container subscription should be created")
}

fn scan(repo: &MemoryRepository, subs: &[Subscription]) -> ScanResult {
    Scanner::new(repo)
        .scan(subs, "v1", "HEAD")
        .expect("scan should succeed")
}

#[test]
fn test_method_body_edit_is_content() {
    let edited = MODELS.replace("len(self.name) > 0", "len(self.name) > 1");
    let repo = repo_with(&[("models.py", MODELS)], &[("models.py", &edited)]);
    let subs = vec![
        subscribe(&repo, "validate", "models.py", "User.validate"),
        subscribe(&repo, "greet", "models.py", "User.greet"),
    ];

    let result = scan(&repo, &subs);
    assert_eq!(result.triggers.len(), 1);
    let trigger = &result.triggers[0];
    assert_eq!(trigger.subscription_id, "validate");
    assert_eq!(trigger.change_type, ChangeType::Content);
    assert_eq!(trigger.reasons, vec!["body_changed"]);
    assert_eq!(result.unchanged, vec!["greet"]);
    assert!(result.proposals.is_empty());
}

#[test]
fn test_whitespace_and_comments_do_not_trigger() {
    let edited = MODELS.replace(
        "        return len(self.name) > 0",
        "        return len( self.name )  >  0  # must not be empty",
    );
    let repo = repo_with(&[("models.py", MODELS)], &[("models.py", &edited)]);
    let subs = vec![subscribe(&repo, "validate", "models.py", "User.validate")];

    let result = scan(&repo, &subs);
    assert!(result.triggers.is_empty());
    assert_eq!(result.unchanged, vec!["validate"]);
}

#[test]
fn test_added_member_is_aggregate() {
    let edited = MODELS.replace("    name = \"anon\"\n", "    name = \"anon\"\n    age = 0\n");
    let repo = repo_with(&[("models.py", MODELS)], &[("models.py", &edited)]);
    let subs = vec![subscribe_container(&repo, "user", "models.py", "User")];

    let result = scan(&repo, &subs);
    let trigger = result.trigger_for("user").expect("container should trigger");
    assert_eq!(trigger.change_type, ChangeType::Aggregate);
    assert_eq!(trigger.reasons, vec!["members_added"]);
    let changes = trigger.details.container_changes.as_ref().unwrap();
    assert_eq!(changes.members_added, vec!["age".to_string()]);
    assert!(changes.members_removed.is_empty());
    assert!(changes.members_changed.is_empty());
}

#[test]
fn test_container_rename_reports_once() {
    let edited = MODELS.replace("class User:", "class UserAccount:");
    let repo = repo_with(&[("models.py", MODELS)], &[("models.py", &edited)]);
    let subs = vec![subscribe_container(&repo, "user", "models.py", "User")];

    let result = scan(&repo, &subs);
    assert_eq!(result.triggers.len(), 1);
    let trigger = &result.triggers[0];
    assert_eq!(trigger.change_type, ChangeType::Aggregate);
    let changes = trigger.details.container_changes.as_ref().unwrap();
    assert!(changes.renamed);
    assert!(changes.members_added.is_empty());
    assert!(changes.members_removed.is_empty());

    let proposal = result.proposal_for("user").expect("rename should be proposed");
    assert_eq!(proposal.new_qualname.as_deref(), Some("UserAccount"));
    assert_eq!(proposal.confidence, Confidence::High);
}

#[test]
fn test_inherited_change_reaches_subclass() {
    let edited = MODELS.replace("len(self.name) > 0", "bool(self.name)");
    let repo = repo_with(
        &[("models.py", MODELS), ("admin.py", ADMIN)],
        &[("models.py", &edited), ("admin.py", ADMIN)],
    );
    let subs = vec![subscribe(&repo, "admin", "admin.py", "Admin")];

    let result = scan(&repo, &subs);
    let trigger = result.trigger_for("admin").expect("inherited change should trigger");
    assert_eq!(trigger.change_type, ChangeType::Content);
    assert_eq!(trigger.reasons, vec!["inherited_body_changed"]);
    let inherited = &trigger.details.inherited_changes;
    assert_eq!(inherited.len(), 1);
    assert_eq!(inherited[0].origin_class, "User");
    assert_eq!(inherited[0].origin_path, "models.py");
    assert_eq!(inherited[0].member, "validate");
}

#[test]
fn test_override_blocks_inherited_change() {
    let admin = format!("{}\n    def validate(self):\n        return True\n", ADMIN);
    let edited = MODELS.replace("len(self.name) > 0", "bool(self.name)");
    let repo = repo_with(
        &[("models.py", MODELS), ("admin.py", &admin)],
        &[("models.py", &edited), ("admin.py", &admin)],
    );
    let subs = vec![subscribe(&repo, "admin", "admin.py", "Admin")];

    let result = scan(&repo, &subs);
    assert!(result.triggers.is_empty());
    assert_eq!(result.unchanged, vec!["admin"]);
}

#[test]
fn test_inheritance_can_be_disabled() {
    let edited = MODELS.replace("len(self.name) > 0", "bool(self.name)");
    let repo = repo_with(
        &[("models.py", MODELS), ("admin.py", ADMIN)],
        &[("models.py", &edited), ("admin.py", ADMIN)],
    );
    let subs = vec![subscribe(&repo, "admin", "admin.py", "Admin")];
    let policy = ScanPolicy {
        track_inheritance: false,
        ..Default::default()
    };

    let result = Scanner::new(&repo)
        .with_policy(policy)
        .scan(&subs, "v1", "v2")
        .unwrap();
    assert!(result.triggers.is_empty());
}

#[test]
fn test_file_rename_is_high_confidence_proposal() {
    let repo = repo_with(&[("models.py", MODELS)], &[("accounts/models.py", MODELS)]);
    let mut subs = vec![subscribe(&repo, "validate", "models.py", "User.validate")];

    let result = scan(&repo, &subs);
    assert!(result.triggers.is_empty());
    let proposal = result.proposal_for("validate").expect("move should be proposed");
    assert_eq!(proposal.new_path, "accounts/models.py");
    assert_eq!(proposal.confidence, Confidence::High);
    assert_eq!(proposal.reasons, vec!["moved_cross_file"]);

    apply_proposal(&mut subs[0], proposal, &repo, "v2").unwrap();
    assert_eq!(subs[0].path, "accounts/models.py");
    let again = Scanner::new(&repo).scan(&subs, "v2", "v2").unwrap();
    assert_eq!(again.unchanged, vec!["validate"]);
}

#[test]
fn test_excluded_paths_are_not_searched() {
    let repo = repo_with(&[("models.py", MODELS)], &[("vendor/models.py", MODELS)]);
    let subs = vec![subscribe(&repo, "validate", "models.py", "User.validate")];
    let excluded = codesub::config::build_globset(&["vendor/**".to_string()]).unwrap();

    let result = Scanner::new(&repo)
        .with_excluded(excluded)
        .scan(&subs, "v1", "v2")
        .unwrap();
    let trigger = result.trigger_for("validate").unwrap();
    assert_eq!(trigger.change_type, ChangeType::Missing);
    assert_eq!(trigger.reasons, vec!["file_deleted"]);
}

#[test]
fn test_identical_revisions_are_unchanged() {
    let repo = repo_with(&[("models.py", MODELS)], &[("models.py", "")]);
    let subs = vec![
        subscribe(&repo, "validate", "models.py", "User.validate"),
        create_line_subscription("lines", "models.py", 1, 3).unwrap(),
    ];

    let result = Scanner::new(&repo).scan(&subs, "v1", "v1").unwrap();
    assert_eq!(result.unchanged, vec!["validate", "lines"]);
    assert!(result.triggers.is_empty());
    assert!(result.proposals.is_empty());
}

#[test]
fn test_results_are_deterministic() {
    let edited = MODELS.replace("\"hi \"", "\"hello \"");
    let repo = repo_with(&[("models.py", MODELS)], &[("models.py", &edited)]);
    let subs: Vec<_> = ["User", "User.validate", "User.greet", "User.name"]
        .iter()
        .enumerate()
        .map(|(i, q)| subscribe(&repo, &format!("s{}", i), "models.py", q))
        .collect();

    let first = scan(&repo, &subs);
    for _ in 0..5 {
        assert_eq!(scan(&repo, &subs), first);
    }
    let ids: Vec<_> = first.triggers.iter().map(|t| t.subscription_id.as_str()).collect();
    assert_eq!(ids, vec!["s0", "s2"]);
}

#[test]
fn test_field_value_change_is_content() {
    let edited = MODELS.replace("\"anon\"", "\"guest\"");
    let repo = repo_with(&[("models.py", MODELS)], &[("models.py", &edited)]);
    let subs = vec![subscribe(&repo, "name", "models.py", "User.name")];

    let trigger = scan(&repo, &subs).triggers.remove(0);
    assert_eq!(trigger.change_type, ChangeType::Content);
}

#[test]
fn test_deleted_method_is_missing() {
    let edited = MODELS.replace(
        "    def greet(self):\n        return \"hi \" + self.name\n",
        "",
    );
    let repo = repo_with(&[("models.py", MODELS)], &[("models.py", &edited)]);
    let subs = vec![subscribe(&repo, "greet", "models.py", "User.greet")];

    let trigger = scan(&repo, &subs).triggers.remove(0);
    assert_eq!(trigger.change_type, ChangeType::Missing);
    assert_eq!(trigger.reasons, vec!["construct_missing"]);
}

#[test]
fn test_constructor_edit_is_not_inherited() {
    let models = "class User:\n    def __init__(self):\n        self.x = 1\n";
    let edited = models.replace("self.x = 1", "self.x = 2");
    let repo = repo_with(
        &[("models.py", models), ("admin.py", ADMIN)],
        &[("models.py", &edited), ("admin.py", ADMIN)],
    );
    let subs = vec![subscribe(&repo, "admin", "admin.py", "Admin")];

    let result = scan(&repo, &subs);
    assert!(result.triggers.is_empty());
    assert_eq!(result.unchanged, vec!["admin"]);
}

const CHAIN_A: &str = "class A:\n    def run(self):\n        return 1\n\n    def stop(self):\n        return 0\n";
const CHAIN_B: &str = "from a import A\n\n\nclass B(A):\n    def run(self):\n        return 2\n";
const CHAIN_C: &str = "from b import B\n\n\nclass C(B):\n    level = 1\n";

#[test]
fn test_intermediate_override_hides_ancestor_change() {
    let edited = CHAIN_A.replace("return 1", "return 10");
    let repo = repo_with(
        &[("a.py", CHAIN_A), ("b.py", CHAIN_B), ("c.py", CHAIN_C)],
        &[("a.py", &edited), ("b.py", CHAIN_B), ("c.py", CHAIN_C)],
    );
    let subs = vec![subscribe(&repo, "c", "c.py", "C")];

    let result = scan(&repo, &subs);
    assert!(result.triggers.is_empty());

    // a member B does not override still reaches C
    let edited = CHAIN_A.replace("return 0", "return -1");
    let repo = repo_with(
        &[("a.py", CHAIN_A), ("b.py", CHAIN_B), ("c.py", CHAIN_C)],
        &[("a.py", &edited), ("b.py", CHAIN_B), ("c.py", CHAIN_C)],
    );
    let result = scan(&repo, &subs);
    let trigger = result.trigger_for("c").expect("stop is inherited through B");
    let inherited = &trigger.details.inherited_changes;
    assert_eq!(inherited.len(), 1);
    assert_eq!(inherited[0].origin_class, "A");
    assert_eq!(inherited[0].member, "stop");
}

#[test]
fn test_located_construct_ignores_fingerprint_twin() {
    let source = "def f(x):\n    return x + 1\n";
    let edited = "def f(x):\n    return x + 2\n\n\ndef g(x):\n    return x + 1\n";
    let repo = repo_with(&[("m.py", source)], &[("m.py", edited)]);
    let subs = vec![subscribe(&repo, "f", "m.py", "f")];

    let result = scan(&repo, &subs);
    let trigger = result.trigger_for("f").expect("body edit should trigger");
    assert_eq!(trigger.change_type, ChangeType::Content);
    assert_eq!(trigger.reasons, vec!["body_changed"]);
    assert!(trigger.details.candidates.is_empty());
    assert!(result.proposals.is_empty());
}

#[test]
fn test_parse_error_at_base_revision() {
    let clean = "def f():\n    return 1\n";
    let mut repo = MemoryRepository::new();
    repo.insert_revision("v0", [("m.py", clean)]);
    repo.insert_revision("v1", [("m.py", "def f():\n    return (1\n")]);
    repo.insert_revision("v2", [("m.py", clean)]);
    let subs = vec![create_semantic_subscription(
        &repo,
        "v0",
        "m.py",
        "f",
        None,
        "f",
        ContainerOptions::default(),
    )
    .unwrap()];

    let result = Scanner::new(&repo).scan(&subs, "v1", "v2").unwrap();
    let trigger = result.trigger_for("f").expect("broken base should trigger");
    assert_eq!(trigger.change_type, ChangeType::ParseError);
    assert_eq!(trigger.reasons, vec!["parse_error"]);
    let message = trigger.details.parse_error.as_deref().unwrap();
    assert!(message.contains("v1"), "{}", message);
}

const BASE_JAVA: &str = r#"package app;

public class Base {
    public void run(int times) {
        System.out.println(times);
    }
}
"#;

#[test]
fn test_java_overload_does_not_block_inherited_change() {
    let child = r#"package app;

public class Child extends Base {
    public void run(String label) {
        System.out.println(label);
    }
}
"#;
    let edited = BASE_JAVA.replace("println(times)", "println(times * 2)");
    let repo = repo_with(
        &[("app/Base.java", BASE_JAVA), ("app/Child.java", child)],
        &[("app/Base.java", &edited), ("app/Child.java", child)],
    );
    let subs = vec![subscribe(&repo, "child", "app/Child.java", "Child")];

    let result = scan(&repo, &subs);
    let trigger = result.trigger_for("child").expect("overload is not an override");
    assert_eq!(trigger.details.inherited_changes[0].member, "run(int)");
}

#[test]
fn test_java_override_blocks_inherited_change() {
    let child = r#"package app;

public class Child extends Base {
    @Override
    public void run(int times) {
        System.out.println("child");
    }
}
"#;
    let edited = BASE_JAVA.replace("println(times)", "println(times * 2)");
    let repo = repo_with(
        &[("app/Base.java", BASE_JAVA), ("app/Child.java", child)],
        &[("app/Base.java", &edited), ("app/Child.java", child)],
    );
    let subs = vec![subscribe(&repo, "child", "app/Child.java", "Child")];

    assert!(scan(&repo, &subs).triggers.is_empty());
}

#[test]
fn test_java_overloads_are_distinct_subscriptions() {
    let calc = r#"class Calc {
    int add(int a, int b) { return a + b; }
    double add(double a, double b) { return a + b; }
}
"#;
    let edited = calc.replace("double a, double b) { return a + b;", "double a, double b) { return b + a;");
    let repo = repo_with(&[("Calc.java", calc)], &[("Calc.java", &edited)]);
    let ints = create_semantic_subscription(
        &repo,
        "v1",
        "Calc.java",
        "Calc.add(int,int)",
        Some(ConstructKind::Method),
        "ints",
        ContainerOptions::default(),
    )
    .unwrap();
    let doubles = subscribe(&repo, "doubles", "Calc.java", "Calc.add(double,double)");

    let result = scan(&repo, &[ints, doubles]);
    assert_eq!(result.triggers.len(), 1);
    assert_eq!(result.triggers[0].subscription_id, "doubles");
}

#[test]
fn test_invalid_revision_is_fatal() {
    let repo = repo_with(&[("models.py", MODELS)], &[("models.py", MODELS)]);
    let subs = vec![subscribe(&repo, "validate", "models.py", "User.validate")];

    let err = Scanner::new(&repo).scan(&subs, "v0", "v2").unwrap_err();
    assert!(matches!(err, ScanError::Revision { which: "base", .. }));
}

#[test]
fn test_unknown_language_is_reported_per_subscription() {
    let repo = repo_with(&[("models.py", MODELS)], &[("models.py", MODELS)]);
    let mut broken = subscribe(&repo, "broken", "models.py", "User.validate");
    if let Some(target) = broken.semantic.as_mut() {
        target.language = "cobol".to_string();
    }
    let fine = subscribe(&repo, "fine", "models.py", "User.greet");

    let result = scan(&repo, &[broken, fine]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].subscription_id, "broken");
    assert_eq!(result.unchanged, vec!["fine"]);
}

#[test]
fn test_line_subscription_shift_and_overlap() {
    let base = "a\nb\nc\nd\ne\n";
    let target = "new\na\nb\nC\nd\ne\n";
    let repo = repo_with(&[("notes.txt", base)], &[("notes.txt", target)]);
    let subs = vec![
        create_line_subscription("top", "notes.txt", 1, 2).unwrap(),
        create_line_subscription("mid", "notes.txt", 3, 3).unwrap(),
    ];

    let result = scan(&repo, &subs);
    let trigger = result.trigger_for("mid").unwrap();
    assert_eq!(trigger.reasons, vec!["overlap_hunk"]);
    let proposal = result.proposal_for("top").unwrap();
    assert_eq!((proposal.new_start, proposal.new_end), (2, 3));
}
