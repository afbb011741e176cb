//! Qualname lookup and container membership over construct lists.

use super::{Construct, ConstructKind};

/// Result of resolving a qualname within one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Construct),
    NotFound,
    /// More than one construct shares the qualname; never resolved by picking one.
    Ambiguous(Vec<Construct>),
}

impl Lookup {
    pub fn from_matches(mut matches: Vec<Construct>) -> Self {
        match matches.len() {
            0 => Lookup::NotFound,
            1 => Lookup::Found(matches.remove(0)),
            _ => Lookup::Ambiguous(matches),
        }
    }

    pub fn into_unique(self) -> Option<Construct> {
        match self {
            Lookup::Found(c) => Some(c),
            _ => None,
        }
    }
}

/// Resolve a qualname, optionally restricted to one kind.
pub fn lookup(constructs: &[Construct], qualname: &str, kind: Option<ConstructKind>) -> Lookup {
    let matches = constructs
        .iter()
        .filter(|c| c.qualname == qualname && kind.map_or(true, |k| c.kind == k))
        .cloned()
        .collect();
    Lookup::from_matches(matches)
}

/// Member qualname relative to its container (`User.validate` -> `validate`).
///
/// Returns `None` when `qualname` is not inside `container_qualname`.
pub fn relative_id<'a>(qualname: &'a str, container_qualname: &str) -> Option<&'a str> {
    qualname
        .strip_prefix(container_qualname)
        .and_then(|rest| rest.strip_prefix('.'))
        .filter(|rest| !rest.is_empty())
}

/// Whether a relative id names a direct member (no further scope nesting).
///
/// Dots inside a callable signature (`save(java.util.List)`) are not scopes.
pub fn is_direct(relative: &str) -> bool {
    let scope = relative.split('(').next().unwrap_or(relative);
    !scope.contains('.')
}

/// Direct members of a container, ordered by position then qualname.
///
/// The result depends only on the set of constructs passed in, not on
/// their order.
pub fn direct_members(constructs: &[Construct], container_qualname: &str) -> Vec<Construct> {
    let mut members: Vec<Construct> = constructs
        .iter()
        .filter(|c| relative_id(&c.qualname, container_qualname).map_or(false, is_direct))
        .cloned()
        .collect();
    members.sort_by(|a, b| {
        (a.start_line, &a.qualname, a.kind).cmp(&(b.start_line, &b.qualname, b.kind))
    });
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    fn construct(qualname: &str, kind: ConstructKind, line: usize) -> Construct {
        Construct {
            path: "m.py".to_string(),
            kind,
            qualname: qualname.to_string(),
            role: None,
            start_line: line,
            end_line: line,
            definition_line: line,
            interface_hash: "i".to_string(),
            body_hash: "b".to_string(),
            has_parse_error: false,
            base_classes: Vec::new(),
            private: false,
        }
    }

    fn sample() -> Vec<Construct> {
        vec![
            construct("User", ConstructKind::Class, 1),
            construct("User.name", ConstructKind::Field, 2),
            construct("User.Meta", ConstructKind::Class, 3),
            construct("User.Meta.table", ConstructKind::Field, 4),
            construct("User.validate", ConstructKind::Method, 5),
            construct("UserAdmin.run", ConstructKind::Method, 9),
        ]
    }

    #[test]
    fn test_relative_id() {
        assert_eq!(relative_id("User.validate", "User"), Some("validate"));
        assert_eq!(relative_id("UserAdmin.run", "User"), None);
        assert_eq!(relative_id("User", "User"), None);
    }

    #[test]
    fn test_direct_members_exclude_nested_members() {
        let members = direct_members(&sample(), "User");
        let names: Vec<_> = members.iter().map(|m| m.qualname.as_str()).collect();
        assert_eq!(names, vec!["User.name", "User.Meta", "User.validate"]);
    }

    #[test]
    fn test_direct_members_order_independent_and_idempotent() {
        let mut reversed = sample();
        reversed.reverse();
        let a = direct_members(&sample(), "User");
        let b = direct_members(&reversed, "User");
        assert_eq!(a, b);
        assert_eq!(direct_members(&a, "User"), a);
    }

    #[test]
    fn test_signature_dots_are_not_scopes() {
        assert!(is_direct("save(java.util.List<String>)"));
        assert!(!is_direct("Inner.save(int)"));
    }

    #[test]
    fn test_lookup_reports_ambiguity() {
        let mut constructs = sample();
        constructs.push(construct("User.validate", ConstructKind::Method, 7));
        assert!(matches!(
            lookup(&constructs, "User.validate", None),
            Lookup::Ambiguous(ref v) if v.len() == 2
        ));
        assert!(matches!(
            lookup(&constructs, "User.name", Some(ConstructKind::Field)),
            Lookup::Found(_)
        ));
        assert_eq!(
            lookup(&constructs, "User.name", Some(ConstructKind::Method)),
            Lookup::NotFound
        );
    }
}
