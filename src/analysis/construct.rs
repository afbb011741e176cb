//! Construct model produced by language indexers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of construct (variable, field, method, function, class, interface, enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructKind {
    Variable,
    Field,
    Method,
    Function,
    Class,
    Interface,
    Enum,
}

impl ConstructKind {
    /// Convert to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructKind::Variable => "variable",
            ConstructKind::Field => "field",
            ConstructKind::Method => "method",
            ConstructKind::Function => "function",
            ConstructKind::Class => "class",
            ConstructKind::Interface => "interface",
            ConstructKind::Enum => "enum",
        }
    }

    /// Check if this is a callable (function or method).
    pub fn is_callable(&self) -> bool {
        matches!(self, ConstructKind::Function | ConstructKind::Method)
    }

    /// Check if this is a type-like kind that can have bases and members.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            ConstructKind::Class | ConstructKind::Interface | ConstructKind::Enum
        )
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConstructKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "variable" => Ok(ConstructKind::Variable),
            "field" => Ok(ConstructKind::Field),
            "method" => Ok(ConstructKind::Method),
            "function" => Ok(ConstructKind::Function),
            "class" => Ok(ConstructKind::Class),
            "interface" => Ok(ConstructKind::Interface),
            "enum" => Ok(ConstructKind::Enum),
            _ => Err(format!("unknown construct kind: {}", s)),
        }
    }
}

/// One parsed, fingerprintable unit of code at one (file, revision).
///
/// Constructs are created fresh every time a file is indexed and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Construct {
    /// Repository-relative file path.
    pub path: String,
    pub kind: ConstructKind,
    /// Dot-scoped name; callables in overloading languages append a
    /// normalized parameter-type signature (`Type.add(int,int)`).
    pub qualname: String,
    /// Optional tag such as `const`, `constructor` or `enum_constant`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// First line (1-indexed), including leading decorators/annotations.
    pub start_line: usize,
    /// Last line (1-indexed, inclusive).
    pub end_line: usize,
    /// Line of the defining keyword.
    pub definition_line: usize,
    pub interface_hash: String,
    pub body_hash: String,
    pub has_parse_error: bool,
    /// Simple base-name tokens, populated for class/interface/enum only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub base_classes: Vec<String>,
    /// Language-level visibility (Java `private`, Python `_name`).
    #[serde(default)]
    pub private: bool,
}

impl Construct {
    /// The last dotted segment of the qualname (signature included).
    pub fn simple_name(&self) -> &str {
        let scope_end = self.qualname.find('(').unwrap_or(self.qualname.len());
        match self.qualname[..scope_end].rfind('.') {
            Some(idx) => &self.qualname[idx + 1..],
            None => &self.qualname,
        }
    }

    /// Qualname of the enclosing scope, if any.
    pub fn parent_qualname(&self) -> Option<&str> {
        let scope_end = self.qualname.find('(').unwrap_or(self.qualname.len());
        self.qualname[..scope_end]
            .rfind('.')
            .map(|idx| &self.qualname[..idx])
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}:{}-{})",
            self.kind, self.qualname, self.path, self.start_line, self.end_line
        )
    }
}
