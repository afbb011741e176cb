//! Java language indexer using tree-sitter.

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::fingerprint::{self, compact, erase_generics};
use crate::analysis::{
    Construct, ConstructKind, FileIndex, ImportBinding, ImportMap, LanguageIndexer, ParsedFile,
    TypeLocation,
};

/// Tree-sitter query for extracting imports.
const IMPORT_QUERY: &str = r#"
; import com.package.Class;
; import static com.package.Class.member;
(import_declaration
  (scoped_identifier) @import_path
) @import
"#;

static CONTAINER_KINDS: &[ConstructKind] = &[
    ConstructKind::Class,
    ConstructKind::Interface,
    ConstructKind::Enum,
];

/// Modifier keywords and annotations of one declaration.
#[derive(Debug, Default)]
struct Modifiers {
    keywords: Vec<String>,
    annotations: Vec<String>,
}

impl Modifiers {
    fn has(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }
}

pub struct JavaIndexer {
    language: Language,
}

impl JavaIndexer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    fn parse(&self, source: &str, path: &str) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Java source: {}", path))?;

        Ok(ParsedFile {
            tree,
            source: source.as_bytes().to_vec(),
            path: path.to_string(),
        })
    }

    fn tokens(&self, parsed: &ParsedFile, node: Node) -> String {
        fingerprint::node_tokens(node, &parsed.source, &[])
    }

    fn modifiers(&self, parsed: &ParsedFile, node: Node) -> Modifiers {
        let mut modifiers = Modifiers::default();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "modifiers" {
                continue;
            }
            let mut inner = child.walk();
            for modifier in child.children(&mut inner) {
                match modifier.kind() {
                    "annotation" | "marker_annotation" => {
                        modifiers.annotations.push(self.tokens(parsed, modifier))
                    }
                    "line_comment" | "block_comment" => {}
                    _ => modifiers
                        .keywords
                        .push(parsed.node_text(modifier).to_string()),
                }
            }
        }
        modifiers
    }

    /// Walk a compilation unit or type body.
    fn visit_declarations(
        &self,
        parsed: &ParsedFile,
        parent: Node,
        scope: Option<&str>,
        out: &mut Vec<Construct>,
    ) {
        let mut cursor = parent.walk();
        for child in parent.named_children(&mut cursor) {
            match (child.kind(), scope) {
                (
                    "class_declaration" | "record_declaration" | "interface_declaration"
                    | "enum_declaration",
                    _,
                ) => self.push_type(parsed, child, scope, out),
                ("method_declaration" | "constructor_declaration", Some(scope)) => {
                    self.push_method(parsed, child, scope, out)
                }
                ("field_declaration" | "constant_declaration", Some(scope)) => {
                    self.push_fields(parsed, child, scope, out)
                }
                ("enum_constant", Some(scope)) => self.push_enum_constant(parsed, child, scope, out),
                ("enum_body_declarations", _) => {
                    self.visit_declarations(parsed, child, scope, out)
                }
                _ => {}
            }
        }
    }

    fn push_type(
        &self,
        parsed: &ParsedFile,
        node: Node,
        scope: Option<&str>,
        out: &mut Vec<Construct>,
    ) {
        let name = match node.child_by_field_name("name") {
            Some(n) => parsed.node_text(n).to_string(),
            None => return,
        };
        let qualname = scoped(scope, &name);
        let kind = match node.kind() {
            "interface_declaration" => ConstructKind::Interface,
            "enum_declaration" => ConstructKind::Enum,
            _ => ConstructKind::Class,
        };
        let modifiers = self.modifiers(parsed, node);

        let mut base_entries = Vec::new();
        let mut base_classes = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let (label, types) = match child.kind() {
                "superclass" => ("extends", child),
                "super_interfaces" => ("implements", child),
                "extends_interfaces" => ("extends", child),
                _ => continue,
            };
            for ty in type_references(types) {
                let text = compact(parsed.node_text(ty));
                base_classes.push(erase_generics(&text));
                base_entries.push(format!("{}:{}", label, text));
            }
        }

        let mut annotation = modifiers.keywords.clone();
        if let Some(type_params) = node.child_by_field_name("type_parameters") {
            annotation.push(self.tokens(parsed, type_params));
        }
        if node.kind() == "record_declaration" {
            if let Some(components) = node.child_by_field_name("parameters") {
                annotation.push(self.tokens(parsed, components));
            }
        }
        let annotation = annotation.join(" ");

        let body = node.child_by_field_name("body");
        out.push(Construct {
            path: parsed.path.clone(),
            kind,
            qualname: qualname.clone(),
            role: None,
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            definition_line: keyword_line(node, &["class", "interface", "enum", "record"]),
            interface_hash: fingerprint::interface_hash(
                kind.as_str(),
                Some(annotation.as_str()),
                &modifiers.annotations,
                &base_entries,
            ),
            body_hash: fingerprint::body_hash(body.map(|b| self.tokens(parsed, b)).as_deref()),
            has_parse_error: node.has_error(),
            base_classes,
            private: modifiers.has("private"),
        });

        if let Some(body) = body {
            self.visit_declarations(parsed, body, Some(&qualname), out);
        }
    }

    /// Returns (hash entries, signature types) for a parameter list.
    /// Names are dropped; modifiers only feed the hash entries.
    fn normalize_params(&self, parsed: &ParsedFile, params: Node) -> (Vec<String>, Vec<String>) {
        let mut entries = Vec::new();
        let mut signature = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let ty = match param.kind() {
                "formal_parameter" => {
                    let mut ty = param
                        .child_by_field_name("type")
                        .map(|t| compact(parsed.node_text(t)))
                        .unwrap_or_default();
                    if let Some(dims) = param.child_by_field_name("dimensions") {
                        ty.push_str(&compact(parsed.node_text(dims)));
                    }
                    ty
                }
                "spread_parameter" => {
                    let mut inner = param.walk();
                    let ty = param
                        .named_children(&mut inner)
                        .find(|n| !matches!(n.kind(), "modifiers" | "variable_declarator"))
                        .map(|t| compact(parsed.node_text(t)))
                        .unwrap_or_default();
                    format!("{}...", ty)
                }
                _ => continue,
            };
            let modifiers = self.modifiers(parsed, param);
            let mut entry = modifiers.annotations.clone();
            entry.extend(modifiers.keywords);
            entry.push(ty.clone());
            entries.push(entry.join(" "));
            signature.push(ty);
        }
        (entries, signature)
    }

    fn push_method(&self, parsed: &ParsedFile, node: Node, scope: &str, out: &mut Vec<Construct>) {
        let name = match node.child_by_field_name("name") {
            Some(n) => n,
            None => return,
        };
        let is_constructor = node.kind() == "constructor_declaration";
        let modifiers = self.modifiers(parsed, node);

        let (params, signature) = node
            .child_by_field_name("parameters")
            .map(|p| self.normalize_params(parsed, p))
            .unwrap_or_default();

        let mut annotation = modifiers.keywords.clone();
        if let Some(type_params) = node.child_by_field_name("type_parameters") {
            annotation.push(self.tokens(parsed, type_params));
        }
        if let Some(ret) = node.child_by_field_name("type") {
            annotation.push(self.tokens(parsed, ret));
        }
        if let Some(dims) = node.child_by_field_name("dimensions") {
            annotation.push(self.tokens(parsed, dims));
        }
        let mut cursor = node.walk();
        if let Some(throws) = node.named_children(&mut cursor).find(|c| c.kind() == "throws") {
            annotation.push(self.tokens(parsed, throws));
        }
        let annotation = annotation.join(" ");

        let body = node
            .child_by_field_name("body")
            .map(|b| self.tokens(parsed, b));

        out.push(Construct {
            path: parsed.path.clone(),
            kind: ConstructKind::Method,
            qualname: format!(
                "{}.{}({})",
                scope,
                parsed.node_text(name),
                signature.join(",")
            ),
            role: is_constructor.then(|| "constructor".to_string()),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            definition_line: name.start_position().row + 1,
            interface_hash: fingerprint::interface_hash(
                ConstructKind::Method.as_str(),
                Some(annotation.as_str()),
                &modifiers.annotations,
                &params,
            ),
            body_hash: fingerprint::body_hash(body.as_deref()),
            has_parse_error: node.has_error(),
            base_classes: Vec::new(),
            private: modifiers.has("private"),
        });
    }

    /// One field construct per declarator (`int a, b;` gives two).
    fn push_fields(&self, parsed: &ParsedFile, node: Node, scope: &str, out: &mut Vec<Construct>) {
        let modifiers = self.modifiers(parsed, node);
        let in_interface = node.kind() == "constant_declaration";
        let is_const = in_interface || (modifiers.has("static") && modifiers.has("final"));
        let ty = node
            .child_by_field_name("type")
            .map(|t| self.tokens(parsed, t))
            .unwrap_or_default();

        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let name = match declarator.child_by_field_name("name") {
                Some(n) => parsed.node_text(n).to_string(),
                None => continue,
            };
            let mut annotation = modifiers.keywords.clone();
            annotation.push(ty.clone());
            if let Some(dims) = declarator.child_by_field_name("dimensions") {
                annotation.push(self.tokens(parsed, dims));
            }
            let annotation = annotation.join(" ");
            let value = declarator
                .child_by_field_name("value")
                .map(|v| self.tokens(parsed, v));

            out.push(Construct {
                path: parsed.path.clone(),
                kind: ConstructKind::Field,
                qualname: format!("{}.{}", scope, name),
                role: is_const.then(|| "const".to_string()),
                start_line: node.start_position().row + 1,
                end_line: node.end_position().row + 1,
                definition_line: declarator.start_position().row + 1,
                interface_hash: fingerprint::interface_hash(
                    ConstructKind::Field.as_str(),
                    Some(annotation.as_str()),
                    &modifiers.annotations,
                    &[],
                ),
                body_hash: fingerprint::body_hash(value.as_deref()),
                has_parse_error: node.has_error(),
                base_classes: Vec::new(),
                private: modifiers.has("private"),
            });
        }
    }

    fn push_enum_constant(
        &self,
        parsed: &ParsedFile,
        node: Node,
        scope: &str,
        out: &mut Vec<Construct>,
    ) {
        let name = match node.child_by_field_name("name") {
            Some(n) => parsed.node_text(n).to_string(),
            None => return,
        };
        let modifiers = self.modifiers(parsed, node);
        let parts: Vec<String> = ["arguments", "body"]
            .iter()
            .filter_map(|field| node.child_by_field_name(field))
            .map(|n| self.tokens(parsed, n))
            .collect();
        let body = (!parts.is_empty()).then(|| parts.join(" "));

        out.push(Construct {
            path: parsed.path.clone(),
            kind: ConstructKind::Field,
            qualname: format!("{}.{}", scope, name),
            role: Some("enum_constant".to_string()),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            definition_line: node.start_position().row + 1,
            interface_hash: fingerprint::interface_hash(
                ConstructKind::Field.as_str(),
                Some("enum_constant"),
                &modifiers.annotations,
                &[],
            ),
            body_hash: fingerprint::body_hash(body.as_deref()),
            has_parse_error: node.has_error(),
            base_classes: Vec::new(),
            private: false,
        });
    }

    fn collect_imports(&self, parsed: &ParsedFile) -> anyhow::Result<ImportMap> {
        let query = Query::new(&self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut imports = ImportMap::new();
        while let Some(m) = matches.next() {
            let mut path = None;
            let mut import_node = None;
            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "import_path" => path = Some(parsed.node_text(capture.node)),
                    "import" => import_node = Some(capture.node),
                    _ => {}
                }
            }

            let (path, node) = match (path, import_node) {
                (Some(p), Some(n)) => (compact(p), n),
                _ => continue,
            };
            let mut inner = node.walk();
            if node.children(&mut inner).any(|c| c.kind() == "asterisk") {
                continue;
            }
            if let Some((module, name)) = path.rsplit_once('.') {
                imports.insert(name.to_string(), ImportBinding::member(module, name));
            }
        }
        Ok(imports)
    }
}

impl Default for JavaIndexer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageIndexer for JavaIndexer {
    fn language_id(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn container_kinds(&self) -> &'static [ConstructKind] {
        CONTAINER_KINDS
    }

    fn analyze(&self, source: &str, path: &str) -> anyhow::Result<FileIndex> {
        let parsed = self.parse(source, path)?;
        let mut constructs = Vec::new();
        self.visit_declarations(&parsed, parsed.tree.root_node(), None, &mut constructs);
        let imports = self.collect_imports(&parsed)?;

        Ok(FileIndex {
            path: path.to_string(),
            language: self.language_id().to_string(),
            constructs,
            imports,
            syntax_error: parsed.syntax_error(),
        })
    }

    /// Constructors are never inherited.
    fn override_key(&self, relative_id: &str, member: &Construct) -> Option<String> {
        if member.has_role("constructor") {
            None
        } else {
            Some(relative_id.to_string())
        }
    }

    fn import_targets(
        &self,
        binding: &ImportBinding,
        rest: &[&str],
        _from_path: &str,
        files: &[String],
    ) -> Vec<TypeLocation> {
        let mut segments: Vec<&str> = binding.module.split('.').collect();
        if let Some(name) = &binding.name {
            segments.push(name);
        }
        segments.extend_from_slice(rest);
        qualified_targets(&segments, files)
    }

    /// Same-package types first, then fully qualified references.
    fn unimported_targets(&self, name: &str, from_path: &str, files: &[String]) -> Vec<TypeLocation> {
        let segments: Vec<&str> = name.split('.').collect();
        let mut targets = Vec::new();

        let dir = from_path.rsplit_once('/').map(|(d, _)| d);
        let file = match dir {
            Some(dir) => format!("{}/{}.java", dir, segments[0]),
            None => format!("{}.java", segments[0]),
        };
        if files.iter().any(|f| *f == file) {
            targets.push(TypeLocation::new(file, name));
        }

        if segments.len() > 1 {
            targets.extend(qualified_targets(&segments, files));
        }
        targets
    }
}

fn scoped(scope: Option<&str>, name: &str) -> String {
    match scope {
        Some(s) => format!("{}.{}", s, name),
        None => name.to_string(),
    }
}

/// Type nodes listed under `superclass`, `super_interfaces` or `extends_interfaces`.
fn type_references(node: Node) -> Vec<Node> {
    let mut types = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "type_list" {
            let mut inner = child.walk();
            types.extend(child.named_children(&mut inner));
        } else {
            types.push(child);
        }
    }
    types
}

fn keyword_line(node: Node, keywords: &[&str]) -> usize {
    let mut cursor = node.walk();
    let row = node
        .children(&mut cursor)
        .find(|c| keywords.contains(&c.kind()))
        .map(|c| c.start_position().row)
        .unwrap_or_else(|| node.start_position().row);
    row + 1
}

/// Split `a.b.Outer.Inner` at every package/type boundary and keep the
/// splits whose file exists: `a/b/Outer.java` with qualname `Outer.Inner`.
fn qualified_targets(segments: &[&str], files: &[String]) -> Vec<TypeLocation> {
    let mut targets = Vec::new();
    for split in 1..=segments.len() {
        let rel = format!("{}.java", segments[..split].join("/"));
        if let Some(file) = find_file(&rel, files) {
            targets.push(TypeLocation::new(file, segments[split - 1..].join(".")));
        }
    }
    targets
}

/// Exact repository path, or a unique match under a source root
/// (`src/main/java/...`).
fn find_file(rel: &str, files: &[String]) -> Option<String> {
    if let Some(f) = files.iter().find(|f| *f == rel) {
        return Some(f.clone());
    }
    let suffix = format!("/{}", rel);
    let matches: Vec<_> = files.iter().filter(|f| f.ends_with(&suffix)).collect();
    match matches.as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    }
}
