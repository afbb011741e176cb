//! Python language indexer using tree-sitter.

use tree_sitter::{Language, Node, Parser};

use crate::analysis::fingerprint::{self, compact, erase_generics};
use crate::analysis::{
    Construct, ConstructKind, FileIndex, ImportBinding, ImportMap, LanguageIndexer, ParsedFile,
    TypeLocation,
};

/// Python nests by indentation, so block extents are marked in token streams.
const SCOPE_KINDS: &[&str] = &["block"];

/// Base names that make a class an enum.
const ENUM_BASES: &[&str] = &["Enum", "IntEnum", "StrEnum", "Flag", "IntFlag", "ReprEnum"];

static CONTAINER_KINDS: &[ConstructKind] = &[ConstructKind::Class, ConstructKind::Enum];

pub struct PythonIndexer {
    language: Language,
}

impl PythonIndexer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
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
            .ok_or_else(|| anyhow::anyhow!("failed to parse Python source: {}", path))?;

        Ok(ParsedFile {
            tree,
            source: source.as_bytes().to_vec(),
            path: path.to_string(),
        })
    }

    fn tokens(&self, parsed: &ParsedFile, node: Node) -> String {
        fingerprint::node_tokens(node, &parsed.source, SCOPE_KINDS)
    }

    /// Walk the statements of a module or class body.
    fn visit_body(
        &self,
        parsed: &ParsedFile,
        body: Node,
        scope: Option<&str>,
        out: &mut Vec<Construct>,
    ) {
        let mut cursor = body.walk();
        for stmt in body.named_children(&mut cursor) {
            match stmt.kind() {
                "function_definition" => self.push_function(parsed, stmt, stmt, scope, out),
                "class_definition" => self.push_class(parsed, stmt, stmt, scope, out),
                "decorated_definition" => {
                    if let Some(def) = stmt.child_by_field_name("definition") {
                        match def.kind() {
                            "function_definition" => {
                                self.push_function(parsed, stmt, def, scope, out)
                            }
                            "class_definition" => self.push_class(parsed, stmt, def, scope, out),
                            _ => {}
                        }
                    }
                }
                "expression_statement" => self.push_assignment(parsed, stmt, scope, out),
                _ => {}
            }
        }
    }

    fn decorators(&self, parsed: &ParsedFile, outer: Node) -> Vec<String> {
        if outer.kind() != "decorated_definition" {
            return Vec::new();
        }
        let mut cursor = outer.walk();
        outer
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "decorator")
            .map(|n| self.tokens(parsed, n))
            .collect()
    }

    fn push_function(
        &self,
        parsed: &ParsedFile,
        outer: Node,
        def: Node,
        scope: Option<&str>,
        out: &mut Vec<Construct>,
    ) {
        let name = match def.child_by_field_name("name") {
            Some(n) => parsed.node_text(n).to_string(),
            None => return,
        };
        let kind = if scope.is_some() {
            ConstructKind::Method
        } else {
            ConstructKind::Function
        };

        let params = def
            .child_by_field_name("parameters")
            .map(|p| self.normalize_params(parsed, p))
            .unwrap_or_default();

        let mut annotation = Vec::new();
        let mut cursor = def.walk();
        if def.children(&mut cursor).any(|c| c.kind() == "async") {
            annotation.push("async".to_string());
        }
        if let Some(type_params) = def.child_by_field_name("type_parameters") {
            annotation.push(self.tokens(parsed, type_params));
        }
        if let Some(ret) = def.child_by_field_name("return_type") {
            annotation.push(format!("-> {}", self.tokens(parsed, ret)));
        }
        let annotation = annotation.join(" ");

        let decorators = self.decorators(parsed, outer);
        let body = def
            .child_by_field_name("body")
            .map(|b| self.tokens(parsed, b));

        out.push(Construct {
            path: parsed.path.clone(),
            kind,
            qualname: scoped(scope, &name),
            role: None,
            start_line: outer.start_position().row + 1,
            end_line: outer.end_position().row + 1,
            definition_line: def.start_position().row + 1,
            interface_hash: fingerprint::interface_hash(
                kind.as_str(),
                Some(annotation.as_str()),
                &decorators,
                &params,
            ),
            body_hash: fingerprint::body_hash(body.as_deref()),
            has_parse_error: outer.has_error(),
            base_classes: Vec::new(),
            private: self.is_private_name(&name),
        });
    }

    /// Parameter entries with names stripped; types, defaults, order and
    /// variadic markers kept.
    fn normalize_params(&self, parsed: &ParsedFile, params: Node) -> Vec<String> {
        let mut entries = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let entry = match param.kind() {
                "identifier" => "_".to_string(),
                "list_splat_pattern" => "*_".to_string(),
                "dictionary_splat_pattern" => "**_".to_string(),
                "keyword_separator" => "*".to_string(),
                "positional_separator" => "/".to_string(),
                "tuple_pattern" => "(_)".to_string(),
                "typed_parameter" => {
                    let marker = param
                        .named_child(0)
                        .map(|n| match n.kind() {
                            "list_splat_pattern" => "*_",
                            "dictionary_splat_pattern" => "**_",
                            _ => "_",
                        })
                        .unwrap_or("_");
                    let ty = param
                        .child_by_field_name("type")
                        .map(|t| self.tokens(parsed, t))
                        .unwrap_or_default();
                    format!("{}:{}", marker, ty)
                }
                "default_parameter" => {
                    let value = param
                        .child_by_field_name("value")
                        .map(|v| self.tokens(parsed, v))
                        .unwrap_or_default();
                    format!("_={}", value)
                }
                "typed_default_parameter" => {
                    let ty = param
                        .child_by_field_name("type")
                        .map(|t| self.tokens(parsed, t))
                        .unwrap_or_default();
                    let value = param
                        .child_by_field_name("value")
                        .map(|v| self.tokens(parsed, v))
                        .unwrap_or_default();
                    format!("_:{}={}", ty, value)
                }
                _ => continue,
            };
            entries.push(entry);
        }
        entries
    }

    fn push_class(
        &self,
        parsed: &ParsedFile,
        outer: Node,
        def: Node,
        scope: Option<&str>,
        out: &mut Vec<Construct>,
    ) {
        let name = match def.child_by_field_name("name") {
            Some(n) => parsed.node_text(n).to_string(),
            None => return,
        };
        let qualname = scoped(scope, &name);

        let mut base_entries = Vec::new();
        let mut base_classes = Vec::new();
        if let Some(args) = def.child_by_field_name("superclasses") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                match arg.kind() {
                    "comment" | "list_splat" | "dictionary_splat" => {}
                    "keyword_argument" => {
                        base_entries.push(format!("kw:{}", compact(parsed.node_text(arg))))
                    }
                    _ => {
                        let text = compact(parsed.node_text(arg));
                        base_classes.push(erase_generics(&text));
                        base_entries.push(text);
                    }
                }
            }
        }

        let kind = if base_classes.iter().any(|b| is_enum_base(b)) {
            ConstructKind::Enum
        } else {
            ConstructKind::Class
        };

        let mut annotation = String::new();
        if let Some(type_params) = def.child_by_field_name("type_parameters") {
            annotation = self.tokens(parsed, type_params);
        }
        let decorators = self.decorators(parsed, outer);
        let body = def.child_by_field_name("body");

        out.push(Construct {
            path: parsed.path.clone(),
            kind,
            qualname: qualname.clone(),
            role: None,
            start_line: outer.start_position().row + 1,
            end_line: outer.end_position().row + 1,
            definition_line: def.start_position().row + 1,
            interface_hash: fingerprint::interface_hash(
                kind.as_str(),
                Some(annotation.as_str()),
                &decorators,
                &base_entries,
            ),
            body_hash: fingerprint::body_hash(body.map(|b| self.tokens(parsed, b)).as_deref()),
            has_parse_error: outer.has_error(),
            base_classes,
            private: self.is_private_name(&name),
        });

        if let Some(body) = body {
            self.visit_body(parsed, body, Some(&qualname), out);
        }
    }

    fn push_assignment(
        &self,
        parsed: &ParsedFile,
        stmt: Node,
        scope: Option<&str>,
        out: &mut Vec<Construct>,
    ) {
        let assignment = match stmt.named_child(0) {
            Some(n) if n.kind() == "assignment" => n,
            _ => return,
        };
        let name = match assignment.child_by_field_name("left") {
            Some(left) if left.kind() == "identifier" => parsed.node_text(left).to_string(),
            _ => return,
        };
        let kind = if scope.is_some() {
            ConstructKind::Field
        } else {
            ConstructKind::Variable
        };

        let annotation = assignment
            .child_by_field_name("type")
            .map(|t| self.tokens(parsed, t));
        let value = assignment
            .child_by_field_name("right")
            .map(|v| self.tokens(parsed, v));

        let is_const = name.chars().any(|c| c.is_ascii_alphabetic())
            && !name.chars().any(|c| c.is_lowercase());

        out.push(Construct {
            path: parsed.path.clone(),
            kind,
            qualname: scoped(scope, &name),
            role: is_const.then(|| "const".to_string()),
            start_line: stmt.start_position().row + 1,
            end_line: stmt.end_position().row + 1,
            definition_line: stmt.start_position().row + 1,
            interface_hash: fingerprint::interface_hash(
                kind.as_str(),
                annotation.as_deref(),
                &[],
                &[],
            ),
            body_hash: fingerprint::body_hash(value.as_deref()),
            has_parse_error: stmt.has_error(),
            base_classes: Vec::new(),
            private: self.is_private_name(&name),
        });
    }

    fn collect_imports(&self, parsed: &ParsedFile, node: Node, imports: &mut ImportMap) {
        match node.kind() {
            "import_statement" => self.process_import(parsed, node, imports),
            "import_from_statement" => self.process_from_import(parsed, node, imports),
            "function_definition" | "class_definition" => {}
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.collect_imports(parsed, child, imports);
                }
            }
        }
    }

    /// `import a.b`, `import a.b as m`
    fn process_import(&self, parsed: &ParsedFile, node: Node, imports: &mut ImportMap) {
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            match name.kind() {
                "dotted_name" => {
                    let module = compact(parsed.node_text(name));
                    if let Some(first) = module.split('.').next() {
                        imports
                            .entry(first.to_string())
                            .or_insert_with(|| ImportBinding::module(first));
                    }
                    imports.insert(module.clone(), ImportBinding::module(module));
                }
                "aliased_import" => {
                    let module = name.child_by_field_name("name");
                    let alias = name.child_by_field_name("alias");
                    if let (Some(module), Some(alias)) = (module, alias) {
                        imports.insert(
                            parsed.node_text(alias).to_string(),
                            ImportBinding::module(compact(parsed.node_text(module))),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    /// `from m import A, B as C`, `from .pkg import x`; star imports add nothing.
    fn process_from_import(&self, parsed: &ParsedFile, node: Node, imports: &mut ImportMap) {
        let module = match node.child_by_field_name("module_name") {
            Some(m) => compact(parsed.node_text(m)),
            None => return,
        };

        let mut cursor = node.walk();
        if node
            .named_children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import")
        {
            return;
        }

        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            match name.kind() {
                "dotted_name" => {
                    let original = compact(parsed.node_text(name));
                    imports.insert(
                        original.clone(),
                        ImportBinding::member(module.clone(), original),
                    );
                }
                "aliased_import" => {
                    let original = name.child_by_field_name("name");
                    let alias = name.child_by_field_name("alias");
                    if let (Some(original), Some(alias)) = (original, alias) {
                        imports.insert(
                            parsed.node_text(alias).to_string(),
                            ImportBinding::member(
                                module.clone(),
                                compact(parsed.node_text(original)),
                            ),
                        );
                    }
                }
                _ => {}
            }
        }
    }
}

impl Default for PythonIndexer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageIndexer for PythonIndexer {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn container_kinds(&self) -> &'static [ConstructKind] {
        CONTAINER_KINDS
    }

    fn analyze(&self, source: &str, path: &str) -> anyhow::Result<FileIndex> {
        let parsed = self.parse(source, path)?;
        let mut constructs = Vec::new();
        self.visit_body(&parsed, parsed.tree.root_node(), None, &mut constructs);

        let mut imports = ImportMap::new();
        self.collect_imports(&parsed, parsed.tree.root_node(), &mut imports);

        Ok(FileIndex {
            path: path.to_string(),
            language: self.language_id().to_string(),
            constructs,
            imports,
            syntax_error: parsed.syntax_error(),
        })
    }

    fn is_private_name(&self, name: &str) -> bool {
        name.starts_with('_') && !(name.starts_with("__") && name.ends_with("__"))
    }

    /// Constructors are never inherited.
    fn override_key(&self, relative_id: &str, _member: &Construct) -> Option<String> {
        match relative_id {
            "__init__" | "__new__" => None,
            _ => Some(relative_id.to_string()),
        }
    }

    fn import_targets(
        &self,
        binding: &ImportBinding,
        rest: &[&str],
        from_path: &str,
        files: &[String],
    ) -> Vec<TypeLocation> {
        let module = match absolute_module(&binding.module, from_path) {
            Some(m) => m,
            None => return Vec::new(),
        };

        let mut targets = Vec::new();
        match &binding.name {
            Some(name) => {
                let mut qualname = vec![name.as_str()];
                qualname.extend_from_slice(rest);
                for file in module_files(&module, files) {
                    targets.push(TypeLocation::new(file, qualname.join(".")));
                }
                // `from pkg import models` then `models.User`
                if !rest.is_empty() {
                    let submodule = join_module(&module, name);
                    for file in module_files(&submodule, files) {
                        targets.push(TypeLocation::new(file, rest.join(".")));
                    }
                }
            }
            None => {
                if !rest.is_empty() {
                    for file in module_files(&module, files) {
                        targets.push(TypeLocation::new(file, rest.join(".")));
                    }
                }
            }
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

fn is_enum_base(base: &str) -> bool {
    let last = base.rsplit('.').next().unwrap_or(base);
    ENUM_BASES.contains(&last)
}

fn join_module(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", module, name)
    }
}

/// Turn a (possibly relative) module reference into an absolute dotted path.
fn absolute_module(module: &str, from_path: &str) -> Option<String> {
    let dots = module.chars().take_while(|c| *c == '.').count();
    if dots == 0 {
        return Some(module.to_string());
    }
    let remainder = &module[dots..];
    let mut package: Vec<&str> = from_path.split('/').collect();
    package.pop(); // the file itself
    let up = dots - 1;
    if up > package.len() {
        return None;
    }
    package.truncate(package.len() - up);
    if !remainder.is_empty() {
        package.push(remainder);
    }
    Some(package.join("."))
}

/// Files implementing a dotted module. Exact repository-root matches win;
/// otherwise a unique path-suffix match (e.g. under `src/`) is accepted.
fn module_files(module: &str, files: &[String]) -> Vec<String> {
    if module.is_empty() {
        return Vec::new();
    }
    let rel = module.replace('.', "/");
    let candidates = [
        format!("{}.py", rel),
        format!("{}/__init__.py", rel),
        format!("{}.pyi", rel),
    ];

    let mut found = Vec::new();
    for candidate in &candidates {
        if files.iter().any(|f| f == candidate) {
            found.push(candidate.clone());
            continue;
        }
        let suffix = format!("/{}", candidate);
        let matches: Vec<_> = files.iter().filter(|f| f.ends_with(&suffix)).collect();
        if matches.len() == 1 {
            found.push(matches[0].clone());
        }
    }
    found
}
