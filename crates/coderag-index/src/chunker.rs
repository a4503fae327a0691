//! Syntax-tree chunking into whole-file and per-symbol nodes, with heuristic edge extraction.
//!
//! Everything here is a pure function of `(path, content)` so it can run on any worker.
//! Reference edges (`calls`, `uses_type`) point at unresolved `symbol:<Name>` placeholders;
//! they are resolved against concrete definitions only at query time.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{IndexError, Result};
use crate::framework::{self, ROUTE_METHODS};
use crate::languages::{Lang, NodeRole, detect_language};
use crate::types::{
    CodeNode, Edge, EntryKind, FrameworkMeta, NodeKind, Relationship, RepoMapEntry, SegmentKind,
    module_ref, symbol_ref,
};

static CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex"));

static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\b([A-Z][A-Za-z0-9_]*)\s*(?:[<>,()\[\]{};=|:?&]|$)").expect("valid regex")
});

static DEF_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:def|fn|function|func|class)\s+([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex")
});

static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid regex")
});

/// Identifiers followed by `(` that are control flow or declarations, not calls.
const NON_CALL_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "loop", "switch", "case", "catch", "match", "return",
    "fn", "def", "function", "func", "class", "new", "await", "async", "yield", "typeof",
    "sizeof", "with", "assert", "lambda", "not", "and", "or", "in", "is", "where", "impl",
    "struct", "enum", "type", "super", "self", "this", "import", "from", "export", "const", "let",
    "var", "mut", "pub", "go", "defer", "select", "range", "try", "except", "raise", "throw",
];

/// Capitalised words that are not user types.
const NON_TYPE_WORDS: &[&str] = &[
    "Self", "None", "True", "False", "Some", "Ok", "Err", "String", "Vec", "Option", "Result",
    "Box", "Arc", "Rc", "Promise", "Array", "Object", "Number", "Boolean", "Map", "Set",
    "Error", "Exception", "Any", "List", "Dict", "Tuple", "Optional", "Union", "TODO",
];

/// Input to [`extract_file`].
#[derive(Debug, Clone, Copy)]
pub struct FileInput<'a> {
    pub filepath: &'a str,
    pub source: &'a str,
    pub file_hash: &'a str,
    pub repo_id: &'a str,
}

/// Output of chunking one file.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub nodes: Vec<CodeNode>,
    pub edges: Vec<Edge>,
    pub symbols: Vec<RepoMapEntry>,
    /// `false` when the file fell back to a single text node.
    pub parsed: bool,
}

/// Parse source into a syntax tree.
///
/// # Errors
///
/// Returns error if no grammar is available or tree-sitter fails to parse.
pub fn parse(source: &str, lang: Lang) -> Result<Tree> {
    let grammar = lang.grammar().ok_or(IndexError::UnsupportedLanguage)?;

    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| IndexError::Parse(format!("set_language failed: {e}")))?;

    parser
        .parse(source, None)
        .ok_or_else(|| IndexError::Parse(format!("{} parser returned no tree", lang.id())))
}

/// Chunk one file into nodes and edges.
///
/// An empty (whitespace-only) file yields nothing. Files without a grammar, or whose
/// parse fails, yield a single `text` node.
#[must_use]
pub fn extract_file(input: &FileInput<'_>) -> Extraction {
    if input.source.trim().is_empty() {
        return Extraction::default();
    }

    let Some(lang) = detect_language(Path::new(input.filepath)) else {
        return text_only(input, None);
    };

    let tree = match parse(input.source, lang) {
        Ok(tree) => tree,
        Err(e) => {
            tracing::debug!(file = %input.filepath, error = %e, "falling back to text node");
            return text_only(input, Some(lang));
        }
    };

    let root = tree.root_node();
    let framework = framework::analyze(input.filepath, input.source, lang);
    let import_deps = extract_imports(input.source, &root, lang);

    let mut file_node = whole_file_node(input, NodeKind::File, Some(lang));
    file_node.import_deps.clone_from(&import_deps);
    file_node.framework.clone_from(&framework);

    let mut walk = Walk {
        input,
        lang,
        framework: framework.as_ref(),
        seen: HashSet::from([file_node.id.clone()]),
        symbols: Vec::new(),
    };
    walk.collect(root, None, false);

    let mut edges = Vec::new();
    for spec in &import_deps {
        edges.push(Edge::new(&file_node.id, module_ref(spec), Relationship::Imports));
    }
    for symbol in &walk.symbols {
        edges.push(Edge::new(&file_node.id, &symbol.id, Relationship::Contains));
        edges.extend(reference_edges(symbol));
    }

    let symbols = walk.symbols.iter().map(symbol_entry).collect();
    let mut nodes = Vec::with_capacity(walk.symbols.len() + 1);
    nodes.push(file_node);
    nodes.extend(walk.symbols);

    Extraction {
        nodes,
        edges,
        symbols,
        parsed: true,
    }
}

/// Repo-map entry for a symbol node.
#[must_use]
pub fn symbol_entry(node: &CodeNode) -> RepoMapEntry {
    RepoMapEntry {
        kind: EntryKind::Symbol,
        path: node.filepath.clone(),
        symbol_name: Some(node.name.clone()),
        signature: Some(node.signature().chars().take(100).collect()),
        start_line: Some(node.start_line),
        end_line: Some(node.end_line),
        importance: 0.8,
        summary: Some(node.kind.as_str().to_owned()),
    }
}

fn text_only(input: &FileInput<'_>, lang: Option<Lang>) -> Extraction {
    Extraction {
        nodes: vec![whole_file_node(input, NodeKind::Text, lang)],
        edges: Vec::new(),
        symbols: Vec::new(),
        parsed: false,
    }
}

fn file_name(filepath: &str) -> String {
    Path::new(filepath)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filepath)
        .to_owned()
}

/// Whole-file nodes span `0..=line_count`; line 0 marks file scope so the id never
/// collides with a symbol that covers the entire file.
fn whole_file_node(input: &FileInput<'_>, kind: NodeKind, lang: Option<Lang>) -> CodeNode {
    let end_line = input.source.lines().count().max(1);
    let mut properties = serde_json::Map::new();
    properties.insert(
        "language".into(),
        lang.map_or_else(|| "text".into(), |l| l.id().into()),
    );
    CodeNode {
        id: CodeNode::make_id(input.filepath, 0, end_line),
        kind,
        name: file_name(input.filepath),
        filepath: input.filepath.to_owned(),
        start_line: 0,
        end_line,
        content: input.source.to_owned(),
        properties,
        framework: None,
        import_deps: Vec::new(),
        file_hash: input.file_hash.to_owned(),
        repo_id: input.repo_id.to_owned(),
    }
}

struct Walk<'a> {
    input: &'a FileInput<'a>,
    lang: Lang,
    framework: Option<&'a FrameworkMeta>,
    seen: HashSet<String>,
    symbols: Vec<CodeNode>,
}

impl Walk<'_> {
    fn text(&self, node: Node<'_>) -> &str {
        &self.input.source[node.byte_range()]
    }

    fn collect(&mut self, parent: Node<'_>, container: Option<NodeKind>, exported: bool) {
        let mut cursor = parent.walk();
        let children: Vec<Node<'_>> = parent.named_children(&mut cursor).collect();
        for child in children {
            match self.lang.role(child.kind()) {
                NodeRole::Transparent => {
                    let exported = exported || child.kind() == "export_statement";
                    self.collect(child, container, exported);
                }
                NodeRole::Definition(kind) => self.definition(child, kind, container, exported),
                NodeRole::Binding => self.binding(child, exported),
                NodeRole::TypeGroup => self.type_group(child),
                NodeRole::Ignore => {}
            }
        }
    }

    fn definition(
        &mut self,
        node: Node<'_>,
        kind: NodeKind,
        container: Option<NodeKind>,
        exported: bool,
    ) {
        let name_node = node
            .child_by_field_name("name")
            .or_else(|| node.child_by_field_name("type"));
        let Some(name) = name_node.map(|n| self.text(n).to_owned()) else {
            return;
        };
        let exported = exported || self.is_exported(node, &name);
        if kind == NodeKind::Constant && !exported {
            return;
        }

        let kind = match (kind, container) {
            (
                NodeKind::Function,
                Some(NodeKind::Class | NodeKind::Impl | NodeKind::Trait | NodeKind::Interface),
            ) => NodeKind::Method,
            (NodeKind::Function, _) if exported && self.is_route_handler(&name) => {
                NodeKind::RouteHandler
            }
            (kind, _) => kind,
        };
        self.push(node, kind, name, exported);

        if matches!(
            kind,
            NodeKind::Class | NodeKind::Impl | NodeKind::Trait | NodeKind::Module | NodeKind::Interface
        ) && let Some(body) = node.child_by_field_name("body")
        {
            self.collect(body, Some(kind), false);
        }
    }

    fn binding(&mut self, node: Node<'_>, exported: bool) {
        let mut cursor = node.walk();
        let declarators: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "variable_declarator")
            .collect();
        for declarator in declarators {
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            if name_node.kind() != "identifier" {
                continue;
            }
            let name = self.text(name_node).to_owned();
            let is_function = declarator.child_by_field_name("value").is_some_and(|v| {
                matches!(
                    v.kind(),
                    "arrow_function" | "function_expression" | "function" | "generator_function"
                )
            });
            let kind = match (is_function, exported) {
                (true, true) if self.is_route_handler(&name) => NodeKind::RouteHandler,
                (true, _) => NodeKind::Function,
                (false, true) => NodeKind::Constant,
                (false, false) => continue,
            };
            self.push(node, kind, name, exported);
        }
    }

    fn type_group(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let specs: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|c| matches!(c.kind(), "type_spec" | "type_alias"))
            .collect();
        let single = specs.len() == 1;
        for spec in specs {
            let Some(name_node) = spec.child_by_field_name("name") else {
                continue;
            };
            let name = self.text(name_node).to_owned();
            let kind = match spec.child_by_field_name("type").map(|t| t.kind()) {
                Some("struct_type") => NodeKind::Struct,
                Some("interface_type") => NodeKind::Interface,
                _ => NodeKind::TypeAlias,
            };
            let exported = self.is_exported(spec, &name);
            self.push(if single { node } else { spec }, kind, name, exported);
        }
    }

    fn is_exported(&self, node: Node<'_>, name: &str) -> bool {
        match self.lang {
            Lang::Rust => {
                let mut cursor = node.walk();
                node.named_children(&mut cursor)
                    .any(|c| c.kind() == "visibility_modifier")
            }
            Lang::Go => name.chars().next().is_some_and(char::is_uppercase),
            Lang::Python => !name.starts_with('_'),
            _ => false,
        }
    }

    fn is_route_handler(&self, name: &str) -> bool {
        self.framework
            .is_some_and(|f| f.segment == SegmentKind::Route)
            && ROUTE_METHODS.contains(&name)
    }

    fn push(&mut self, node: Node<'_>, kind: NodeKind, name: String, exported: bool) {
        let start_line = node.start_position().row + 1;
        let end_line = node.end_position().row + 1;
        let id = CodeNode::make_id(self.input.filepath, start_line, end_line);
        if !self.seen.insert(id.clone()) {
            return;
        }

        let content = self.text(node).to_owned();
        let signature: String = content
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .chars()
            .take(200)
            .collect();
        let mut properties = serde_json::Map::new();
        properties.insert("language".into(), self.lang.id().into());
        properties.insert("signature".into(), signature.into());
        properties.insert("exported".into(), exported.into());

        self.symbols.push(CodeNode {
            id,
            kind,
            name,
            filepath: self.input.filepath.to_owned(),
            start_line,
            end_line,
            content,
            properties,
            framework: (kind == NodeKind::RouteHandler)
                .then(|| self.framework.cloned())
                .flatten(),
            import_deps: Vec::new(),
            file_hash: self.input.file_hash.to_owned(),
            repo_id: self.input.repo_id.to_owned(),
        });
    }
}

/// Heuristic `calls` and `uses_type` edges from a symbol's text, deduplicated per target.
fn reference_edges(symbol: &CodeNode) -> Vec<Edge> {
    let content = &symbol.content;
    let local_defs: HashSet<&str> = DEF_NAME_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let line_of = |offset: usize| symbol.start_line + content[..offset].matches('\n').count();

    let mut seen: HashSet<(Relationship, &str)> = HashSet::new();
    let mut edges = Vec::new();

    for caps in CALL_RE.captures_iter(content) {
        let Some(m) = caps.get(1) else { continue };
        let name = m.as_str();
        if name == symbol.name
            || local_defs.contains(name)
            || NON_CALL_KEYWORDS.contains(&name)
            || !seen.insert((Relationship::Calls, name))
        {
            continue;
        }
        edges.push(
            Edge::new(&symbol.id, symbol_ref(name), Relationship::Calls)
                .with_property("line", line_of(m.start())),
        );
    }

    for caps in TYPE_RE.captures_iter(content) {
        let Some(m) = caps.get(1) else { continue };
        let name = m.as_str();
        if name == symbol.name
            || name.len() < 2
            || name.chars().all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit())
            || NON_TYPE_WORDS.contains(&name)
            || !seen.insert((Relationship::UsesType, name))
        {
            continue;
        }
        edges.push(
            Edge::new(&symbol.id, symbol_ref(name), Relationship::UsesType)
                .with_property("line", line_of(m.start())),
        );
    }

    edges
}

fn node_text<'s>(source: &'s str, node: Node<'_>) -> &'s str {
    &source[node.byte_range()]
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

/// Import specifiers in source order.
fn extract_imports(source: &str, root: &Node<'_>, lang: Lang) -> Vec<String> {
    let kinds = lang.import_node_kinds();
    let mut out: Vec<String> = Vec::new();
    let mut push = |spec: &str| {
        let spec = spec.trim();
        if !spec.is_empty() && !out.iter().any(|s| s == spec) {
            out.push(spec.to_owned());
        }
    };

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if !kinds.contains(&child.kind()) {
            continue;
        }
        match child.kind() {
            "use_declaration" => {
                if let Some(arg) = child.child_by_field_name("argument") {
                    push(node_text(source, arg));
                }
            }
            "import_from_statement" => {
                if let Some(module) = child.child_by_field_name("module_name") {
                    push(node_text(source, module));
                }
            }
            "import_statement" if lang == Lang::Python => {
                let mut c = child.walk();
                for name in child.children_by_field_name("name", &mut c) {
                    let target = name.child_by_field_name("name").unwrap_or(name);
                    push(node_text(source, target));
                }
            }
            "import_statement" => {
                if let Some(src) = child.child_by_field_name("source") {
                    push(strip_quotes(node_text(source, src)));
                }
            }
            "import_declaration" => {
                let mut c = child.walk();
                let mut stack: Vec<Node<'_>> = child.named_children(&mut c).collect();
                while let Some(n) = stack.pop() {
                    if n.kind() == "import_spec" {
                        if let Some(path) = n.child_by_field_name("path") {
                            push(strip_quotes(node_text(source, path)));
                        }
                    } else {
                        let mut c2 = n.walk();
                        let mut nested: Vec<Node<'_>> = n.named_children(&mut c2).collect();
                        nested.reverse();
                        stack.extend(nested);
                    }
                }
            }
            _ => {}
        }
    }

    if lang.is_js_family() {
        for caps in REQUIRE_RE.captures_iter(source) {
            push(&caps[1]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(path: &str, source: &str) -> Extraction {
        extract_file(&FileInput {
            filepath: path,
            source,
            file_hash: "h",
            repo_id: "r",
        })
    }

    fn find<'a>(ex: &'a Extraction, name: &str) -> &'a CodeNode {
        ex.nodes
            .iter()
            .find(|n| n.name == name)
            .unwrap_or_else(|| panic!("no node named {name}"))
    }

    fn targets(ex: &Extraction, source_id: &str, rel: Relationship) -> Vec<String> {
        ex.edges
            .iter()
            .filter(|e| e.source_id == source_id && e.relationship == rel)
            .map(|e| e.target_id.clone())
            .collect()
    }

    #[test]
    fn python_hello_yields_file_and_function() {
        let ex = extract("main.py", "def hello():\n    print('world')\n");
        assert!(ex.parsed);
        assert_eq!(ex.nodes.len(), 2);
        assert_eq!(ex.nodes[0].kind, NodeKind::File);
        assert_eq!(ex.nodes[0].name, "main.py");
        let hello = find(&ex, "hello");
        assert_eq!(hello.kind, NodeKind::Function);
        assert_eq!((hello.start_line, hello.end_line), (1, 2));
        assert_eq!(hello.id, "main.py:1-2");
        assert_ne!(hello.id, ex.nodes[0].id);
        assert_eq!(
            targets(&ex, &hello.id, Relationship::Calls),
            vec!["symbol:print"]
        );
    }

    #[test]
    fn ids_are_stable_across_runs() {
        let src = "class A:\n    def m(self):\n        return B()\n";
        let a: Vec<String> = extract("a.py", src).nodes.into_iter().map(|n| n.id).collect();
        let b: Vec<String> = extract("a.py", src).nodes.into_iter().map(|n| n.id).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn python_methods_and_constructor_types() {
        let src = "import os\nfrom pkg.mod import thing\n\nclass Service:\n    def run(self, cfg: Config) -> Report:\n        helper(cfg)\n        return Report()\n\ndef _private():\n    pass\n";
        let ex = extract("svc.py", src);
        let file = &ex.nodes[0];
        assert_eq!(file.import_deps, vec!["os", "pkg.mod"]);
        assert_eq!(
            targets(&ex, &file.id, Relationship::Imports),
            vec!["module:os", "module:pkg.mod"]
        );

        let class = find(&ex, "Service");
        assert_eq!(class.kind, NodeKind::Class);
        let run = find(&ex, "run");
        assert_eq!(run.kind, NodeKind::Method);
        let calls = targets(&ex, &run.id, Relationship::Calls);
        assert!(calls.contains(&"symbol:helper".to_owned()));
        let types = targets(&ex, &run.id, Relationship::UsesType);
        assert!(types.contains(&"symbol:Config".to_owned()));
        assert!(types.contains(&"symbol:Report".to_owned()));

        let private = find(&ex, "_private");
        assert_eq!(private.properties["exported"], false);
        let contains = targets(&ex, &file.id, Relationship::Contains);
        assert_eq!(contains.len(), 3);
    }

    #[test]
    fn control_keywords_are_not_calls() {
        let src = "def f(x):\n    if (x):\n        while (x):\n            x = g(x)\n    return (x)\n";
        let ex = extract("k.py", src);
        let f = find(&ex, "f");
        assert_eq!(targets(&ex, &f.id, Relationship::Calls), vec!["symbol:g"]);
    }

    #[test]
    fn rust_items_and_methods() {
        let src = "use std::collections::HashMap;\n\npub struct Store {\n    map: HashMap<String, Entry>,\n}\n\nimpl Store {\n    pub fn get(&self) -> Option<&Entry> {\n        lookup(&self.map)\n    }\n}\n\nconst LIMIT: usize = 3;\npub const MAX: usize = 5;\n";
        let ex = extract("src/store.rs", src);
        assert_eq!(ex.nodes[0].import_deps, vec!["std::collections::HashMap"]);
        assert_eq!(find(&ex, "Store").kind, NodeKind::Struct);
        assert!(ex.nodes.iter().any(|n| n.kind == NodeKind::Impl));
        let get = find(&ex, "get");
        assert_eq!(get.kind, NodeKind::Method);
        assert!(targets(&ex, &get.id, Relationship::Calls).contains(&"symbol:lookup".to_owned()));
        assert!(
            targets(&ex, &get.id, Relationship::UsesType).contains(&"symbol:Entry".to_owned())
        );
        assert!(ex.nodes.iter().all(|n| n.name != "LIMIT"));
        assert_eq!(find(&ex, "MAX").kind, NodeKind::Constant);
    }

    #[test]
    fn typescript_bindings_interfaces_and_imports() {
        let src = "import { z } from 'zod';\nconst util = require(\"./util\");\n\nexport interface User { id: string }\nexport type Id = string;\nconst local = 3;\nexport const LIMIT = 10;\nexport const load = async (id: Id): Promise<User> => fetchUser(id);\n";
        let ex = extract("lib/users.ts", src);
        assert_eq!(ex.nodes[0].import_deps, vec!["zod", "./util"]);
        assert_eq!(find(&ex, "User").kind, NodeKind::Interface);
        assert_eq!(find(&ex, "Id").kind, NodeKind::TypeAlias);
        assert_eq!(find(&ex, "LIMIT").kind, NodeKind::Constant);
        assert!(ex.nodes.iter().all(|n| n.name != "local"));
        let load = find(&ex, "load");
        assert_eq!(load.kind, NodeKind::Function);
        assert!(targets(&ex, &load.id, Relationship::Calls).contains(&"symbol:fetchUser".to_owned()));
        assert!(targets(&ex, &load.id, Relationship::UsesType).contains(&"symbol:User".to_owned()));
    }

    #[test]
    fn next_route_handlers_carry_framework_meta() {
        let src = "export const runtime = 'edge';\n\nexport async function GET(req: Request) {\n  return respond(req);\n}\n\nfunction helper() {}\n";
        let ex = extract("app/api/users/[id]/route.ts", src);
        let file = &ex.nodes[0];
        let meta = file.framework.as_ref().unwrap();
        assert_eq!(meta.route_path.as_deref(), Some("/api/users/:id"));
        assert_eq!(meta.runtime.as_deref(), Some("edge"));
        let get = find(&ex, "GET");
        assert_eq!(get.kind, NodeKind::RouteHandler);
        assert_eq!(get.framework.as_ref().unwrap().segment, SegmentKind::Route);
        assert_eq!(find(&ex, "helper").kind, NodeKind::Function);
    }

    #[test]
    fn go_types_and_imports() {
        let src = "package main\n\nimport (\n\t\"fmt\"\n\t\"net/http\"\n)\n\ntype Server struct {\n\taddr string\n}\n\ntype Handler interface {\n\tServe()\n}\n\nfunc (s *Server) Start() error {\n\treturn listen(s.addr)\n}\n";
        let ex = extract("main.go", src);
        assert_eq!(ex.nodes[0].import_deps, vec!["fmt", "net/http"]);
        assert_eq!(find(&ex, "Server").kind, NodeKind::Struct);
        assert_eq!(find(&ex, "Handler").kind, NodeKind::Interface);
        assert_eq!(find(&ex, "Start").kind, NodeKind::Method);
    }

    #[test]
    fn unknown_extension_becomes_text_node() {
        let ex = extract(".gitignore", "*.log\n");
        assert!(!ex.parsed);
        assert_eq!(ex.nodes.len(), 1);
        assert_eq!(ex.nodes[0].kind, NodeKind::Text);
        assert_eq!(ex.nodes[0].language(), Some("text"));
        assert!(ex.edges.is_empty());
    }

    #[test]
    fn config_language_yields_file_node_only() {
        let ex = extract("Cargo.toml", "[package]\nname = \"x\"\n");
        assert!(ex.parsed);
        assert_eq!(ex.nodes.len(), 1);
        assert_eq!(ex.nodes[0].kind, NodeKind::File);
    }

    #[test]
    fn empty_file_yields_nothing() {
        let ex = extract("empty.py", "  \n\n");
        assert!(ex.nodes.is_empty());
        assert!(ex.edges.is_empty());
    }

    #[test]
    fn symbol_entries_use_first_line_signature() {
        let ex = extract("m.py", "def add(a, b):\n    return a + b\n");
        assert_eq!(ex.symbols.len(), 1);
        assert_eq!(ex.symbols[0].signature.as_deref(), Some("def add(a, b):"));
        assert!((ex.symbols[0].importance - 0.8).abs() < f32::EPSILON);
    }
}
