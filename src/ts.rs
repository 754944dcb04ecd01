//! TypeScript source assembly.
//!
//! A [`Source`] is a tree of text leaves, imported names and groups. Imports
//! are collected from the whole tree, deduplicated and hoisted above the body
//! when the tree is rendered. Groups know how to lay themselves out: braced
//! lists break onto one element per line past a size threshold, and format
//! templates indent their holes to match the line they sit on.
pub(crate) mod writer;

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use writer::IndentWriter;

use crate::error::{Error, Result};

const INDENT: &str = "    ";

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z_$][a-zA-Z0-9_$]*$").expect("static regex"));

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// A TypeScript identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Import {
    module: String,
    name: Identifier,
}

#[derive(Debug, Clone)]
pub enum Source {
    Text(String),
    Imported(Import),
    Group(Group),
}

#[derive(Debug, Clone)]
pub struct Group {
    style: Style,
    elements: Vec<Source>,
}

#[derive(Debug, Clone)]
enum Style {
    Braced(Braced),
    /// Statements separated by this many blank lines.
    Statements(usize),
    Format(Vec<Piece>),
}

#[derive(Debug, Clone, Copy)]
struct Braced {
    open: &'static str,
    padding: &'static str,
    close: &'static str,
    multiline_threshold: usize,
}

#[derive(Debug, Clone)]
enum Piece {
    Text(String),
    Newline,
    /// A hole, remembering the leading whitespace of its line.
    Hole(String),
}

const INVOCATION: Braced = Braced { open: "(", padding: "", close: ")", multiline_threshold: 5 };
const ARRAY: Braced = Braced { open: "[", padding: "", close: "]", multiline_threshold: 2 };
const OBJECT: Braced = Braced { open: "{", padding: " ", close: "}", multiline_threshold: 2 };

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Identifier(name.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn is_valid(name: &str) -> bool {
        IDENTIFIER.is_match(name)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::new(name)
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier(name)
    }
}

impl From<&Identifier> for Source {
    fn from(id: &Identifier) -> Self {
        Source::Text(id.0.clone())
    }
}

impl From<Identifier> for Source {
    fn from(id: Identifier) -> Self {
        Source::Text(id.0)
    }
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Source::Text(text.to_string())
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Source::Text(text)
    }
}

impl Source {
    pub fn text(text: impl Into<String>) -> Source {
        Source::Text(text.into())
    }

    /// A name imported from `module`; rendering hoists the import.
    pub fn imported(module: &str, name: impl Into<Identifier>) -> Source {
        Source::Imported(Import { module: module.to_string(), name: name.into() })
    }

    /// Fills the `{}` holes of `template` with `args`. `{{` and `}}` stand
    /// for literal braces. A hole's multi-line content is indented to match
    /// the leading whitespace of the template line holding the hole.
    ///
    /// Panics when the number of holes and arguments differ; use
    /// [`Source::try_format`] for templates that come from configuration.
    pub fn format(template: &str, args: impl IntoIterator<Item = Source>) -> Source {
        match Source::try_format(template, args) {
            Ok(source) => source,
            Err(err) => panic!("{err}"),
        }
    }

    /// [`Source::format`], failing when holes and arguments do not pair up.
    pub fn try_format(template: &str, args: impl IntoIterator<Item = Source>) -> Result<Source> {
        let args: Vec<Source> = args.into_iter().collect();
        let pieces = parse_format(template);
        let holes = pieces.iter().filter(|p| matches!(p, Piece::Hole(_))).count();
        if holes != args.len() {
            return Err(Error::FormatArity { template: template.to_string(), holes, args: args.len() });
        }
        if args.is_empty() {
            let text = pieces
                .into_iter()
                .map(|p| match p {
                    Piece::Text(s) => s,
                    _ => "\n".to_string(),
                })
                .collect::<String>();
            return Ok(Source::Text(text));
        }
        Ok(Source::Group(Group { style: Style::Format(pieces), elements: args }))
    }

    /// `[a, b, ...]`
    pub fn array(elements: impl IntoIterator<Item = Source>) -> Source {
        Source::braced(ARRAY, elements)
    }

    /// `{ name: value, ... }`, quoting names that are not identifiers.
    pub fn object(properties: impl IntoIterator<Item = (String, Source)>) -> Source {
        let props = properties.into_iter().map(|(name, value)| {
            let name = if Identifier::is_valid(&name) { Source::Text(name) } else { string_literal(&name) };
            Source::format("{}: {}", [name, value])
        });
        Source::braced(OBJECT, props)
    }

    pub fn invoke_function(function: Source, arguments: impl IntoIterator<Item = Source>) -> Source {
        Source::format("{}{}", [function, Source::braced(INVOCATION, arguments)])
    }

    pub fn invoke_method(
        receiver: Source,
        name: &str,
        arguments: impl IntoIterator<Item = Source>,
    ) -> Source {
        let method = Source::format("{}.{}", [receiver, Source::text(name)]);
        Source::invoke_function(method, arguments)
    }

    pub fn statements(statements: impl IntoIterator<Item = Source>) -> Source {
        Source::statement_groups(0, statements)
    }

    pub fn statement_groups(blank_lines: usize, groups: impl IntoIterator<Item = Source>) -> Source {
        Source::Group(Group { style: Style::Statements(blank_lines), elements: groups.into_iter().collect() })
    }

    /// Renders the tree with its hoisted imports.
    pub fn render(&self) -> String {
        let mut imports = BTreeSet::new();
        self.collect_imports(&mut imports);
        let mut w = IndentWriter::new();
        if !imports.is_empty() {
            for import in &imports {
                let module = string_literal(&import.module);
                w.write("", &format!("import {{ {} }} from {};\n", import.name, module.render_body()));
            }
            w.write("", "\n");
        }
        self.write_to(&mut w, "");
        w.finish()
    }

    /// Renders the tree without imports.
    pub fn render_body(&self) -> String {
        let mut w = IndentWriter::new();
        self.write_to(&mut w, "");
        w.finish()
    }

    fn collect_imports<'a>(&'a self, imports: &mut BTreeSet<&'a Import>) {
        match self {
            Source::Text(_) => {}
            Source::Imported(import) => {
                imports.insert(import);
            }
            Source::Group(group) => group.elements.iter().for_each(|e| e.collect_imports(imports)),
        }
    }

    fn write_to(&self, w: &mut IndentWriter, indent: &str) {
        match self {
            Source::Text(text) => w.write(indent, text),
            Source::Imported(import) => w.write(indent, import.name.as_str()),
            Source::Group(group) => group.write_to(w, indent),
        }
    }

    fn braced(style: Braced, elements: impl IntoIterator<Item = Source>) -> Source {
        Source::Group(Group { style: Style::Braced(style), elements: elements.into_iter().collect() })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Group {
    fn write_to(&self, w: &mut IndentWriter, indent: &str) {
        match &self.style {
            Style::Braced(braced) => {
                w.write(indent, braced.open);
                if !self.elements.is_empty() {
                    if self.elements.len() < braced.multiline_threshold {
                        w.write(indent, braced.padding);
                        for (i, element) in self.elements.iter().enumerate() {
                            if i != 0 {
                                w.write(indent, ", ");
                            }
                            element.write_to(w, indent);
                        }
                        w.write(indent, braced.padding);
                    } else {
                        let inner = format!("{indent}{INDENT}");
                        for element in &self.elements {
                            w.newline();
                            element.write_to(w, &inner);
                            w.write(&inner, ",");
                        }
                        w.newline();
                    }
                }
                w.write(indent, braced.close);
            }
            Style::Statements(blank_lines) => {
                for (i, element) in self.elements.iter().enumerate() {
                    if i != 0 {
                        for _ in 0..*blank_lines {
                            w.newline();
                        }
                    }
                    element.write_to(w, indent);
                    w.ensure_newline();
                }
            }
            Style::Format(pieces) => {
                let mut args = self.elements.iter();
                for piece in pieces {
                    match piece {
                        Piece::Text(text) => w.write(indent, text),
                        Piece::Newline => w.newline(),
                        Piece::Hole(line_indent) => {
                            if let Some(arg) = args.next() {
                                arg.write_to(w, &format!("{indent}{line_indent}"));
                            }
                        }
                    }
                }
            }
        }
    }
}

// ---- literals ----

/// Escapes `s` for inclusion between double quotes.
pub fn string_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

pub fn string_literal(s: &str) -> Source {
    Source::Text(format!("\"{}\"", string_escape(s)))
}

pub fn number_literal(n: impl fmt::Display) -> Source {
    Source::Text(n.to_string())
}

/// `/pattern/`, escaping forward slashes the pattern leaves bare.
pub fn regex_literal(pattern: &str) -> Source {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('/');
    let mut escaped = false;
    for c in pattern.chars() {
        if c == '/' && !escaped {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out.push('/');
    Source::Text(out)
}

/// A `/** ... */` block for `comment`, or nothing when it is blank.
pub fn doc_comment(comment: &str) -> Option<Source> {
    let comment = comment.trim();
    if comment.is_empty() {
        return None;
    }
    let lines = comment.lines().map(|line| {
        if line.is_empty() { Source::text(" *") } else { Source::text(format!(" * {line}")) }
    });
    Some(Source::statements([
        Source::text("/**"),
        Source::statements(lines),
        Source::text(" */"),
    ]))
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn parse_format(template: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut line_start = true;
    let mut line_indent = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                text.push('}');
            }
            '{' if chars.peek() == Some(&'}') => {
                chars.next();
                if !text.is_empty() {
                    pieces.push(Piece::Text(std::mem::take(&mut text)));
                }
                pieces.push(Piece::Hole(line_indent.clone()));
            }
            '\n' => {
                if !text.is_empty() {
                    pieces.push(Piece::Text(std::mem::take(&mut text)));
                }
                pieces.push(Piece::Newline);
                line_start = true;
                line_indent.clear();
                continue;
            }
            _ => text.push(c),
        }
        if line_start {
            if c == ' ' || c == '\t' {
                line_indent.push(c);
            } else {
                line_start = false;
            }
        }
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    pieces
}
