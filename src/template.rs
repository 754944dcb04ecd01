//! String templates.
//!
//! A template such as `"id-{}"` says that a value travels as a string with
//! the value embedded at the placeholder. Compiling it against the value's
//! schema yields a pattern that recognises such strings and an expression
//! that rebuilds the value from the pattern's capture groups. Object schemas
//! use named placeholders, one per embedded property: `"{major}.{minor}"`.
use regex::Regex;

use crate::error::{Error, Result};
use crate::schema::{Schema, z};
use crate::ts::{self, Source};

/// A compiled template: an unanchored pattern with one capture group per
/// placeholder, plus the expression rebuilding the value from `match`.
#[derive(Debug, Clone)]
pub struct TemplatePattern {
    pub template: String,
    pub pattern: String,
    pub reconstruction: Source,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

#[derive(Debug, Clone)]
enum Embedding {
    Number { schema: Schema, int: bool, non_negative: bool },
    Text,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TemplatePattern {
    /// The pattern anchored at both ends.
    pub fn anchored(&self) -> String {
        format!("^{}$", self.pattern)
    }

    pub fn regex(&self) -> Result<Regex> {
        Regex::new(&self.anchored()).map_err(|source| Error::InvalidPattern {
            template: self.template.clone(),
            source,
        })
    }
}

/// Compiles `template` against `schema`.
pub fn compile(schema: &Schema, template: &str) -> Result<TemplatePattern> {
    let segments = split(template)?;
    let (pattern, reconstruction) = match schema.object_shape() {
        Some(shape) => {
            let mut pattern = String::new();
            let mut properties: Vec<(String, Source)> = Vec::new();
            for segment in segments {
                match segment {
                    Segment::Literal(text) => pattern.push_str(&quote_meta(text)),
                    Segment::Placeholder(name) => {
                        let property = shape.iter().find(|p| p.name == name).ok_or_else(|| {
                            Error::UnknownPlaceholder { template: template.to_string(), name: name.to_string() }
                        })?;
                        if properties.iter().any(|(n, _)| n == name) {
                            return Err(Error::RepeatedPlaceholder {
                                template: template.to_string(),
                                name: name.to_string(),
                            });
                        }
                        let embedding = Embedding::resolve(&property.schema)?;
                        pattern.push('(');
                        pattern.push_str(&embedding.pattern());
                        pattern.push(')');
                        let group = properties.len() + 1;
                        let captured = Source::format("match[{}]", [ts::number_literal(group)]);
                        properties.push((name.to_string(), embedding.parse(captured)));
                    }
                }
            }
            (pattern, Source::object(properties))
        }
        None => {
            let embedding = Embedding::resolve(schema)?;
            let mut pattern = String::new();
            let mut seen = false;
            for segment in segments {
                match segment {
                    Segment::Literal(text) => pattern.push_str(&quote_meta(text)),
                    Segment::Placeholder("") if !seen => {
                        seen = true;
                        pattern.push('(');
                        pattern.push_str(&embedding.pattern());
                        pattern.push(')');
                    }
                    Segment::Placeholder(name) if !name.is_empty() => {
                        return Err(Error::UnknownPlaceholder {
                            template: template.to_string(),
                            name: name.to_string(),
                        });
                    }
                    Segment::Placeholder(_) => {
                        return Err(Error::RepeatedPlaceholder {
                            template: template.to_string(),
                            name: String::new(),
                        });
                    }
                }
            }
            if !seen {
                return Err(Error::MissingPlaceholder { template: template.to_string() });
            }
            (pattern, embedding.parse(Source::text("match[1]")))
        }
    };
    let compiled = TemplatePattern { template: template.to_string(), pattern, reconstruction };
    compiled.regex()?;
    Ok(compiled)
}

/// Replaces `schema` with a string schema that parses values written
/// through `template`.
pub fn apply(schema: &Schema, template: &str) -> Result<Schema> {
    let compiled = compile(schema, template)?;
    let message = ts::string_escape(&ts::string_literal(template).render_body());
    let transform = Source::format(
        "(s, ctx) => {{\n\
         \x20   const re = {};\n\
         \x20   const match = re.exec(s);\n\
         \x20   if (!match) {{\n\
         \x20       ctx.addIssue({{ code: {}.ZodIssueCode.custom, message: \"expected string of the form {} matching \" + re }});\n\
         \x20       return {}.NEVER;\n\
         \x20   }}\n\
         \x20   return {};\n\
         }}",
        [
            ts::regex_literal(&compiled.anchored()),
            z(),
            Source::text(message),
            z(),
            compiled.reconstruction,
        ],
    );
    Ok(Schema::from(Schema::string()).transform(transform))
}

impl Embedding {
    fn resolve(schema: &Schema) -> Result<Embedding> {
        if let Some(inner) = schema.unwrap_brand() {
            return Embedding::resolve(&inner);
        }
        if let Some(number) = schema.as_number() {
            return Ok(Embedding::Number {
                schema: schema.clone(),
                int: number.is_int(),
                non_negative: number.is_non_negative(),
            });
        }
        if schema.is_string() {
            return Ok(Embedding::Text);
        }
        Err(Error::UnsupportedEmbedding { schema: schema.typescript().render_body() })
    }

    fn pattern(&self) -> String {
        match self {
            Embedding::Number { int, non_negative, .. } => {
                let mut pattern = String::from(r"\d+");
                if !int {
                    pattern.push_str(r"(?:\.\d+)?");
                }
                if !non_negative {
                    pattern.insert_str(0, "-?");
                }
                pattern
            }
            Embedding::Text => ".*".to_string(),
        }
    }

    fn parse(&self, captured: Source) -> Source {
        match self {
            Embedding::Number { schema, .. } => schema.parse(Source::format("Number({})", [captured])),
            Embedding::Text => captured,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn split(template: &str) -> Result<Vec<Segment<'_>>> {
    let unbalanced = |offset| Error::UnbalancedPlaceholder { template: template.to_string(), offset };
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut open: Option<usize> = None;
    for (i, c) in template.char_indices() {
        match (c, open) {
            ('{', None) => {
                if literal_start < i {
                    segments.push(Segment::Literal(&template[literal_start..i]));
                }
                open = Some(i);
            }
            ('{', Some(_)) => return Err(unbalanced(i)),
            ('}', Some(start)) => {
                segments.push(Segment::Placeholder(&template[start + 1..i]));
                open = None;
                literal_start = i + 1;
            }
            ('}', None) => return Err(unbalanced(i)),
            _ => {}
        }
    }
    if let Some(start) = open {
        return Err(unbalanced(start));
    }
    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }
    Ok(segments)
}

/// Escapes the characters that are special in both Rust and JavaScript
/// regular expressions, leaving everything else as is.
pub fn quote_meta(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '.' | '+' | '*' | '?' | '^' | '$' | '(' | ')' | '[' | ']' |
            '{' | '}' | '|' | '\\' => { out.push('\\'); out.push(c); }
            _ => out.push(c),
        }
    }
    out
}
