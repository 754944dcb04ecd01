//! Struct tags and the two directives read from them.
//!
//! `json:"name,omitempty,string"` controls the wire encoding of a field.
//! `zod:",nullable"` and `zod:",value"` only affect the generated schema.

/// A parsed struct tag: space-separated `key:"quoted value"` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructTag {
    raw: String,
    entries: Vec<(String, String)>,
}

/// The `json` directive of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonTag<'a> {
    /// Rename; empty when the field keeps its own name.
    pub name: &'a str,
    /// `json:"-"`: the field never appears on the wire.
    pub skip: bool,
    pub omit_empty: bool,
    /// Scalars are wrapped in a JSON string.
    pub string: bool,
}

/// The `zod` directive of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchemaTag {
    pub nullable: bool,
    /// The enclosing struct is represented by this field alone.
    pub value: bool,
}

impl StructTag {
    pub fn new(raw: &str) -> StructTag {
        StructTag { raw: raw.to_string(), entries: parse_entries(raw) }
    }

    /// Value stored under `key`, or the empty string.
    pub fn get(&self, key: &str) -> &str {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl<'a> JsonTag<'a> {
    pub fn parse(tag: &'a str) -> JsonTag<'a> {
        if tag == "-" {
            return JsonTag { skip: true, ..JsonTag::default() };
        }
        let (name, _) = tag.split_once(',').unwrap_or((tag, ""));
        JsonTag {
            name,
            skip: false,
            omit_empty: has_flag(tag, "omitempty"),
            string: has_flag(tag, "string"),
        }
    }
}

impl SchemaTag {
    pub fn parse(tag: &str) -> SchemaTag {
        SchemaTag {
            nullable: has_flag(tag, "nullable"),
            value: has_flag(tag, "value"),
        }
    }
}

/// Flags are the comma-separated entries after the leading name part.
pub fn has_flag(tag: &str, flag: &str) -> bool {
    match tag.split_once(',') {
        Some((_, flags)) => flags.split(',').any(|f| f == flag),
        None => false,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn parse_entries(raw: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = raw;
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        let key_len = rest
            .bytes()
            .take_while(|&b| b > b' ' && b != b':' && b != b'"' && b != 0x7f)
            .count();
        let bytes = rest.as_bytes();
        if key_len == 0 || key_len + 1 >= bytes.len() || bytes[key_len] != b':' || bytes[key_len + 1] != b'"' {
            break;
        }
        let key = &rest[..key_len];
        rest = &rest[key_len + 1..];

        // `rest` starts at the opening quote.
        let bytes = rest.as_bytes();
        let mut i = 1;
        while i < bytes.len() && bytes[i] != b'"' {
            if bytes[i] == b'\\' {
                i += 1;
            }
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let quoted = &rest[1..i];
        rest = &rest[i + 1..];
        out.push((key.to_string(), unquote(quoted)));
    }
    out
}

fn unquote(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_key() {
        let tag = StructTag::new(r#"json:"id,omitempty" zod:",nullable""#);
        assert_eq!(tag.get("json"), "id,omitempty");
        assert_eq!(tag.get("zod"), ",nullable");
        assert_eq!(tag.get("xml"), "");
    }

    #[test]
    fn escaped_quotes_in_values() {
        let tag = StructTag::new(r#"doc:"say \"hi\"" json:"x""#);
        assert_eq!(tag.get("doc"), r#"say "hi""#);
        assert_eq!(tag.get("json"), "x");
    }

    #[test]
    fn malformed_tags_stop_parsing() {
        let tag = StructTag::new(r#"json:id"#);
        assert_eq!(tag.get("json"), "");
    }

    #[test]
    fn json_directive() {
        assert!(JsonTag::parse("-").skip);
        let dash = JsonTag::parse("-,");
        assert!(!dash.skip);
        assert_eq!(dash.name, "-");
        let t = JsonTag::parse("count,omitempty,string");
        assert_eq!(t.name, "count");
        assert!(t.omit_empty && t.string);
        let t = JsonTag::parse(",omitempty");
        assert_eq!(t.name, "");
        assert!(t.omit_empty && !t.string);
    }

    #[test]
    fn flags_skip_the_name_part() {
        assert!(!has_flag("nullable", "nullable"));
        assert!(has_flag(",nullable", "nullable"));
        assert!(has_flag("x,value,nullable", "value"));
        assert_eq!(SchemaTag::parse(",value"), SchemaTag { nullable: false, value: true });
    }
}
