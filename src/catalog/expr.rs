//! Type expressions as written in catalogs: `[]T`, `[4]T`, `*T`,
//! `map[K]V`, `any`, `Name`, `module/path.Name` and `Name[A, B]`.
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Any,
    Named { name: String, args: Vec<TypeExpr> },
    Slice(Box<TypeExpr>),
    Array(usize, Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Pointer(Box<TypeExpr>),
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

pub fn parse(src: &str) -> Result<TypeExpr> {
    let mut parser = Parser { src, pos: 0 };
    let expr = parser.expr()?;
    parser.skip_whitespace();
    if parser.pos != src.len() {
        return Err(parser.error(format!("unexpected {:?}", parser.rest())));
    }
    Ok(expr)
}

/// Splits `module/path.Name` into its module and bare name. Bare names have
/// no module.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    let after_slash = name.rfind('/').map_or(0, |i| i + 1);
    match name[after_slash..].rfind('.') {
        Some(dot) => (Some(&name[..after_slash + dot]), &name[after_slash + dot + 1..]),
        None => (None, name),
    }
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::InvalidTypeExpr { expr: self.src.to_string(), reason: reason.into() }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) { Ok(()) } else { Err(self.error(format!("expected {token:?} at byte {}", self.pos))) }
    }

    fn expr(&mut self) -> Result<TypeExpr> {
        if self.eat("*") {
            return Ok(TypeExpr::Pointer(Box::new(self.expr()?)));
        }
        if self.eat("[") {
            if self.eat("]") {
                return Ok(TypeExpr::Slice(Box::new(self.expr()?)));
            }
            let digits = self.rest().bytes().take_while(u8::is_ascii_digit).count();
            let len = self.rest()[..digits]
                .parse()
                .map_err(|_| self.error(format!("expected an array length at byte {}", self.pos)))?;
            self.pos += digits;
            self.expect("]")?;
            return Ok(TypeExpr::Array(len, Box::new(self.expr()?)));
        }
        if self.eat("map[") {
            let key = self.expr()?;
            self.expect("]")?;
            return Ok(TypeExpr::Map(Box::new(key), Box::new(self.expr()?)));
        }
        if self.eat("interface") {
            self.expect("{")?;
            self.expect("}")?;
            return Ok(TypeExpr::Any);
        }

        let len = self
            .rest()
            .find(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | ','))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(self.error(format!("expected a type at byte {}", self.pos)));
        }
        let name = self.rest()[..len].to_string();
        self.pos += len;
        if name == "any" {
            return Ok(TypeExpr::Any);
        }
        let mut args = Vec::new();
        if self.rest().starts_with('[') {
            self.pos += 1;
            loop {
                args.push(self.expr()?);
                if !self.eat(",") {
                    break;
                }
            }
            self.expect("]")?;
        }
        Ok(TypeExpr::Named { name, args })
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Any => f.write_str("any"),
            TypeExpr::Named { name, args } if args.is_empty() => f.write_str(name),
            TypeExpr::Named { name, args } => {
                write!(f, "{name}[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
            TypeExpr::Slice(elem) => write!(f, "[]{elem}"),
            TypeExpr::Array(len, elem) => write!(f, "[{len}]{elem}"),
            TypeExpr::Map(key, elem) => write!(f, "map[{key}]{elem}"),
            TypeExpr::Pointer(elem) => write!(f, "*{elem}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> TypeExpr {
        TypeExpr::Named { name: name.into(), args: Vec::new() }
    }

    #[test]
    fn composites() {
        assert_eq!(
            parse("map[string][]*example.com/shop.Order").unwrap(),
            TypeExpr::Map(
                Box::new(named("string")),
                Box::new(TypeExpr::Slice(Box::new(TypeExpr::Pointer(Box::new(named("example.com/shop.Order")))))),
            )
        );
        assert_eq!(parse("[4]byte").unwrap(), TypeExpr::Array(4, Box::new(named("byte"))));
        assert_eq!(parse("interface {}").unwrap(), TypeExpr::Any);
        assert_eq!(parse(" any ").unwrap(), TypeExpr::Any);
    }

    #[test]
    fn generic_arguments() {
        let expr = parse("Page[ example.com/shop.Order, []T ]").unwrap();
        assert_eq!(
            expr,
            TypeExpr::Named {
                name: "Page".into(),
                args: vec![named("example.com/shop.Order"), TypeExpr::Slice(Box::new(named("T")))],
            }
        );
        assert_eq!(expr.to_string(), "Page[example.com/shop.Order, []T]");
        assert_eq!(parse("mapping").unwrap(), named("mapping"));
    }

    #[test]
    fn malformed_expressions() {
        for src in ["", "[", "[x]int", "map[string", "Page[int", "int]", "interface"] {
            assert!(matches!(parse(src), Err(Error::InvalidTypeExpr { .. })), "{src:?}");
        }
    }

    #[test]
    fn qualified_names() {
        assert_eq!(split_qualified("example.com/shop/v2.Order"), (Some("example.com/shop/v2"), "Order"));
        assert_eq!(split_qualified("time.Duration"), (Some("time"), "Duration"));
        assert_eq!(split_qualified("Order"), (None, "Order"));
        assert_eq!(split_qualified("example.com/shop"), (None, "example.com/shop"));
    }
}
