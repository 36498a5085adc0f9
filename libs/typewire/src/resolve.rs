//! Textual type expressions and their classification into descriptors.
//!
//! Classification order: (a) primitive name, (b) one-parameter list,
//! (c) two-parameter map, (d) record name. Anything else is unsupported.

use std::fmt;
use std::str::FromStr;

use crate::descriptor::Descriptor;
use crate::error::CodecError;

/// Parsed type expression: `Name` or `Name<Arg, ...>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub name: String,
    pub args: Vec<TypeExpr>,
}

impl TypeExpr {
    pub fn parse(input: &str) -> Result<Self, CodecError> {
        let mut parser = Parser { input, pos: 0 };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos != input.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }
}

impl FromStr for TypeExpr {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some((first, rest)) = self.args.split_first() {
            write!(f, "<{first}")?;
            for arg in rest {
                write!(f, ", {arg}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, msg: &str) -> CodecError {
        CodecError::unsupported(format!(
            "malformed type expression '{}' at {}: {msg}",
            self.input, self.pos
        ))
    }

    fn skip_ws(&mut self) {
        let rest = &self.input[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.input[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<String, CodecError> {
        self.skip_ws();
        let rest = &self.input[self.pos..];
        let len = rest
            .char_indices()
            .find(|&(i, c)| {
                let start = c == '_' || c.is_ascii_alphabetic();
                !(start || (i > 0 && (c.is_ascii_digit() || c == ':')))
            })
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return Err(self.error("expected type name"));
        }
        self.pos += len;
        Ok(rest[..len].to_string())
    }

    fn expr(&mut self) -> Result<TypeExpr, CodecError> {
        let name = self.ident()?;
        let mut args = Vec::new();
        if self.eat('<') {
            loop {
                args.push(self.expr()?);
                if self.eat(',') {
                    continue;
                }
                if self.eat('>') {
                    break;
                }
                return Err(self.error("expected ',' or '>'"));
            }
        }
        Ok(TypeExpr { name, args })
    }
}

fn primitive(name: &str) -> Option<Descriptor> {
    match name {
        "Boolean" | "Bool" | "bool" => Some(Descriptor::Boolean),
        "Int32" | "Int" | "i32" => Some(Descriptor::Int32),
        "Int64" | "Long" | "i64" => Some(Descriptor::Int64),
        "Double" | "f64" => Some(Descriptor::Double),
        "String" | "string" => Some(Descriptor::String),
        _ => None,
    }
}

fn is_list(name: &str) -> bool {
    matches!(name, "List" | "Vec")
}

fn is_map(name: &str) -> bool {
    matches!(name, "Map" | "HashMap" | "BTreeMap" | "Dictionary")
}

/// Whether a record name would be shadowed by the built-in rules.
pub(crate) fn is_reserved(name: &str) -> bool {
    primitive(name).is_some() || is_list(name) || is_map(name)
}

/// Classify `expr`, asking `record` for names that are not built in.
///
/// `record` returns `Ok(None)` for unknown names.
pub fn resolve_with<F>(expr: &TypeExpr, record: &mut F) -> Result<Descriptor, CodecError>
where
    F: FnMut(&str) -> Result<Option<Descriptor>, CodecError>,
{
    let name = expr.name.as_str();
    match expr.args.as_slice() {
        [] => {
            if let Some(d) = primitive(name) {
                return Ok(d);
            }
            record(name)?
                .ok_or_else(|| CodecError::unsupported(format!("unknown record type '{name}'")))
        }
        [element] if is_list(name) => Ok(Descriptor::list(resolve_with(element, record)?)),
        [key, value] if is_map(name) => Ok(Descriptor::map(
            resolve_with(key, record)?,
            resolve_with(value, record)?,
        )),
        args => Err(CodecError::unsupported(format!(
            "'{expr}': generic type '{name}' with {} parameter(s)",
            args.len()
        ))),
    }
}

/// Classify an expression that may only reference built-in types.
pub fn resolve_builtin(expr: &str) -> Result<Descriptor, CodecError> {
    resolve_with(&TypeExpr::parse(expr)?, &mut |_| Ok(None))
}
