//! Declarative extra-field extraction for feed entries.
//!
//! A rule is a list of bindings separated by `;` or newlines:
//!
//! ```text
//! content = content:encoded ?? ""
//! thumbnail = media:group/media:thumbnail/@url
//! dc:creator
//! ```
//!
//! Each binding is `[name =] path [?? "default"]`. A path walks element names
//! separated by `/` and may end with `@attr` to read an attribute. Without an
//! explicit name the output key is the path text itself. Paths are evaluated
//! against the raw entry tree (see [`crate::feed::xml_tree`]); an array
//! contributes its first element and an element with attributes yields its
//! text content.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::feed::xml_tree::{ATTR_KEY, CHAR_KEY};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message} at position {position}")]
pub struct SelectorError {
    message: String,
    position: usize,
}

impl SelectorError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Element(String),
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    name: String,
    path: Vec<Step>,
    default: Option<String>,
}

/// A compiled extraction rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelectors {
    bindings: Vec<Binding>,
}

impl FieldSelectors {
    /// Compiles a rule, reporting the first syntax error with its character
    /// position.
    pub fn compile(source: &str) -> Result<Self, SelectorError> {
        let mut cursor = Cursor::new(source);
        let mut bindings: Vec<Binding> = Vec::new();

        loop {
            cursor.skip_separators();
            if cursor.at_end() {
                break;
            }

            let start = cursor.pos;
            let binding = cursor.binding()?;
            if bindings.iter().any(|b| b.name == binding.name) {
                return Err(SelectorError::new(
                    format!("duplicate field name '{}'", binding.name),
                    start,
                ));
            }
            bindings.push(binding);

            cursor.skip_blanks();
            match cursor.peek() {
                None | Some(';') | Some('\n') => {}
                Some(c) => {
                    return Err(SelectorError::new(
                        format!("unexpected '{c}', expected ';' or end of rule"),
                        cursor.pos,
                    ))
                }
            }
        }

        if bindings.is_empty() {
            return Err(SelectorError::new("rule defines no fields", 0));
        }
        Ok(Self { bindings })
    }

    /// Names of the fields this rule produces, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    /// Evaluates every binding against one raw entry.
    ///
    /// Fields whose path is absent and that have no default are omitted.
    pub fn evaluate(&self, entry: &Value) -> Map<String, Value> {
        self.bindings
            .iter()
            .filter_map(|binding| {
                let value = lookup(entry, &binding.path)
                    .map(text_content)
                    .or_else(|| binding.default.clone().map(Value::String))?;
                Some((binding.name.clone(), value))
            })
            .collect()
    }
}

fn first(node: &Value) -> &Value {
    match node {
        Value::Array(items) => items.first().unwrap_or(node),
        _ => node,
    }
}

fn lookup<'a>(entry: &'a Value, path: &[Step]) -> Option<&'a Value> {
    path.iter().try_fold(entry, |node, step| {
        let obj = first(node).as_object()?;
        match step {
            Step::Element(name) => obj.get(name),
            Step::Attribute(name) => obj.get(ATTR_KEY)?.as_object()?.get(name),
        }
    })
}

fn text_content(node: &Value) -> Value {
    let node = first(node);
    match node.as_object().and_then(|obj| obj.get(CHAR_KEY)) {
        Some(text) => text.clone(),
        None => node.clone(),
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Element(name) => f.write_str(name),
            Step::Attribute(name) => write!(f, "@{name}"),
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn eat(&mut self, expected: &str) -> bool {
        let len = expected.chars().count();
        let matches = self.chars[self.pos..]
            .iter()
            .take(len)
            .copied()
            .eq(expected.chars());
        if matches {
            self.pos += len;
        }
        matches
    }

    /// Spaces and tabs only; newlines separate bindings.
    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n' | ';')) {
            self.pos += 1;
        }
    }

    fn name(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => self.pos += 1,
            Some(c) => {
                return Err(SelectorError::new(
                    format!("unexpected '{c}', expected a field name"),
                    start,
                ))
            }
            None => return Err(SelectorError::new("expected a field name", start)),
        }
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
        {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn binding(&mut self) -> Result<Binding, SelectorError> {
        let alias = if self.peek() == Some('@') {
            None
        } else {
            let checkpoint = self.pos;
            let name = self.name()?;
            self.skip_blanks();
            if self.eat("=") {
                self.skip_blanks();
                Some(name)
            } else {
                self.pos = checkpoint;
                None
            }
        };

        let path = self.path()?;
        self.skip_blanks();
        let default = if self.eat("??") {
            self.skip_blanks();
            Some(self.string()?)
        } else {
            None
        };

        let name = alias.unwrap_or_else(|| {
            path.iter()
                .map(Step::to_string)
                .collect::<Vec<_>>()
                .join("/")
        });
        Ok(Binding {
            name,
            path,
            default,
        })
    }

    fn path(&mut self) -> Result<Vec<Step>, SelectorError> {
        let mut steps = Vec::new();
        loop {
            if self.eat("@") {
                steps.push(Step::Attribute(self.name()?));
                if self.peek() == Some('/') {
                    return Err(SelectorError::new(
                        "attribute selector must be the last step",
                        self.pos,
                    ));
                }
                return Ok(steps);
            }
            steps.push(Step::Element(self.name()?));
            if !self.eat("/") {
                return Ok(steps);
            }
        }
    }

    fn string(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(SelectorError::new("expected a quoted default value", start)),
        };
        self.pos += 1;

        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(SelectorError::new("unterminated string literal", start)),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some(c) => out.push(c),
                        None => {
                            return Err(SelectorError::new("unterminated string literal", start))
                        }
                    }
                    self.pos += 1;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}
