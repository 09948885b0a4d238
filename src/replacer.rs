//! Replacement resolution
//!
//! A replacement is either a literal template expanded with the regex crate's
//! `$1` / `${name}` syntax, or an expression evaluated once per match.
//!
//! # Safety of expressions
//!
//! Expressions are rhai scripts run with the privileges of the process. The
//! engine has no filesystem or network access by default, but expressions can
//! still loop or allocate without bound. Only pass expressions you trust.

use regex::{Captures, Regex};
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Scope, AST};
use std::fmt;

use crate::error::{ParseError, SubstError};

/// Name the current match is bound to inside expressions.
pub const MATCH_VARIABLE: &str = "m";

pub enum Replacer {
    Literal(String),
    Expression(ExpressionReplacer),
}

impl Replacer {
    /// Resolve the raw replacement argument. With `eval` set, it is compiled as an expression.
    pub fn resolve(replace: &str, eval: bool) -> Result<Self, ParseError> {
        if eval {
            return Ok(Replacer::Expression(ExpressionReplacer::compile(replace)?));
        }
        if looks_like_backslash_backreference(replace) {
            tracing::warn!(
                "replacement \"{}\" contains \\N; groups are referenced as $N or ${{N}}",
                replace
            );
        }
        Ok(Replacer::Literal(replace.to_string()))
    }

    /// Append the replacement for one match to `dst`.
    ///
    /// `char_start` is the match position in characters from the start of the
    /// searched text; only expressions look at it.
    pub fn append(
        &self,
        regex: &Regex,
        caps: &Captures<'_>,
        char_start: usize,
        dst: &mut String,
    ) -> Result<(), SubstError> {
        match self {
            Replacer::Literal(template) => {
                caps.expand(template, dst);
                Ok(())
            }
            Replacer::Expression(expr) => {
                let value = expr.evaluate(MatchObject::new(regex, caps, char_start))?;
                dst.push_str(&value);
                Ok(())
            }
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, Replacer::Expression(_))
    }
}

impl fmt::Debug for Replacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacer::Literal(template) => f.debug_tuple("Literal").field(template).finish(),
            Replacer::Expression(expr) => f.debug_tuple("Expression").field(&expr.source).finish(),
        }
    }
}

fn looks_like_backslash_backreference(template: &str) -> bool {
    let bytes = template.as_bytes();
    bytes
        .windows(2)
        .any(|w| w[0] == b'\\' && (w[1].is_ascii_digit() || w[1] == b'g'))
}

/// A compiled replacement expression.
pub struct ExpressionReplacer {
    engine: Engine,
    ast: AST,
    source: String,
}

impl ExpressionReplacer {
    pub fn compile(source: &str) -> Result<Self, ParseError> {
        let mut engine = Engine::new();
        register_match_type(&mut engine);
        // stdout may be the output stream
        engine.on_print(|text| eprintln!("{}", text));
        engine.on_debug(|text, _, pos| tracing::debug!("{} {}", pos, text));

        let ast = engine
            .compile_expression(source)
            .map_err(|err| ParseError::Expression {
                source_text: source.to_string(),
                message: err.to_string(),
            })?;

        Ok(Self {
            engine,
            ast,
            source: source.to_string(),
        })
    }

    /// Evaluate for one match. Unit results become the empty string.
    pub fn evaluate(&self, m: MatchObject) -> Result<String, SubstError> {
        let mut scope = Scope::new();
        scope.push(MATCH_VARIABLE, m);

        let value: Dynamic = self
            .engine
            .eval_ast_with_scope(&mut scope, &self.ast)
            .map_err(|err| SubstError::Evaluation(format!("{}: {}", self.source, err)))?;

        if value.is_unit() {
            Ok(String::new())
        } else {
            Ok(value.to_string())
        }
    }
}

/// What an expression sees of the current match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchObject {
    /// Index 0 is the whole match.
    groups: Vec<Option<String>>,
    names: Vec<Option<String>>,
    /// Character offsets, not bytes
    start: usize,
    end: usize,
}

impl MatchObject {
    pub fn new(regex: &Regex, caps: &Captures<'_>, char_start: usize) -> Self {
        let length = caps.get(0).map_or(0, |g| g.as_str().chars().count());
        Self {
            groups: caps
                .iter()
                .map(|g| g.map(|g| g.as_str().to_string()))
                .collect(),
            names: regex.capture_names().map(|n| n.map(str::to_string)).collect(),
            start: char_start,
            end: char_start + length,
        }
    }

    /// `None` both for a group that did not participate and for an unknown index.
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    pub fn named(&self, name: &str) -> Option<&str> {
        let index = self.names.iter().position(|n| n.as_deref() == Some(name))?;
        self.group(index)
    }

    /// Groups 1..n, without the whole match.
    pub fn groups(&self) -> Vec<Option<String>> {
        self.groups.iter().skip(1).cloned().collect()
    }

    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.as_deref() == Some(name))
    }
}

fn to_dynamic(value: Option<&str>) -> Dynamic {
    value.map_or(Dynamic::UNIT, |s| Dynamic::from(s.to_string()))
}

fn register_match_type(engine: &mut Engine) {
    engine
        .register_type_with_name::<MatchObject>("Match")
        .register_fn("group", |m: &mut MatchObject| to_dynamic(m.group(0)))
        .register_fn(
            "group",
            |m: &mut MatchObject, index: i64| -> Result<Dynamic, Box<EvalAltResult>> {
                match usize::try_from(index) {
                    Ok(i) if i < m.group_count() => Ok(to_dynamic(m.group(i))),
                    _ => Err(format!("no such group: {}", index).into()),
                }
            },
        )
        .register_fn(
            "group",
            |m: &mut MatchObject, name: ImmutableString| -> Result<Dynamic, Box<EvalAltResult>> {
                if !m.has_name(&name) {
                    return Err(format!("no such group: {}", name).into());
                }
                Ok(to_dynamic(m.named(&name)))
            },
        )
        .register_fn("groups", |m: &mut MatchObject| -> Array {
            m.groups
                .iter()
                .skip(1)
                .map(|g| to_dynamic(g.as_deref()))
                .collect()
        })
        .register_fn("start", |m: &mut MatchObject| m.start as i64)
        .register_fn("end", |m: &mut MatchObject| m.end as i64);
}
