//! Pointcut parsing and resolution
//!
//! A pointcut selects the calls an advice applies to. Accepted forms:
//!
//! | Form                           | Selects                         |
//! |--------------------------------|---------------------------------|
//! | `function()`                   | free functions                  |
//! | `Namespace\Class->method()`    | instance methods                |
//! | `Namespace\Class::method()`    | static methods                  |
//!
//! Any segment may contain `*`, which matches any (possibly empty)
//! sequence, path separators included. A leading `public`, `protected` or
//! `private` keyword additionally restricts the declared visibility of the
//! matched method.
//!
//! Resolution splits both the pointcut and the candidate on their last
//! `\`: the left part is matched against the namespace, the right part
//! (`Class->method()` or `function()`) against the name. Both matches are
//! anchored at both ends. A side without a separator has an empty
//! namespace, which only an empty (or all-wildcard) namespace pattern
//! accepts.
//!
//! ```rust,ignore
//! let pc = Pointcut::parse("Shop\\*->get*()")?;
//! assert!(pc.resolve_str("Shop\\Cart->getTotal()"));
//! assert!(!pc.resolve_str("Shop\\Cart->setTotal()"));
//! ```

use std::fmt;
use std::str::FromStr;

use crate::descriptor::{
    find_operator, split_last_separator, CallKind, Signature, Visibility, PATH_SEPARATOR,
};
use crate::error::{AspectError, AspectResult};

/// Wildcard marker in pointcut segments
pub const WILDCARD: char = '*';

/// One piece of a compiled pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternToken {
    /// Text that must appear verbatim
    Literal(String),
    /// `*`: any sequence of characters
    Wildcard,
}

/// Anchored wildcard pattern
///
/// Consecutive wildcards are collapsed, so literals and wildcards
/// alternate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pattern {
    tokens: Vec<PatternToken>,
}

impl Pattern {
    /// Compile a pattern; every character other than `*` is literal
    pub fn compile(text: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        for c in text.chars() {
            if c == WILDCARD {
                if !literal.is_empty() {
                    tokens.push(PatternToken::Literal(std::mem::take(&mut literal)));
                }
                if tokens.last() != Some(&PatternToken::Wildcard) {
                    tokens.push(PatternToken::Wildcard);
                }
            } else {
                literal.push(c);
            }
        }
        if !literal.is_empty() {
            tokens.push(PatternToken::Literal(literal));
        }
        Self { tokens }
    }

    /// Compiled tokens
    pub fn tokens(&self) -> &[PatternToken] {
        &self.tokens
    }

    /// Whether the pattern contains no wildcard
    pub fn is_literal(&self) -> bool {
        !self.tokens.contains(&PatternToken::Wildcard)
    }

    /// Full-string match
    pub fn matches(&self, text: &str) -> bool {
        let mut inner = self.tokens.as_slice();
        match inner {
            [] => return text.is_empty(),
            [PatternToken::Literal(lit)] => return text == lit,
            _ => {}
        }

        let mut start = 0;
        if let [PatternToken::Literal(head), tail @ ..] = inner {
            if !text.starts_with(head.as_str()) {
                return false;
            }
            start = head.len();
            inner = tail;
        }

        let mut end = text.len();
        if let [init @ .., PatternToken::Literal(last)] = inner {
            if !text[start..].ends_with(last.as_str()) {
                return false;
            }
            end -= last.len();
            inner = init;
        }

        // Remaining literals sit between wildcards; leftmost placement is optimal.
        let mut window = &text[start..end];
        for token in inner {
            if let PatternToken::Literal(lit) = token {
                match window.find(lit.as_str()) {
                    Some(pos) => window = &window[pos + lit.len()..],
                    None => return false,
                }
            }
        }
        true
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            match token {
                PatternToken::Literal(lit) => f.write_str(lit)?,
                PatternToken::Wildcard => write!(f, "{}", WILDCARD)?,
            }
        }
        Ok(())
    }
}

/// Which call form a pointcut targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointcutTarget {
    /// `Class->method()`
    InstanceMethod,
    /// `Class::method()`
    StaticMethod,
    /// `function()`
    Function,
}

/// Immutable, validated pointcut
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointcut {
    source: String,
    visibility: Option<Visibility>,
    target: PointcutTarget,
    namespace: Pattern,
    name: Pattern,
}

impl Pointcut {
    /// Parse and validate a pointcut string
    pub fn parse(text: &str) -> AspectResult<Self> {
        let source = text.trim();
        let (visibility, body) = split_visibility(source);
        let body = body.trim_start_matches(PATH_SEPARATOR);

        let stem = body
            .strip_suffix("()")
            .ok_or_else(|| AspectError::malformed_pointcut(text, "expected a trailing '()'"))?;

        let (target, owner, method) = match find_operator(stem) {
            Some((pos, CallKind::Static)) => {
                (PointcutTarget::StaticMethod, Some(&stem[..pos]), &stem[pos + 2..])
            }
            Some((pos, _)) => (PointcutTarget::InstanceMethod, Some(&stem[..pos]), &stem[pos + 2..]),
            None => (PointcutTarget::Function, None, stem),
        };

        if !is_pattern_segment(method) {
            return Err(AspectError::malformed_pointcut(
                text,
                format!("invalid function name '{}'", method),
            ));
        }

        if let Some(owner) = owner {
            if !owner.contains(PATH_SEPARATOR) {
                return Err(AspectError::malformed_pointcut(
                    text,
                    "class methods must be namespace-qualified (Namespace\\Class)",
                ));
            }
            if let Some(bad) = owner.split(PATH_SEPARATOR).find(|seg| !is_pattern_segment(seg)) {
                return Err(AspectError::malformed_pointcut(
                    text,
                    format!("invalid path segment '{}'", bad),
                ));
            }
        }

        let (namespace, name) = split_last_separator(body);
        Ok(Self {
            source: source.to_string(),
            visibility,
            target,
            namespace: Pattern::compile(namespace),
            name: Pattern::compile(name),
        })
    }

    /// Original pointcut text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Visibility restriction, if any
    pub fn visibility(&self) -> Option<Visibility> {
        self.visibility
    }

    /// Call form this pointcut was written for
    pub fn target(&self) -> PointcutTarget {
        self.target
    }

    /// Compiled namespace pattern
    pub fn namespace_pattern(&self) -> &Pattern {
        &self.namespace
    }

    /// Compiled name pattern (`Class->method()` or `function()`)
    pub fn name_pattern(&self) -> &Pattern {
        &self.name
    }

    /// Whether this pointcut covers the candidate call
    pub fn resolve(&self, candidate: &Signature) -> bool {
        self.namespace.matches(&candidate.namespace)
            && self.name.matches(&candidate.name_part())
            && self.visibility.map_or(true, |v| v == candidate.visibility)
    }

    /// Resolve against a textual signature; unparseable candidates never match
    pub fn resolve_str(&self, candidate: &str) -> bool {
        Signature::parse(candidate).map_or(false, |sig| self.resolve(&sig))
    }
}

impl FromStr for Pointcut {
    type Err = AspectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn split_visibility(text: &str) -> (Option<Visibility>, &str) {
    if let Some((word, rest)) = text.split_once(char::is_whitespace) {
        if let Some(visibility) = Visibility::from_keyword(word) {
            return (Some(visibility), rest.trim_start());
        }
    }
    (None, text)
}

fn is_pattern_segment(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == WILDCARD)
}
