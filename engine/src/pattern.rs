//! Pattern compiler
//!
//! Compiles a `;`-separated pattern string into a [`GlobalFilter`]: an
//! ordered list of class/package rules plus four resource limits.
//!
//! ```text
//! pattern   := rule (";" rule)*
//! rule      := limit | classRule
//! limit     := ("maxdepth"|"maxrefs"|"maxbytes"|"maxarray") "=" uint
//! classRule := "!"? (module "/")? (exactName | prefix "*" | pkg ".*" | pkgRoot ".**")
//! ```
//!
//! Limits are checked before any rule. Rules are evaluated in the order they
//! were written and the first one with an opinion decides.

use crate::filter::{CheckInput, Filter};
use serialguard_shared::{FilterInfo, SerialClass, Status};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors reported while compiling a pattern string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern contains no rules or limits")]
    Empty,

    #[error("unknown limit: {0}")]
    UnknownLimit(String),

    #[error("invalid value \"{value}\" for limit {name}")]
    InvalidLimit { name: String, value: String },

    #[error("negative limit: {name}={value}")]
    NegativeLimit { name: String, value: i64 },

    #[error("class or package missing in \"{0}\"")]
    MissingName(String),

    #[error("package missing in \"{0}\"")]
    MissingPackage(String),

    #[error("module name is missing in \"{0}\"")]
    MissingModule(String),
}

/// Resource bounds, all inclusive. Unset limits are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_depth: i64,
    pub max_references: i64,
    pub max_array_length: i64,
    pub max_stream_bytes: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: i64::MAX,
            max_references: i64::MAX,
            max_array_length: i64::MAX,
            max_stream_bytes: i64::MAX,
        }
    }
}

impl Limits {
    /// True if the graph metrics of `info` are negative or above a bound.
    fn exceeded_by(&self, info: &FilterInfo<'_>) -> bool {
        info.references() < 0
            || info.depth() < 0
            || info.stream_bytes() < 0
            || info.references() > self.max_references
            || info.depth() > self.max_depth
            || info.stream_bytes() > self.max_stream_bytes
    }

    /// Apply a `name=value` token. Returns `Ok(false)` if the token is not a limit.
    fn parse_token(&mut self, token: &str) -> Result<bool, PatternError> {
        let Some((name, value)) = token.split_once('=') else {
            return Ok(false);
        };
        let slot = match name {
            "maxdepth" => &mut self.max_depth,
            "maxrefs" => &mut self.max_references,
            "maxarray" => &mut self.max_array_length,
            "maxbytes" => &mut self.max_stream_bytes,
            _ => return Err(PatternError::UnknownLimit(name.to_string())),
        };
        let parsed: i64 = value.parse().map_err(|_| PatternError::InvalidLimit {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        if parsed < 0 {
            return Err(PatternError::NegativeLimit {
                name: name.to_string(),
                value: parsed,
            });
        }
        *slot = parsed;
        Ok(true)
    }
}

/// How a rule compares a class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// `com.acme.Widget`
    Exact(String),
    /// `com.acme.Wid*`: the name starts with the prefix (possibly empty)
    Prefix(String),
    /// `com.acme.*`: the class is directly in the package
    Package(String),
    /// `com.acme.**`: the name starts with the package and a dot
    Subtree(String),
}

impl Matcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Exact(exact) => name == exact,
            Matcher::Prefix(prefix) | Matcher::Subtree(prefix) => name.starts_with(prefix.as_str()),
            Matcher::Package(pkg) => {
                name.starts_with(pkg.as_str()) && name.rfind('.') == Some(pkg.len())
            }
        }
    }
}

/// One compiled class/package rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRule {
    source: String,
    module: Option<String>,
    matcher: Matcher,
    negate: bool,
}

impl PatternRule {
    fn parse(token: &str) -> Result<Self, PatternError> {
        let (negate, rest) = match token.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        if rest.is_empty() {
            return Err(PatternError::MissingName(token.to_string()));
        }
        let (module, body) = match rest.split_once('/') {
            Some(("", _)) => return Err(PatternError::MissingModule(token.to_string())),
            Some((module, body)) => (Some(module.to_string()), body),
            None => (None, rest),
        };

        let matcher = if let Some(pkg) = body.strip_suffix(".**") {
            if pkg.is_empty() {
                return Err(PatternError::MissingPackage(token.to_string()));
            }
            // keep the dot so `com.acme.**` does not match `com.acmex.Foo`
            Matcher::Subtree(format!("{}.", pkg))
        } else if let Some(pkg) = body.strip_suffix(".*") {
            if pkg.is_empty() {
                return Err(PatternError::MissingPackage(token.to_string()));
            }
            Matcher::Package(pkg.to_string())
        } else if let Some(prefix) = body.strip_suffix('*') {
            Matcher::Prefix(prefix.to_string())
        } else {
            if body.is_empty() {
                return Err(PatternError::MissingName(token.to_string()));
            }
            Matcher::Exact(body.to_string())
        };

        Ok(Self {
            source: token.to_string(),
            module,
            matcher,
            negate,
        })
    }

    /// Module guard, if the rule was written as `module/...`.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    /// Status reported when the rule matches.
    pub fn status(&self) -> Status {
        if self.negate {
            Status::Rejected
        } else {
            Status::Allowed
        }
    }

    /// Status for `class`: the rule's status on a match, `Undecided` otherwise.
    pub fn apply(&self, class: &SerialClass) -> Status {
        if let Some(module) = &self.module {
            if class.module_name() != Some(module.as_str()) {
                return Status::Undecided;
            }
        }
        if self.matcher.matches(&binary_name(class)) {
            self.status()
        } else {
            Status::Undecided
        }
    }
}

impl fmt::Display for PatternRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn binary_name(class: &SerialClass) -> Cow<'_, str> {
    match class {
        SerialClass::Named { name, .. } => Cow::Borrowed(name.as_str()),
        other => Cow::Owned(other.qualified_name()),
    }
}

/// Compiled, immutable form of one pattern string.
#[derive(Debug, Clone)]
pub struct GlobalFilter {
    pattern: String,
    rules: Vec<PatternRule>,
    limits: Limits,
    check_component_type: bool,
}

impl GlobalFilter {
    /// Compile `pattern`, inspecting array component types.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        Self::compile_with(pattern, true)
    }

    /// Compile `pattern`. With `check_component_type` off, arrays are judged by
    /// their length only and are otherwise left `Undecided`.
    pub fn compile_with(pattern: &str, check_component_type: bool) -> Result<Self, PatternError> {
        let mut limits = Limits::default();
        let mut has_limits = false;
        let mut rules = Vec::new();

        for token in pattern.split(';').filter(|t| !t.is_empty()) {
            if limits.parse_token(token)? {
                has_limits = true;
                continue;
            }
            rules.push(PatternRule::parse(token)?);
        }

        if rules.is_empty() && !has_limits {
            return Err(PatternError::Empty);
        }

        debug!(
            pattern = %pattern,
            rules = rules.len(),
            has_limits,
            check_component_type,
            "compiled filter pattern"
        );

        Ok(Self {
            pattern: pattern.to_string(),
            rules,
            limits,
            check_component_type,
        })
    }

    /// The source pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn check_component_type(&self) -> bool {
        self.check_component_type
    }

    /// Wrap in a shareable [`Filter`].
    pub fn into_filter(self) -> Filter {
        Filter::new(self)
    }
}

impl CheckInput for GlobalFilter {
    fn check_input(&self, info: &FilterInfo<'_>) -> Status {
        if self.limits.exceeded_by(info) {
            return Status::Rejected;
        }
        let Some(mut class) = info.serial_class() else {
            return Status::Undecided;
        };
        if class.is_array() {
            if info.array_length() >= 0 && info.array_length() > self.limits.max_array_length {
                return Status::Rejected;
            }
            if !self.check_component_type {
                return Status::Undecided;
            }
            class = class.base_component();
        }
        if class.is_primitive() {
            return Status::Undecided;
        }
        self.rules
            .iter()
            .map(|rule| rule.apply(class))
            .find(|status| !status.is_undecided())
            .unwrap_or(Status::Undecided)
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl fmt::Display for GlobalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Compile `pattern` into a filter.
///
/// Returns `Ok(None)` when the pattern has neither rules nor limits. Never
/// touches registry state.
pub fn create_filter(pattern: &str) -> Result<Option<Filter>, PatternError> {
    match GlobalFilter::compile(pattern) {
        Ok(global) => Ok(Some(global.into_filter())),
        Err(PatternError::Empty) => Ok(None),
        Err(e) => Err(e),
    }
}
