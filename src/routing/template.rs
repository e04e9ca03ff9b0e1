//! Path templates.
//!
//! # Responsibilities
//! - Parse `/api/v2/tile/{L:int32}/{N:int32}` style templates
//! - Match a request path segment by segment
//! - Percent-decode captured variable values
//!
//! # Design Decisions
//! - Literal segments compare against the raw (still encoded) path
//! - A variable never captures an empty segment or a `/`
//! - No regex; a match is a single pass over the segments

use std::fmt;

use percent_encoding::percent_decode_str;

use crate::routing::RouteError;

/// Declared scalar type of a path variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int32,
    String,
}

impl ParamKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "int32" => Some(ParamKind::Int32),
            "string" => Some(ParamKind::String),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Int32 => "int32",
            ParamKind::String => "string",
        }
    }
}

/// One `/`-separated piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Variable { name: String, kind: ParamKind },
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

/// Variable values captured by a successful match, in template order.
pub type PathParams = Vec<(String, String)>;

impl PathTemplate {
    /// Parse a template. Variables are written `{name}` (string) or
    /// `{name:type}` with type `int32` or `string`.
    pub fn parse(template: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let rest = template
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;

        let mut segments = Vec::new();
        for raw in rest.split('/') {
            if raw.is_empty() {
                return Err(invalid("empty segment"));
            }
            if let Some(inner) = raw.strip_prefix('{') {
                let inner = inner
                    .strip_suffix('}')
                    .ok_or_else(|| invalid("unterminated variable"))?;
                let (name, kind) = match inner.split_once(':') {
                    Some((name, kind)) => (
                        name,
                        ParamKind::parse(kind)
                            .ok_or_else(|| invalid(&format!("unknown type `{kind}`")))?,
                    ),
                    None => (inner, ParamKind::String),
                };
                if name.is_empty() {
                    return Err(invalid("unnamed variable"));
                }
                let duplicate = segments.iter().any(
                    |s| matches!(s, Segment::Variable { name: existing, .. } if existing == name),
                );
                if duplicate {
                    return Err(RouteError::DuplicateVariable {
                        template: template.to_string(),
                        name: name.to_string(),
                    });
                }
                segments.push(Segment::Variable {
                    name: name.to_string(),
                    kind,
                });
            } else if raw.contains(['{', '}']) {
                return Err(invalid("variables must span a whole segment"));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Declared variables in template order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, ParamKind)> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable { name, kind } => Some((name.as_str(), *kind)),
            Segment::Literal(_) => None,
        })
    }

    /// Template with type annotations dropped, e.g. `/api/v2/tile/{L}/{N}`.
    /// Used as a low-cardinality label for logs and metrics.
    pub fn pattern(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable { name, .. } => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
        }
        out
    }

    /// Match a raw request path. Returns captured variables on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut params = Vec::new();

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(text) => {
                    if part != text {
                        return None;
                    }
                }
                Segment::Variable { name, .. } => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = percent_decode_str(part).decode_utf8_lossy().into_owned();
                    params.push((name.clone(), value));
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
