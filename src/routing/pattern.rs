//! Path pattern module
//!
//! Parses route patterns such as `/name/{name}` into segments and matches
//! concrete request paths against them, one path segment at a time.

use std::collections::BTreeMap;

use super::RouteError;

/// A single segment of a route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the request segment exactly
    Literal(String),
    /// Binds any single non-empty request segment to the given name
    Capture(String),
}

/// Parsed route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern string
    ///
    /// The pattern must be non-empty and start with `/`. A segment written as
    /// `{identifier}` is a capture; any other segment is matched literally.
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(invalid("pattern must start with '/'"));
        };

        let mut segments = Vec::new();
        for raw_segment in split_segments(rest) {
            let segment = parse_segment(raw_segment).map_err(|reason| invalid(&reason))?;
            if let Segment::Capture(name) = &segment {
                let duplicate = segments
                    .iter()
                    .any(|s| matches!(s, Segment::Capture(existing) if existing == name));
                if duplicate {
                    return Err(invalid(&format!("capture '{name}' is used more than once")));
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// The pattern as it was registered
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[cfg(test)]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a concrete request path, returning the captured parameters
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;
        let mut request_segments = split_segments(rest);
        let mut params = BTreeMap::new();

        for segment in &self.segments {
            let value = request_segments.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if literal != value {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    if value.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), value.to_string());
                }
            }
        }

        // Leftover segments mean the path is longer than the pattern
        if request_segments.next().is_some() {
            return None;
        }

        Some(PathParams(params))
    }

    /// Whether two patterns would match exactly the same set of paths
    ///
    /// Capture names do not matter, only their positions.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Capture(_), Segment::Capture(_)) => true,
                    _ => false,
                })
    }
}

/// Split the part after the leading `/` into segments. The root path has none.
fn split_segments(rest: &str) -> impl Iterator<Item = &str> {
    let mut iter = rest.split('/');
    if rest.is_empty() {
        // consume the single empty item so "/" yields zero segments
        iter.next();
    }
    iter
}

fn parse_segment(raw: &str) -> Result<Segment, String> {
    if let Some(inner) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if !is_identifier(inner) {
            return Err(format!("capture name '{inner}' is not a valid identifier"));
        }
        return Ok(Segment::Capture(inner.to_string()));
    }

    if raw.contains('{') || raw.contains('}') {
        return Err(format!("segment '{raw}' mixes braces with literal text"));
    }

    Ok(Segment::Literal(raw.to_string()))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parameters captured from the request path, keyed by capture name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(BTreeMap<String, String>);

impl PathParams {
    /// Look up a captured value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
