use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Placeholder(String),
}

/// A parsed `pathTemplate` such as `roster/{team}/{season}`.
///
/// Placeholders never span a `/`, so substitution happens one path segment at a time and a
/// substituted value can never introduce a new segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Vec<TemplatePart>>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template is empty")]
    Empty,
    #[error("template contains an empty path segment")]
    EmptySegment,
    #[error("template contains reserved character {0:?}")]
    ReservedCharacter(char),
    #[error("unbalanced braces in segment `{0}`")]
    UnbalancedBraces(String),
    #[error("empty placeholder in segment `{0}`")]
    EmptyPlaceholder(String),
    #[error("placeholder `{0}` appears more than once")]
    RepeatedPlaceholder(String),
    #[error("no value supplied for placeholder `{0}`")]
    Unresolved(String),
}

/// Concrete path segments produced by [`PathTemplate::resolve`]. Segments are kept unencoded;
/// percent-encoding is left to the URL builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    segments: Vec<String>,
}

impl ResolvedPath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Strips the leading `/` the generator sometimes leaves on templates.
pub fn normalize_template(raw: &str) -> &str {
    raw.strip_prefix('/').unwrap_or(raw)
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let trimmed = normalize_template(raw);
        if trimmed.is_empty() {
            return Err(TemplateError::Empty);
        }
        if let Some(ch) = trimmed.chars().find(|ch| matches!(ch, '?' | '#') || ch.is_whitespace())
        {
            return Err(TemplateError::ReservedCharacter(ch));
        }

        let mut seen = BTreeSet::new();
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(TemplateError::EmptySegment);
            }
            let parts = parse_segment(segment)?;
            for part in &parts {
                if let TemplatePart::Placeholder(name) = part {
                    if !seen.insert(name.clone()) {
                        return Err(TemplateError::RepeatedPlaceholder(name.clone()));
                    }
                }
            }
            segments.push(parts);
        }

        Ok(Self { raw: trimmed.to_string(), segments })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().flatten().filter_map(|part| match part {
            TemplatePart::Placeholder(name) => Some(name.as_str()),
            TemplatePart::Literal(_) => None,
        })
    }

    pub fn resolve(&self, values: &BTreeMap<String, String>) -> Result<ResolvedPath, TemplateError> {
        let mut segments = Vec::with_capacity(self.segments.len());
        for parts in &self.segments {
            let mut segment = String::new();
            for part in parts {
                match part {
                    TemplatePart::Literal(text) => segment.push_str(text),
                    TemplatePart::Placeholder(name) => {
                        let value = values
                            .get(name)
                            .ok_or_else(|| TemplateError::Unresolved(name.clone()))?;
                        segment.push_str(value);
                    }
                }
            }
            segments.push(segment);
        }
        Ok(ResolvedPath { segments })
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(segment: &str) -> Result<Vec<TemplatePart>, TemplateError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = segment.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(TemplateError::UnbalancedBraces(segment.to_string()))
                        }
                        Some(next) => name.push(next),
                    }
                }
                if name.trim().is_empty() {
                    return Err(TemplateError::EmptyPlaceholder(segment.to_string()));
                }
                parts.push(TemplatePart::Placeholder(name));
            }
            '}' => return Err(TemplateError::UnbalancedBraces(segment.to_string())),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }
    Ok(parts)
}
