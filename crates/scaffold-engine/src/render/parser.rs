//! Placeholder syntax parser
//!
//! Splits a template into literal text and `{{ path | filter }}` placeholders.
//! There is no escape syntax: every `{{` opens a placeholder.

use super::filters::Filter;
use super::RenderError;
use crate::context::VariablePath;

/// A parsed piece of a template
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment<'a> {
    /// Literal text, copied verbatim
    Text(&'a str),
    /// A placeholder to substitute
    Placeholder(Placeholder),
}

/// A `{{ ... }}` placeholder
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Placeholder {
    /// Character offset of the opening `{{`
    pub offset: usize,
    /// Referenced variable
    pub path: VariablePath,
    /// Filters, applied left to right
    pub filters: Vec<Filter>,
}

/// Parse a template into segments
pub(crate) fn parse(template: &str) -> Result<Vec<Segment<'_>>, RenderError> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut byte_pos = 0;
    let mut char_pos = 0;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            segments.push(Segment::Text(&rest[..open]));
        }

        let offset = char_pos + rest[..open].chars().count();
        let body_start = open + 2;
        let close = rest[body_start..]
            .find("}}")
            .ok_or(RenderError::Unterminated { offset })?;
        let body = &rest[body_start..body_start + close];

        segments.push(Segment::Placeholder(parse_placeholder(body, offset)?));

        let consumed = body_start + close + 2;
        char_pos = offset + 2 + body.chars().count() + 2;
        byte_pos += consumed;
        rest = &template[byte_pos..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }

    Ok(segments)
}

fn parse_placeholder(body: &str, offset: usize) -> Result<Placeholder, RenderError> {
    let mut parts = body.split('|').map(str::trim);

    let reference = parts.next().unwrap_or_default();
    if reference.is_empty() {
        return Err(RenderError::Malformed {
            offset,
            message: "empty placeholder".to_string(),
        });
    }

    let path = VariablePath::parse(reference).ok_or_else(|| RenderError::Malformed {
        offset,
        message: format!("invalid variable reference `{}`", reference),
    })?;

    let filters = parts
        .map(|name| {
            if name.is_empty() {
                return Err(RenderError::Malformed {
                    offset,
                    message: "empty filter name".to_string(),
                });
            }
            Filter::from_name(name).ok_or_else(|| RenderError::UnknownFilter {
                offset,
                name: name.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Placeholder {
        offset,
        path,
        filters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_single_segment() {
        assert_eq!(parse("no placeholders").unwrap(), vec![Segment::Text("no placeholders")]);
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_placeholder_with_filters() {
        let segments = parse("fn {{ name | snake | upper }}()").unwrap();
        assert_eq!(segments.len(), 3);
        match &segments[1] {
            Segment::Placeholder(p) => {
                assert_eq!(p.offset, 3);
                assert_eq!(p.path.to_string(), "name");
                assert_eq!(p.filters, vec![Filter::Snake, Filter::Upper]);
            }
            other => panic!("unexpected segment {:?}", other),
        }
    }

    #[test]
    fn test_offsets_count_characters() {
        let segments = parse("héllo {{a}} wörld {{ b.c }}").unwrap();
        let offsets: Vec<usize> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(p) => Some(p.offset),
                Segment::Text(_) => None,
            })
            .collect();
        assert_eq!(offsets, vec![6, 18]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("ab {{ x").unwrap_err(), RenderError::Unterminated { offset: 3 });
        assert_eq!(parse("{{a}}{{  }}").unwrap_err().offset(), 5);
        assert!(matches!(
            parse("{{ 9lives }}").unwrap_err(),
            RenderError::Malformed { offset: 0, .. }
        ));
        assert_eq!(
            parse("{{ x | shout }}").unwrap_err(),
            RenderError::UnknownFilter {
                offset: 0,
                name: "shout".to_string()
            }
        );
        assert!(matches!(
            parse("{{ x | }}").unwrap_err(),
            RenderError::Malformed { .. }
        ));
    }
}
