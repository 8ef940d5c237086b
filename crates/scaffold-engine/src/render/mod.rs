//! Placeholder rendering
//!
//! Expands `{{ path }}`, `{{ path.field }}` and `{{ path | filter | ... }}` in
//! node names and file contents. Rendering is single-pass and left to right:
//! substituted text is never scanned again, so values containing `{{` are
//! emitted verbatim. A failure anywhere in the template returns an error and
//! no partial output.

mod filters;
mod parser;

use std::borrow::Cow;

use thiserror::Error;

pub use filters::Filter;

use crate::context::{VariableContext, VariablePath};
use crate::value::{Value, ValueKind};
use parser::Segment;

/// Rendering failure, located by the character offset of the offending `{{`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// `{{` without a matching `}}`
    #[error("unterminated placeholder at offset {offset}")]
    Unterminated {
        /// Offset of the opening `{{`
        offset: usize,
    },

    /// Empty placeholder or invalid variable reference
    #[error("{message} at offset {offset}")]
    Malformed {
        /// Offset of the opening `{{`
        offset: usize,
        /// What is wrong with the placeholder
        message: String,
    },

    /// Filter name not recognized
    #[error("unknown filter `{name}` at offset {offset}")]
    UnknownFilter {
        /// Offset of the opening `{{`
        offset: usize,
        /// Filter name as written
        name: String,
    },

    /// Referenced variable is not bound
    #[error("unbound variable `{name}` at offset {offset}")]
    Unbound {
        /// Offset of the opening `{{`
        offset: usize,
        /// Dotted variable path
        name: String,
    },

    /// A sequence or mapping reached a text position
    #[error("`{name}` is a {kind} and cannot be rendered as text at offset {offset} (use `yaml` or `json`)")]
    NotScalar {
        /// Offset of the opening `{{`
        offset: usize,
        /// Dotted variable path
        name: String,
        /// Kind of the value
        kind: ValueKind,
    },

    /// A serializing filter failed
    #[error("filter `{filter}` failed at offset {offset}: {message}")]
    FilterFailed {
        /// Offset of the opening `{{`
        offset: usize,
        /// Filter that failed
        filter: Filter,
        /// Serializer message
        message: String,
    },
}

impl RenderError {
    /// Character offset of the placeholder that failed
    pub fn offset(&self) -> usize {
        match self {
            RenderError::Unterminated { offset }
            | RenderError::Malformed { offset, .. }
            | RenderError::UnknownFilter { offset, .. }
            | RenderError::Unbound { offset, .. }
            | RenderError::NotScalar { offset, .. }
            | RenderError::FilterFailed { offset, .. } => *offset,
        }
    }
}

/// Renders templates against a variable context
pub struct Renderer;

impl Renderer {
    /// Render a template
    ///
    /// # Arguments
    /// * `template` - Text containing `{{ ... }}` placeholders
    /// * `context` - Variables to substitute
    ///
    /// # Returns
    /// The fully substituted text, or the first failure encountered
    pub fn render(template: &str, context: &VariableContext) -> Result<String, RenderError> {
        let segments = parser::parse(template)?;
        let mut output = String::with_capacity(template.len());

        for segment in segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Placeholder(placeholder) => {
                    let value = context.resolve_path(&placeholder.path).map_err(|e| {
                        RenderError::Unbound {
                            offset: placeholder.offset,
                            name: e.name,
                        }
                    })?;
                    let text =
                        apply_filters(value, &placeholder.path, &placeholder.filters, placeholder.offset)?;
                    output.push_str(&text);
                }
            }
        }

        Ok(output)
    }

    /// List the variable paths a template references, in order of appearance
    ///
    /// Duplicates are kept. Fails with the same syntax errors as
    /// [`Renderer::render`].
    pub fn placeholders(template: &str) -> Result<Vec<VariablePath>, RenderError> {
        Ok(parser::parse(template)?
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(p) => Some(p.path),
                Segment::Text(_) => None,
            })
            .collect())
    }
}

fn apply_filters(
    value: &Value,
    path: &VariablePath,
    filters: &[Filter],
    offset: usize,
) -> Result<String, RenderError> {
    let mut current: Cow<'_, Value> = Cow::Borrowed(value);

    for &filter in filters {
        let next = if filter.accepts_structured() {
            filter
                .serialize(&current)
                .map_err(|message| RenderError::FilterFailed {
                    offset,
                    filter,
                    message,
                })?
        } else {
            filter.apply_text(&scalar_text(&current, path, offset)?)
        };
        current = Cow::Owned(Value::String(next));
    }

    scalar_text(&current, path, offset)
}

fn scalar_text(value: &Value, path: &VariablePath, offset: usize) -> Result<String, RenderError> {
    value
        .to_canonical_string()
        .ok_or_else(|| RenderError::NotScalar {
            offset,
            name: path.to_string(),
            kind: value.kind(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> VariableContext {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            "{project_name: my-app, port: 8080, debug: false, ratio: 0.25, \
             tags: [web, api], author: {name: Jo, email: jo@example.com}, \
             tricky: '{{ port }}'}",
        )
        .unwrap();
        let Value::Mapping(map) = Value::try_from(yaml).unwrap() else {
            panic!("expected mapping");
        };
        VariableContext::new().push_layer("test", map).unwrap()
    }

    #[test]
    fn test_no_placeholders_unchanged() {
        let text = "plain text with { single } braces";
        assert_eq!(Renderer::render(text, &ctx()).unwrap(), text);
    }

    #[test]
    fn test_scalars_render_canonically() {
        let out = Renderer::render(
            "{{project_name}}:{{ port }}:{{ debug }}:{{ ratio }}:{{ author.email }}",
            &ctx(),
        )
        .unwrap();
        assert_eq!(out, "my-app:8080:false:0.25:jo@example.com");
    }

    #[test]
    fn test_filters_chain() {
        let c = ctx();
        assert_eq!(
            Renderer::render("{{ project_name | pascal }}", &c).unwrap(),
            "MyApp"
        );
        assert_eq!(
            Renderer::render("{{ project_name | snake | upper }}", &c).unwrap(),
            "MY_APP"
        );
        assert_eq!(Renderer::render("{{ tags | json }}", &c).unwrap(), r#"["web","api"]"#);
        assert_eq!(Renderer::render("{{ port | json }}", &c).unwrap(), "8080");
    }

    #[test]
    fn test_substituted_text_not_rescanned() {
        assert_eq!(Renderer::render("{{ tricky }}", &ctx()).unwrap(), "{{ port }}");
    }

    #[test]
    fn test_structured_value_requires_serializer() {
        let err = Renderer::render("tags: {{ tags }}", &ctx()).unwrap_err();
        assert_eq!(
            err,
            RenderError::NotScalar {
                offset: 6,
                name: "tags".to_string(),
                kind: ValueKind::Sequence
            }
        );
        assert!(Renderer::render("{{ tags | upper }}", &ctx()).is_err());
    }

    #[test]
    fn test_unbound_reports_offset() {
        let err = Renderer::render("ok {{ port }} {{ missing.field }}", &ctx()).unwrap_err();
        assert_eq!(
            err,
            RenderError::Unbound {
                offset: 14,
                name: "missing.field".to_string()
            }
        );
    }

    #[test]
    fn test_placeholders_listed_in_order() {
        let paths = Renderer::placeholders("{{ a }}/{{ b.c | snake }}/{{ a }}").unwrap();
        let names: Vec<String> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["a", "b.c", "a"]);
    }
}
