//! Placeholder filters

use std::fmt;

use crate::value::Value;

/// A transformation applied to a placeholder value, e.g. `{{ name | snake }}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// snake_case (e.g., my_project)
    Snake,
    /// camelCase (e.g., myProject)
    Camel,
    /// PascalCase (e.g., MyProject)
    Pascal,
    /// kebab-case (e.g., my-project)
    Kebab,
    /// SHOUTY_SNAKE_CASE (e.g., MY_PROJECT)
    ShoutySnake,
    /// Title Case (e.g., My Project)
    Title,
    /// UPPERCASE
    Upper,
    /// lowercase
    Lower,
    /// Strip surrounding whitespace
    Trim,
    /// Serialize as YAML (any value)
    Yaml,
    /// Serialize as JSON (any value)
    Json,
}

impl Filter {
    /// Look up a filter by name
    pub fn from_name(name: &str) -> Option<Self> {
        let filter = match name {
            "snake" => Filter::Snake,
            "camel" => Filter::Camel,
            "pascal" => Filter::Pascal,
            "kebab" => Filter::Kebab,
            "shouty_snake" => Filter::ShoutySnake,
            "title" => Filter::Title,
            "upper" => Filter::Upper,
            "lower" => Filter::Lower,
            "trim" => Filter::Trim,
            "yaml" => Filter::Yaml,
            "json" => Filter::Json,
            _ => return None,
        };
        Some(filter)
    }

    /// Whether the filter accepts sequences and mappings
    pub fn accepts_structured(self) -> bool {
        matches!(self, Filter::Yaml | Filter::Json)
    }

    /// Apply a text filter to a canonical scalar string
    ///
    /// Serializing filters are handled by [`Filter::serialize`].
    pub fn apply_text(self, input: &str) -> String {
        use heck::{
            ToKebabCase, ToLowerCamelCase, ToPascalCase, ToShoutySnakeCase, ToSnakeCase,
            ToTitleCase,
        };

        match self {
            Filter::Snake => input.to_snake_case(),
            Filter::Camel => input.to_lower_camel_case(),
            Filter::Pascal => input.to_pascal_case(),
            Filter::Kebab => input.to_kebab_case(),
            Filter::ShoutySnake => input.to_shouty_snake_case(),
            Filter::Title => input.to_title_case(),
            Filter::Upper => input.to_uppercase(),
            Filter::Lower => input.to_lowercase(),
            Filter::Trim => input.trim().to_string(),
            Filter::Yaml | Filter::Json => input.to_string(),
        }
    }

    /// Serialize a value with the `yaml` or `json` filter
    ///
    /// Trailing newlines emitted by the serializer are removed so the output
    /// can be embedded inline.
    pub fn serialize(self, value: &Value) -> Result<String, String> {
        let text = match self {
            Filter::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string())?,
            Filter::Json => serde_json::to_string(value).map_err(|e| e.to_string())?,
            other => return Err(format!("`{}` is not a serializing filter", other)),
        };
        Ok(text.trim_end_matches('\n').to_string())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Filter::Snake => "snake",
            Filter::Camel => "camel",
            Filter::Pascal => "pascal",
            Filter::Kebab => "kebab",
            Filter::ShoutySnake => "shouty_snake",
            Filter::Title => "title",
            Filter::Upper => "upper",
            Filter::Lower => "lower",
            Filter::Trim => "trim",
            Filter::Yaml => "yaml",
            Filter::Json => "json",
        };
        f.write_str(name)
    }
}
