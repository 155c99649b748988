//! Parameter resolution: locations, styles, explode defaults.

use std::fmt;

use crate::error::OperationError;
use crate::schema::SchemaId;

/// Where a parameter lives on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Path => "path",
            ParameterLocation::Cookie => "cookie",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, OperationError> {
        match raw {
            "query" => Ok(ParameterLocation::Query),
            "header" => Ok(ParameterLocation::Header),
            "path" => Ok(ParameterLocation::Path),
            "cookie" => Ok(ParameterLocation::Cookie),
            _ => Err(OperationError::UnknownParameterLocation(raw.to_string())),
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialization style of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Simple,
    Label,
    Matrix,
    Form,
    PipeDelimited,
    DeepObject,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Simple => "simple",
            Style::Label => "label",
            Style::Matrix => "matrix",
            Style::Form => "form",
            Style::PipeDelimited => "pipeDelimited",
            Style::DeepObject => "deepObject",
        }
    }

    /// Default style for a location: path and header use `simple`, query and
    /// cookie use `form`.
    pub fn default_for(location: ParameterLocation) -> Style {
        match location {
            ParameterLocation::Path | ParameterLocation::Header => Style::Simple,
            ParameterLocation::Query | ParameterLocation::Cookie => Style::Form,
        }
    }

    /// Parse and validate a style for a location; any other combination is
    /// fatal.
    pub fn parse(name: &str, location: ParameterLocation) -> Result<Style, OperationError> {
        let style = match name {
            "simple" => Style::Simple,
            "label" => Style::Label,
            "matrix" => Style::Matrix,
            "form" => Style::Form,
            "pipeDelimited" => Style::PipeDelimited,
            "deepObject" => Style::DeepObject,
            _ => {
                return Err(OperationError::InvalidStyle {
                    style: name.to_string(),
                    location: location.as_str().to_string(),
                });
            }
        };
        let allowed: &[Style] = match location {
            ParameterLocation::Path => &[Style::Simple, Style::Label, Style::Matrix],
            ParameterLocation::Query => &[Style::Form, Style::PipeDelimited, Style::DeepObject],
            ParameterLocation::Header => &[Style::Simple],
            ParameterLocation::Cookie => &[Style::Form],
        };
        if !allowed.contains(&style) {
            return Err(OperationError::InvalidStyle {
                style: name.to_string(),
                location: location.as_str().to_string(),
            });
        }
        Ok(style)
    }

    /// `explode` defaults to true for the form styles, false otherwise.
    pub fn default_explode(&self) -> bool {
        matches!(self, Style::Form)
    }
}

/// A resolved parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub description: Option<String>,
    pub required: bool,
    pub deprecated: bool,
    /// Plain schema; mutually exclusive with `content`.
    pub schema: Option<SchemaId>,
    /// Single content-type entry when serialized as a document.
    pub content: Option<(String, super::MediaType)>,
    pub style: Style,
    pub explode: bool,
    pub allow_reserved: bool,
}
