use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Marker for a route path that cannot be resolved statically
pub const UNRESOLVED_PATH: &str = "<dynamic>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    /// Parse a method name case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            "patch" => Some(Self::Patch),
            "head" => Some(Self::Head),
            "options" => Some(Self::Options),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }

    /// Methods that carry a request body worth validating
    #[must_use]
    pub const fn accepts_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

/// A web endpoint bound to its handler symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Endpoint {
    /// `"{symbol}#{n}"`, n = ordinal among the handler's endpoints
    pub id: String,
    /// Handler symbol id
    pub symbol: String,
    pub http_method: HttpMethod,
    /// Normalized absolute path or [`UNRESOLVED_PATH`]
    pub path_pattern: String,
    /// Route matcher that recognized this endpoint
    pub matcher: String,
    /// Resolved class symbol id of the request model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_model: Option<String>,
    /// Resolved class symbol id of the response model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_model_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_model_hint: Option<String>,
}

impl Endpoint {
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.path_pattern == UNRESOLVED_PATH
    }

    /// `"GET /items/{id}"`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.http_method.as_str(), self.path_pattern)
    }
}

/// Normalize a literal route path: leading `/`, no repeated separators,
/// no trailing separator except for the root.
pub fn normalize_path_pattern(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    out.push('/');
    for segment in raw.trim().split('/').filter(|s| !s.is_empty()) {
        if out.len() > 1 {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Join a router prefix and a route path, then normalize
pub fn join_prefixed(prefix: &str, path: &str) -> String {
    normalize_path_pattern(&format!("{prefix}/{path}"))
}

/// True for the unresolved marker or a normalized absolute path
pub fn is_normalized_path(pattern: &str) -> bool {
    pattern == UNRESOLVED_PATH
        || (pattern.starts_with('/')
            && !pattern.contains("//")
            && (pattern == "/" || !pattern.ends_with('/')))
}
