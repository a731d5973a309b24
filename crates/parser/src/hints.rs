//! Request/response model hints read from handler signatures.

use codelore_model::Parameter;

/// Capitalized annotation names that never denote a data model
const NON_MODEL_NAMES: &[&str] = &[
    "Any",
    "AsyncSession",
    "BackgroundTasks",
    "Cookie",
    "Dict",
    "File",
    "Form",
    "Header",
    "HTMLResponse",
    "HttpRequest",
    "HttpResponse",
    "JSONResponse",
    "Optional",
    "PlainTextResponse",
    "RedirectResponse",
    "Request",
    "Response",
    "Session",
    "StreamingResponse",
    "UploadFile",
    "WebSocket",
];

const UNWRAPPED_GENERICS: &[&str] = &[
    "Optional",
    "Annotated",
    "List",
    "list",
    "Sequence",
    "Set",
    "set",
    "Iterable",
    "typing.Optional",
    "typing.List",
    "typing.Annotated",
];

/// Parameter names bound by the route path (`{item_id}`, `<int:user_id>`)
pub fn path_parameters(path: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find(['{', '<']) {
        let close_char = if rest[open..].starts_with('{') { '}' } else { '>' };
        let Some(len) = rest[open + 1..].find(close_char) else {
            break;
        };
        let inner = &rest[open + 1..open + 1 + len];
        let name = match close_char {
            '}' => inner.split(':').next().unwrap_or(inner),
            _ => inner.rsplit(':').next().unwrap_or(inner),
        };
        names.push(name.trim().to_string());
        rest = &rest[open + 1 + len + 1..];
    }
    names
}

/// First body-carrying parameter whose annotation names a model class
pub fn request_model_hint(parameters: &[Parameter], path: &str) -> Option<String> {
    let bound = path_parameters(path);
    parameters
        .iter()
        .filter(|p| p.name != "self" && p.name != "cls")
        .filter(|p| !bound.contains(&p.name))
        .filter(|p| {
            p.default.as_deref().map_or(true, |d| {
                !(d.starts_with("Depends(") || d.starts_with("Security("))
            })
        })
        .find_map(|p| p.annotation.as_deref().and_then(model_name))
}

/// Declared `response_model=`, else the return annotation
pub fn response_model_hint(response_model: Option<&str>, return_type: Option<&str>) -> Option<String> {
    response_model
        .and_then(model_name)
        .or_else(|| return_type.and_then(model_name))
}

/// Reduce an annotation to a model class name, unwrapping optional and collection wrappers
pub fn model_name(annotation: &str) -> Option<String> {
    let mut current = annotation.trim().to_string();
    loop {
        if let Some(single) = strip_none_union(&current) {
            current = single;
            continue;
        }
        let Some((head, inner)) = split_generic(&current) else {
            break;
        };
        if !UNWRAPPED_GENERICS.contains(&head) {
            return None;
        }
        current = first_top_level_arg(inner).trim().to_string();
    }

    let name = current.rsplit('.').next().unwrap_or(&current);
    let is_identifier = !current.is_empty()
        && current
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    let capitalized = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
    (is_identifier && capitalized && !NON_MODEL_NAMES.contains(&name)).then(|| name.to_string())
}

/// `Head[inner]` -> (`Head`, `inner`)
fn split_generic(text: &str) -> Option<(&str, &str)> {
    let open = text.find('[')?;
    let inner = text.strip_suffix(']')?.get(open + 1..)?;
    Some((text[..open].trim(), inner))
}

fn first_top_level_arg(inner: &str) -> &str {
    let mut depth = 0usize;
    for (idx, c) in inner.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return &inner[..idx],
            _ => {}
        }
    }
    inner
}

/// `Item | None` -> `Item`
fn strip_none_union(text: &str) -> Option<String> {
    if !text.contains('|') || text.contains('[') {
        return None;
    }
    let parts: Vec<&str> = text
        .split('|')
        .map(str::trim)
        .filter(|p| *p != "None")
        .collect();
    (parts.len() == 1).then(|| parts[0].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, annotation: Option<&str>, default: Option<&str>) -> Parameter {
        Parameter {
            name: name.into(),
            annotation: annotation.map(Into::into),
            default: default.map(Into::into),
        }
    }

    #[test]
    fn model_names_unwrap_wrappers() {
        assert_eq!(model_name("Item").as_deref(), Some("Item"));
        assert_eq!(model_name("Optional[Item]").as_deref(), Some("Item"));
        assert_eq!(model_name("List[schemas.Item]").as_deref(), Some("Item"));
        assert_eq!(model_name("Item | None").as_deref(), Some("Item"));
        assert_eq!(
            model_name("Annotated[ItemCreate, Body(embed=True)]").as_deref(),
            Some("ItemCreate")
        );
        assert_eq!(model_name("int"), None);
        assert_eq!(model_name("Dict[str, Item]"), None);
        assert_eq!(model_name("Request"), None);
    }

    #[test]
    fn path_parameters_from_both_styles() {
        assert_eq!(path_parameters("/items/{item_id}"), vec!["item_id"]);
        assert_eq!(path_parameters("/files/{path:path}"), vec!["path"]);
        assert_eq!(path_parameters("/users/<int:user_id>/<slug>"), vec!["user_id", "slug"]);
    }

    #[test]
    fn request_model_skips_dependencies_and_path_params() {
        let params = vec![
            param("item_id", Some("Item"), None),
            param("db", Some("Session"), Some("Depends(get_db)")),
            param("user", Some("User"), Some("Depends(current_user)")),
            param("payload", Some("ItemCreate"), None),
        ];
        assert_eq!(
            request_model_hint(&params, "/items/{item_id}").as_deref(),
            Some("ItemCreate")
        );
    }

    #[test]
    fn response_model_prefers_declared_keyword() {
        assert_eq!(
            response_model_hint(Some("List[Item]"), Some("dict")).as_deref(),
            Some("Item")
        );
        assert_eq!(response_model_hint(None, Some("Item")).as_deref(), Some("Item"));
        assert_eq!(response_model_hint(None, Some("HTMLResponse")), None);
    }
}
