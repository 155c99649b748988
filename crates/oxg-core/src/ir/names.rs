//! Identifier derivation: normalized type names and route-derived
//! operation names.

use heck::{ToLowerCamelCase, ToPascalCase, ToShoutySnakeCase, ToSnakeCase};

use crate::openapi::{Path, PathSegment};

/// A name in every casing a backend might want.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    pub original: String,
    pub pascal_case: String,
    pub camel_case: String,
    pub snake_case: String,
    pub screaming_snake: String,
}

impl NormalizedName {
    pub fn as_str(&self) -> &str {
        &self.pascal_case
    }
}

/// Normalize an arbitrary document string into identifier form, computing
/// all casing variants.
pub fn normalize_name(name: &str) -> NormalizedName {
    let sanitized = sanitize_identifier(name);
    NormalizedName {
        original: name.to_string(),
        pascal_case: sanitized.to_pascal_case(),
        camel_case: sanitized.to_lower_camel_case(),
        snake_case: sanitized.to_snake_case(),
        screaming_snake: sanitized.to_shouty_snake_case(),
    }
}

/// Derive a camelCase operation name from the method and parsed path, for
/// operations without an `operationId`.
///
/// `GET /pets` becomes `listPets`, `GET /pets/{id}` becomes `getPet`,
/// `POST /users/{id}/messages` becomes `createUserMessages`.
pub fn route_to_name(method: &str, path: &Path) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut trailing_param = false;
    for segment in &path.segments {
        match segment {
            PathSegment::Param(_) => trailing_param = true,
            PathSegment::Literal(text) => {
                let mut any = false;
                for word in text.split(|c: char| !c.is_alphanumeric()) {
                    if !word.is_empty() {
                        words.push(word.to_string());
                        any = true;
                    }
                }
                if any {
                    trailing_param = false;
                }
            }
        }
    }

    let lowered;
    let prefix = match method {
        "GET" if trailing_param => "get",
        "GET" => "list",
        "POST" => "create",
        "PUT" => "update",
        "DELETE" => "delete",
        "PATCH" => "patch",
        other => {
            lowered = other.to_lowercase();
            &lowered
        }
    };

    if words.is_empty() {
        return prefix.to_string();
    }
    if trailing_param {
        if let Some(last) = words.pop() {
            words.push(singularize(&last));
        }
    }

    let mut name = prefix.to_string();
    for word in &words {
        name.push_str(&word.to_pascal_case());
    }
    name
}

/// Naive singularization for route-derived names.
fn singularize(word: &str) -> String {
    if word.ends_with("ies") && word.len() > 3 {
        format!("{}y", &word[..word.len() - 3])
    } else if word.ends_with("ses") || word.ends_with("xes") || word.ends_with("zes") {
        word[..word.len() - 2].to_string()
    } else if word.ends_with('s') && !word.ends_with("ss") && word.len() > 1 {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Strip a string down to identifier characters, separating runs with
/// underscores and guarding a leading digit.
fn sanitize_identifier(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut was_separator = false;
    for (i, ch) in name.chars().enumerate() {
        if ch.is_alphanumeric() {
            if i == 0 && ch.is_ascii_digit() {
                result.push('_');
            }
            if was_separator && !result.is_empty() {
                result.push('_');
            }
            result.push(ch);
            was_separator = false;
        } else {
            was_separator = true;
        }
    }
    if result.is_empty() {
        return "unnamed".to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi::path::parse_path;

    fn path(template: &str, params: &[&str]) -> Path {
        parse_path(template, |name| params.contains(&name)).unwrap()
    }

    #[test]
    fn normalizes_casings() {
        let name = normalize_name("pet-store item");
        assert_eq!(name.pascal_case, "PetStoreItem");
        assert_eq!(name.camel_case, "petStoreItem");
        assert_eq!(name.snake_case, "pet_store_item");
        assert_eq!(name.screaming_snake, "PET_STORE_ITEM");
    }

    #[test]
    fn leading_digit_is_guarded() {
        assert_eq!(normalize_name("2fa-code").pascal_case, "2faCode");
        assert_eq!(normalize_name("---").pascal_case, "Unnamed");
    }

    #[test]
    fn route_names() {
        assert_eq!(route_to_name("GET", &path("/pets", &[])), "listPets");
        assert_eq!(route_to_name("POST", &path("/pets", &[])), "createPets");
        assert_eq!(route_to_name("GET", &path("/pets/{id}", &["id"])), "getPet");
        assert_eq!(
            route_to_name("DELETE", &path("/stories/{id}", &["id"])),
            "deleteStory"
        );
        assert_eq!(
            route_to_name("PUT", &path("/users/{id}/settings", &["id"])),
            "updateUsersSettings"
        );
        assert_eq!(route_to_name("TRACE", &path("/", &[])), "trace");
    }
}
