//! Reverse URL generation for named routes.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;

use crate::error::NamedRouteError;
use crate::routing::matcher::{tokenize, Token};
use crate::routing::route::CompiledRoute;

/// Bytes escaped in a substituted value. `/` stays literal so that
/// multi-segment constraints like `.+` keep their meaning.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Build the path for `route`, substituting placeholders from `params`.
///
/// Parameters not consumed by the template are appended as a query string.
/// Values must satisfy the placeholder's constraint (or be a single
/// non-empty segment when unconstrained) and are percent-encoded into the
/// path. Matching decodes them again.
pub fn generate(
    route: &CompiledRoute,
    params: &BTreeMap<String, String>,
) -> Result<String, NamedRouteError> {
    let route_name = route.name().unwrap_or(route.uri()).to_string();
    let tokens = tokenize(route.uri()).map_err(|_| NamedRouteError::UnknownName(route_name.clone()))?;

    let mut path = String::new();
    let mut used = Vec::new();

    for token in tokens {
        match token {
            Token::Literal(text) => path.push_str(text),
            Token::Param(name) => {
                let value = params.get(name).ok_or_else(|| NamedRouteError::MissingParameter {
                    route: route_name.clone(),
                    param: name.to_string(),
                })?;
                if !satisfies(route.declaration.constraints.get(name), value) {
                    return Err(NamedRouteError::ConstraintViolation {
                        route: route_name.clone(),
                        param: name.to_string(),
                        value: value.clone(),
                    });
                }
                path.extend(utf8_percent_encode(value, SEGMENT));
                used.push(name);
            }
        }
    }

    let extra: Vec<_> = params
        .iter()
        .filter(|(key, _)| !used.contains(&key.as_str()))
        .collect();
    if !extra.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(extra)
            .finish();
        path.push('?');
        path.push_str(&query);
    }

    Ok(path)
}

fn satisfies(constraint: Option<&String>, value: &str) -> bool {
    match constraint {
        None => !value.is_empty() && !value.contains('/'),
        Some(pattern) => Regex::new(&format!("^(?:{})$", pattern))
            .map(|re| re.is_match(value))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::RouteDeclaration;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_generate_substitutes_params() {
        let route = RouteDeclaration::get("/users/{id}/posts/{post}", "h")
            .named("users.posts")
            .compile()
            .unwrap();
        let url = generate(&route, &params(&[("id", "123"), ("post", "9")])).unwrap();
        assert_eq!(url, "/users/123/posts/9");
    }

    #[test]
    fn test_generate_missing_param() {
        let route = RouteDeclaration::get("/users/{id}", "h")
            .named("users.show")
            .compile()
            .unwrap();
        let err = generate(&route, &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            NamedRouteError::MissingParameter {
                route: "users.show".into(),
                param: "id".into()
            }
        );
    }

    #[test]
    fn test_generate_extra_params_become_query() {
        let route = RouteDeclaration::get("/search", "h").named("search").compile().unwrap();
        let url = generate(&route, &params(&[("q", "rust router"), ("page", "2")])).unwrap();
        assert_eq!(url, "/search?page=2&q=rust+router");
    }

    #[test]
    fn test_generate_checks_constraints() {
        let route = RouteDeclaration::get("/items/{id}", "h")
            .named("items.show")
            .where_param("id", r"\d+")
            .compile()
            .unwrap();
        assert!(generate(&route, &params(&[("id", "42")])).is_ok());
        assert!(matches!(
            generate(&route, &params(&[("id", "abc")])),
            Err(NamedRouteError::ConstraintViolation { .. })
        ));

        let open = RouteDeclaration::get("/tags/{tag}", "h").named("tags").compile().unwrap();
        assert!(matches!(
            generate(&open, &params(&[("tag", "a/b")])),
            Err(NamedRouteError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_generate_encodes_reserved_characters() {
        let route = RouteDeclaration::get("/files/{name}", "h").named("f").compile().unwrap();
        let url = generate(&route, &params(&[("name", "a?b#c d%")])).unwrap();
        assert_eq!(url, "/files/a%3Fb%23c%20d%25");

        let matched = route.matcher().unwrap().captures(&url).unwrap();
        assert_eq!(matched["name"], "a?b#c d%");
    }
}
