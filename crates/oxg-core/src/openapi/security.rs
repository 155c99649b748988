//! Security scheme validation.

use url::Url;

use crate::error::SecurityError;
use crate::raw::security::{OAuthFlow, SecurityScheme};

/// Registered HTTP authentication schemes (RFC 7235 registry).
const HTTP_SCHEMES: &[&str] = &[
    "basic",
    "bearer",
    "digest",
    "hoba",
    "mutual",
    "negotiate",
    "oauth",
    "scram-sha-1",
    "scram-sha-256",
    "vapid",
];

/// Validate a declared security scheme by its `type`.
pub fn validate_scheme(name: &str, scheme: &SecurityScheme) -> Result<(), SecurityError> {
    let invalid = |message: String| SecurityError::InvalidScheme {
        name: name.to_string(),
        message,
    };

    match scheme.scheme_type.as_str() {
        "apiKey" => {
            if scheme.name.as_deref().is_none_or(str::is_empty) {
                return Err(invalid("apiKey scheme requires a non-empty name".into()));
            }
            match scheme.location.as_deref() {
                Some("query" | "header" | "cookie") => {}
                Some(other) => {
                    return Err(invalid(format!("apiKey scheme has invalid `in` {other:?}")));
                }
                None => return Err(invalid("apiKey scheme requires `in`".into())),
            }
        }
        "http" => {
            let http_scheme = scheme
                .scheme
                .as_deref()
                .ok_or_else(|| invalid("http scheme requires `scheme`".into()))?;
            if http_scheme.to_lowercase() != http_scheme
                || !HTTP_SCHEMES.contains(&http_scheme)
            {
                return Err(invalid(format!(
                    "unknown http authentication scheme {http_scheme:?}"
                )));
            }
        }
        "mutualTLS" => {}
        "oauth2" => {
            let flows = scheme
                .flows
                .as_ref()
                .ok_or_else(|| invalid("oauth2 scheme requires `flows`".into()))?;
            let declared = [
                ("implicit", &flows.implicit, true, false),
                ("password", &flows.password, false, true),
                ("clientCredentials", &flows.client_credentials, false, true),
                ("authorizationCode", &flows.authorization_code, true, true),
            ];
            for (kind, flow, needs_auth_url, needs_token_url) in declared {
                let Some(flow) = flow else { continue };
                validate_flow(kind, flow, needs_auth_url, needs_token_url)
                    .map_err(invalid)?;
            }
        }
        "openIdConnect" => {
            let connect_url = scheme
                .open_id_connect_url
                .as_deref()
                .ok_or_else(|| invalid("openIdConnect scheme requires a URL".into()))?;
            Url::parse(connect_url)
                .map_err(|e| invalid(format!("invalid openIdConnectUrl: {e}")))?;
        }
        other => {
            return Err(invalid(format!("unknown security scheme type {other:?}")));
        }
    }
    Ok(())
}

fn validate_flow(
    kind: &str,
    flow: &OAuthFlow,
    needs_auth_url: bool,
    needs_token_url: bool,
) -> Result<(), String> {
    let check = |field: &str, value: &Option<String>, required: bool| -> Result<(), String> {
        match value {
            Some(url) => Url::parse(url)
                .map(drop)
                .map_err(|e| format!("{kind} flow: invalid {field}: {e}")),
            None if required => Err(format!("{kind} flow requires {field}")),
            None => Ok(()),
        }
    };
    check("authorizationUrl", &flow.authorization_url, needs_auth_url)?;
    check("tokenUrl", &flow.token_url, needs_token_url)?;
    check("refreshUrl", &flow.refresh_url, false)?;
    Ok(())
}

/// Check that every scope required of an oauth2 scheme exists in at least one
/// of its declared flows.
pub fn validate_scopes(
    name: &str,
    scheme: &SecurityScheme,
    scopes: &[String],
) -> Result<(), SecurityError> {
    if scheme.scheme_type != "oauth2" {
        return Ok(());
    }
    let flows = scheme.flows.as_ref();
    let has_scope = |scope: &str| {
        flows.is_some_and(|f| {
            [
                &f.implicit,
                &f.password,
                &f.client_credentials,
                &f.authorization_code,
            ]
            .into_iter()
            .flatten()
            .any(|flow| flow.scopes.contains_key(scope))
        })
    };
    for scope in scopes {
        if !has_scope(scope) {
            return Err(SecurityError::UnknownScope {
                scheme: name.to_string(),
                scope: scope.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme(yaml: &str) -> SecurityScheme {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn api_key_requires_name_and_in() {
        assert!(validate_scheme("k", &scheme("type: apiKey\nname: X-Key\nin: header\n")).is_ok());
        assert!(validate_scheme("k", &scheme("type: apiKey\nin: header\n")).is_err());
        assert!(validate_scheme("k", &scheme("type: apiKey\nname: X-Key\n")).is_err());
    }

    #[test]
    fn http_scheme_registry() {
        assert!(validate_scheme("h", &scheme("type: http\nscheme: bearer\n")).is_ok());
        assert!(validate_scheme("h", &scheme("type: http\nscheme: scram-sha-256\n")).is_ok());
        assert!(validate_scheme("h", &scheme("type: http\nscheme: Bearer\n")).is_err());
        assert!(validate_scheme("h", &scheme("type: http\nscheme: magic\n")).is_err());
    }

    #[test]
    fn oauth2_flow_urls() {
        let ok = scheme(
            r#"
type: oauth2
flows:
  authorizationCode:
    authorizationUrl: https://example.com/auth
    tokenUrl: https://example.com/token
    scopes:
      read: read access
"#,
        );
        assert!(validate_scheme("o", &ok).is_ok());
        assert!(validate_scopes("o", &ok, &["read".to_string()]).is_ok());
        assert!(matches!(
            validate_scopes("o", &ok, &["write".to_string()]),
            Err(SecurityError::UnknownScope { .. })
        ));

        let missing_token = scheme(
            "type: oauth2\nflows:\n  authorizationCode:\n    authorizationUrl: https://e.com/a\n",
        );
        assert!(validate_scheme("o", &missing_token).is_err());

        let bad_url =
            scheme("type: oauth2\nflows:\n  clientCredentials:\n    tokenUrl: \"not a url\"\n");
        assert!(validate_scheme("o", &bad_url).is_err());
    }

    #[test]
    fn openid_connect_url() {
        assert!(validate_scheme(
            "oidc",
            &scheme("type: openIdConnect\nopenIdConnectUrl: https://example.com/.well-known\n")
        )
        .is_ok());
        assert!(validate_scheme(
            "oidc",
            &scheme("type: openIdConnect\nopenIdConnectUrl: \"::nope::\"\n")
        )
        .is_err());
    }

    #[test]
    fn mutual_tls_has_no_constraints() {
        assert!(validate_scheme("m", &scheme("type: mutualTLS\n")).is_ok());
    }

    #[test]
    fn unknown_type_and_bad_in_are_rejected() {
        assert!(validate_scheme("x", &scheme("type: wizardry\n")).is_err());
        assert!(validate_scheme("k", &scheme("type: apiKey\nname: X-Key\nin: body\n")).is_err());
    }
}
