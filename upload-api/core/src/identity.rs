use crate::config::HeaderConfig;
use http::HeaderMap;
use std::collections::BTreeMap;
use thiserror::Error;

/// The caller identity asserted by trusted request headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub groups: Vec<String>,
    pub extras: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("one of these headers required for authorization: {0:?}")]
    MissingUserHeader(Vec<String>),

    #[error("no user header found")]
    EmptyUserHeader,
}

/// Extracts the caller identity from `headers` per the current snapshot.
///
/// The user is taken from the first configured user header present; its
/// absence is an error. Groups are taken the same way, but an identity may
/// legitimately belong to no groups, so absence yields an empty list. Extras
/// are collected from every header matching a configured prefix.
///
/// Extraction is purely mechanical: no authorization decision is made here,
/// and the result is deterministic for a given header set and snapshot.
pub fn extract_identity(
    headers: &HeaderMap,
    config: &HeaderConfig,
) -> Result<Identity, IdentityError> {
    let user = match match_headers(headers, &config.user_headers) {
        Some(values) => values
            .first()
            .cloned()
            .ok_or(IdentityError::EmptyUserHeader)?,
        None => {
            return Err(IdentityError::MissingUserHeader(
                config.user_headers.clone(),
            ))
        }
    };

    let groups = match_headers(headers, &config.group_headers).unwrap_or_default();
    let extras = extra_attributes(headers, &config.extra_prefix_headers);

    Ok(Identity {
        user,
        groups,
        extras,
    })
}

/// Returns the values of the first of `names` present in `headers`, or `None`
/// if no name matches. Values that are not valid UTF-8 are skipped.
fn match_headers(headers: &HeaderMap, names: &[String]) -> Option<Vec<String>> {
    for name in names {
        if headers.contains_key(name.as_str()) {
            let values = headers
                .get_all(name.as_str())
                .iter()
                .filter_map(|v| v.to_str().ok().map(str::to_string))
                .collect();
            return Some(values);
        }
    }
    None
}

fn extra_attributes(headers: &HeaderMap, prefixes: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut extras = BTreeMap::new();

    // Later prefixes overwrite earlier ones for the same derived key, so the
    // configured order is significant.
    for prefix in prefixes {
        for name in headers.keys() {
            if let Some(suffix) = strip_prefix_ignore_case(name.as_str(), prefix) {
                let key = unescape_extra_key(&suffix.to_ascii_lowercase());
                let values = headers
                    .get_all(name)
                    .iter()
                    .filter_map(|v| v.to_str().ok().map(str::to_string))
                    .collect();
                extras.insert(key, values);
            }
        }
    }

    extras
}

// Header names are ASCII, so slicing at the prefix length cannot split a
// character.
fn strip_prefix_ignore_case<'n>(name: &'n str, prefix: &str) -> Option<&'n str> {
    if name.len() >= prefix.len() && name[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&name[prefix.len()..])
    } else {
        None
    }
}

/// Percent-decodes a derived extra key. A key that does not decode to UTF-8
/// is recorded as-is rather than dropped.
fn unescape_extra_key(encoded: &str) -> String {
    percent_encoding::percent_decode_str(encoded)
        .decode_utf8()
        .map(|k| k.into_owned())
        .unwrap_or_else(|_| encoded.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                name.parse::<HeaderName>().expect("header name"),
                HeaderValue::from_str(value).expect("header value"),
            );
        }
        map
    }

    #[test]
    fn extracts_user_groups_and_extras() {
        let headers = headers(&[
            ("X-Remote-User", "alice"),
            ("X-Remote-Group", "g1"),
            ("X-Remote-Group", "g2"),
            ("X-Remote-Extra-Scope", "read"),
        ]);

        let identity =
            extract_identity(&headers, &HeaderConfig::default()).expect("should extract");
        assert_eq!(identity.user, "alice");
        assert_eq!(identity.groups, vec!["g1".to_string(), "g2".to_string()]);
        assert_eq!(
            identity.extras,
            BTreeMap::from([("scope".to_string(), vec!["read".to_string()])])
        );
    }

    #[test]
    fn missing_user_header_is_an_error() {
        let headers = headers(&[("X-Remote-Group", "g1")]);
        assert_eq!(
            extract_identity(&headers, &HeaderConfig::default()),
            Err(IdentityError::MissingUserHeader(vec![
                "X-Remote-User".to_string()
            ])),
        );
    }

    #[test]
    fn missing_groups_are_not_an_error() {
        let headers = headers(&[("X-Remote-User", "alice")]);
        let identity =
            extract_identity(&headers, &HeaderConfig::default()).expect("should extract");
        assert!(identity.groups.is_empty());
    }

    #[test]
    fn user_headers_scanned_in_configured_order() {
        let config = HeaderConfig {
            user_headers: vec!["X-Auth-User".to_string(), "X-Remote-User".to_string()],
            ..HeaderConfig::default()
        };
        let headers = headers(&[("X-Remote-User", "alice"), ("X-Auth-User", "bob")]);
        let identity = extract_identity(&headers, &config).expect("should extract");
        assert_eq!(identity.user, "bob");
    }

    #[test]
    fn extra_prefix_matches_case_insensitively() {
        // `HeaderMap` lower-cases names; the configured prefix is mixed-case.
        let headers = headers(&[("X-Remote-User", "alice"), ("x-remote-extra-team", "infra")]);
        let identity =
            extract_identity(&headers, &HeaderConfig::default()).expect("should extract");
        assert_eq!(identity.extras["team"], vec!["infra".to_string()]);
    }

    #[test]
    fn extra_keys_are_percent_decoded() {
        let headers = headers(&[
            ("X-Remote-User", "alice"),
            ("X-Remote-Extra-Org%20Unit", "storage"),
        ]);
        let identity =
            extract_identity(&headers, &HeaderConfig::default()).expect("should extract");
        assert_eq!(identity.extras["org unit"], vec!["storage".to_string()]);
    }

    #[test]
    fn undecodable_extra_key_is_kept_raw() {
        let headers = headers(&[
            ("X-Remote-User", "alice"),
            ("X-Remote-Extra-Bad%ff", "value"),
        ]);
        let identity =
            extract_identity(&headers, &HeaderConfig::default()).expect("should extract");
        assert_eq!(identity.extras["bad%ff"], vec!["value".to_string()]);
    }

    #[test]
    fn later_prefix_pass_wins_for_same_key() {
        let config = HeaderConfig {
            extra_prefix_headers: vec![
                "X-Remote-Extra-".to_string(),
                "X-Alt-Extra-".to_string(),
            ],
            ..HeaderConfig::default()
        };
        let headers = headers(&[
            ("X-Remote-User", "alice"),
            ("X-Remote-Extra-Scope", "read"),
            ("X-Alt-Extra-Scope", "write"),
        ]);
        let identity = extract_identity(&headers, &config).expect("should extract");
        assert_eq!(identity.extras["scope"], vec!["write".to_string()]);
    }
}
