use log::debug;
use serde_json::{Map, Value};
use thiserror::Error;
use utils::FieldAs;

use crate::entry::{PackageEntry, VersionEntry};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("document has no _id")]
    MissingId,
    #[error("field {field} is malformed: {source}")]
    Malformed {
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("field {field} must be an object, got: {found}")]
    NotAnObject { field: String, found: Value },
}

fn malformed(field: impl Into<String>) -> impl FnOnce(serde_json::Error) -> NormalizeError {
    let field = field.into();
    move |source| NormalizeError::Malformed { field, source }
}

fn as_object<'a>(
    value: &'a Value,
    field: &str,
) -> Result<&'a Map<String, Value>, NormalizeError> {
    value.as_object().ok_or_else(|| NormalizeError::NotAnObject {
        field: field.to_owned(),
        found: value.clone(),
    })
}

// npm accepts `"github:user/repo"` shorthand as well as `{ type, url }`.
fn reference_url(repo: &Value) -> Option<String> {
    match repo {
        Value::String(url) => Some(url.clone()),
        Value::Object(repo_obj) => match repo_obj.field("url")? {
            Value::String(url) => Some(url.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Any repository shape that doesn't yield a string URL counts as no repository.
fn repository_url(blob: &Map<String, Value>, field: &str) -> Option<String> {
    let repo = blob.field("repository")?;
    let url = match repo {
        // Some old packuments wrap the reference in a one-element list.
        Value::Array(l) if l.len() == 1 => reference_url(&l[0]),
        _ => reference_url(repo),
    };
    if url.is_none() {
        debug!("Can't parse {}: {}", field, repo);
    }
    url
}

fn normalize_version(
    semver: &str,
    details: &Value,
    package_repo: Option<&str>,
) -> Result<VersionEntry, NormalizeError> {
    let field = format!("versions[{:?}]", semver);
    let details = as_object(details, &field)?;

    let repo = repository_url(details, &format!("{}.repository", field))
        .filter(|url| Some(url.as_str()) != package_repo);

    Ok(VersionEntry {
        version: semver.to_owned(),
        license: details.get("license").cloned(),
        dependencies: details.get("dependencies").cloned(),
        dev_dependencies: details.get("devDependencies").cloned(),
        repo,
    })
}

/// Reduces a raw package document to a [`PackageEntry`].
///
/// Returns `Ok(None)` for documents without a `versions` mapping. Versions keep the
/// order of the source mapping.
pub fn normalize_document(
    doc: &Map<String, Value>,
) -> Result<Option<PackageEntry>, NormalizeError> {
    let versions = match doc.field("versions") {
        None => return Ok(None),
        Some(versions) => as_object(versions, "versions")?,
    };

    let id = doc
        .field_as::<String>("_id")
        .ok_or(NormalizeError::MissingId)?
        .map_err(malformed("_id"))?;

    let repo = repository_url(doc, "repository");

    let versions = versions
        .iter()
        .filter(|(semver, _)| {
            if semver.is_empty() {
                debug!("Skipping empty version key in {}", id);
            }
            !semver.is_empty()
        })
        .map(|(semver, details)| normalize_version(semver, details, repo.as_deref()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(PackageEntry { id, repo, versions }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(o) => o,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn no_versions_is_none() {
        let d = doc(json!({"_id": "gone", "repository": {"url": "git://x"}}));
        assert!(normalize_document(&d).unwrap().is_none());

        let d = doc(json!({"_id": "gone", "versions": null}));
        assert!(normalize_document(&d).unwrap().is_none());
    }

    #[test]
    fn keeps_source_order() {
        let d = doc(json!({
            "_id": "ordered",
            "versions": {"2.0.0": {}, "1.0.0": {}, "10.0.0": {}}
        }));
        let entry = normalize_document(&d).unwrap().unwrap();
        let versions: Vec<_> = entry.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(versions, vec!["2.0.0", "1.0.0", "10.0.0"]);
    }

    #[test]
    fn type_is_dropped_and_shorthand_is_url() {
        let d = doc(json!({
            "_id": "a",
            "repository": {"type": "git", "url": "git+https://github.com/a/a.git"},
            "versions": {"1.0.0": {"repository": "github:a/fork"}}
        }));
        let entry = normalize_document(&d).unwrap().unwrap();
        assert_eq!(
            entry.repo.as_deref(),
            Some("git+https://github.com/a/a.git")
        );
        assert_eq!(entry.versions[0].repo.as_deref(), Some("github:a/fork"));
    }

    #[test]
    fn opaque_fields_pass_through() {
        let d = doc(json!({
            "_id": "b",
            "versions": {"0.1.0": {
                "license": {"type": "MIT", "url": "http://x"},
                "dependencies": {"c": "^1"},
                "devDependencies": {"d": "*"},
                "dist": {"tarball": "http://t"}
            }}
        }));
        let v = &normalize_document(&d).unwrap().unwrap().versions[0];
        assert_eq!(v.license, Some(json!({"type": "MIT", "url": "http://x"})));
        assert_eq!(v.dependencies, Some(json!({"c": "^1"})));
        assert_eq!(v.dev_dependencies, Some(json!({"d": "*"})));
        assert_eq!(v.repo, None);
    }

    #[test]
    fn empty_version_keys_are_skipped() {
        let d = doc(json!({"_id": "e", "versions": {"": {}, "1.0.0": {}}}));
        let entry = normalize_document(&d).unwrap().unwrap();
        assert_eq!(entry.versions.len(), 1);
        assert_eq!(entry.versions[0].version, "1.0.0");
    }

    #[test]
    fn unusable_repositories_are_no_repo() {
        let d = doc(json!({
            "_id": "legacy",
            "repository": [{"type": "git", "url": "git://old"}],
            "versions": {
                "0.1.0": {"repository": {"url": 42}},
                "0.2.0": {"repository": ["git://a", "git://b"]},
                "0.3.0": {"repository": 7}
            }
        }));
        let entry = normalize_document(&d).unwrap().unwrap();
        assert_eq!(entry.repo.as_deref(), Some("git://old"));
        assert!(entry.versions.iter().all(|v| v.repo.is_none()));
    }

    #[test]
    fn malformed_shapes_are_errors() {
        let d = doc(json!({"_id": "c", "versions": "1.0.0"}));
        assert!(matches!(
            normalize_document(&d),
            Err(NormalizeError::NotAnObject { .. })
        ));

        let d = doc(json!({"_id": "c", "versions": {"1.0.0": 5}}));
        match normalize_document(&d) {
            Err(NormalizeError::NotAnObject { field, .. }) => {
                assert_eq!(field, r#"versions["1.0.0"]"#)
            }
            other => panic!("unexpected: {:?}", other),
        }

        let d = doc(json!({"_id": 3, "versions": {}}));
        assert!(matches!(
            normalize_document(&d),
            Err(NormalizeError::Malformed { .. })
        ));

        let d = doc(json!({"versions": {}}));
        assert!(matches!(
            normalize_document(&d),
            Err(NormalizeError::MissingId)
        ));
    }
}
