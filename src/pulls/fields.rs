//! Resolution of logical field names onto raw GitHub JSON.
//!
//! A record is backed by one or more JSON objects (an issue, and maybe its
//! pull request). Each backing object comes with the set of field names it
//! answers for; some names are stored under a different, dotted path
//! (`user_login` lives at `user.login`). Names ending in `_at` are
//! timestamps and come back parsed.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

const TIMESTAMP_SUFFIX: &str = "_at";

#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("No {field:?} attribute on {record}")]
    UnknownAttribute { field: String, record: &'static str },

    #[error("{field} on {record} is missing or has the wrong type")]
    Missing { field: String, record: &'static str },

    #[error("{field} is not a valid timestamp: {value:?}")]
    Timestamp { field: String, value: String },
}

/// A resolved field: raw JSON, or a parsed timestamp for `*_at` names.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Json(&'a Value),
    Timestamp(DateTime<Utc>),
}

/// Names a backing object answers for, paired with that object.
pub type FieldSource<'a> = (&'static [&'static str], &'a Value);

/// Resolve `name` against the first source whose field set contains it.
///
/// `Ok(None)` means the field is known but absent (or null) in the data.
pub fn attribute_lookup<'a>(
    name: &str,
    field_map: &[FieldSource<'a>],
    mapped_fields: &[(&str, &str)],
    record: &'static str,
) -> Result<Option<FieldValue<'a>>, FieldError> {
    let Some(&(_, backing)) = field_map
        .iter()
        .find(|(names, _)| names.iter().any(|known| *known == name))
    else {
        return Err(FieldError::UnknownAttribute {
            field: name.to_string(),
            record,
        });
    };

    let path = mapped_fields
        .iter()
        .find(|(field, _)| *field == name)
        .map_or(name, |(_, path)| *path);

    let Some(value) = deep_get(backing, path) else {
        return Ok(None);
    };

    if path.ends_with(TIMESTAMP_SUFFIX) {
        let text = value.as_str().ok_or_else(|| FieldError::Timestamp {
            field: name.to_string(),
            value: value.to_string(),
        })?;
        return parse_timestamp(name, text).map(|ts| Some(FieldValue::Timestamp(ts)));
    }
    Ok(Some(FieldValue::Json(value)))
}

/// Follow a dotted path; a missing or null step yields None.
pub fn deep_get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| match current.get(key) {
        Some(Value::Null) | None => None,
        Some(next) => Some(next),
    })
}

fn parse_timestamp(field: &str, text: &str) -> Result<DateTime<Utc>, FieldError> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| FieldError::Timestamp {
            field: field.to_string(),
            value: text.to_string(),
        })
}

/// Typed accessors over [`attribute_lookup`] for one record type.
pub(crate) struct Resolver<'a> {
    pub(crate) sources: Vec<FieldSource<'a>>,
    pub(crate) mapped: &'static [(&'static str, &'static str)],
    pub(crate) record: &'static str,
}

impl<'a> Resolver<'a> {
    fn get(&self, name: &str) -> Result<Option<FieldValue<'a>>, FieldError> {
        attribute_lookup(name, &self.sources, self.mapped, self.record)
    }

    fn missing(&self, name: &str) -> FieldError {
        FieldError::Missing {
            field: name.to_string(),
            record: self.record,
        }
    }

    fn json(&self, name: &str) -> Result<Option<&'a Value>, FieldError> {
        match self.get(name)? {
            Some(FieldValue::Json(value)) => Ok(Some(value)),
            Some(FieldValue::Timestamp(_)) => Err(self.missing(name)),
            None => Ok(None),
        }
    }

    pub(crate) fn opt_string(&self, name: &str) -> Result<Option<String>, FieldError> {
        match self.json(name)? {
            Some(value) => value
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| self.missing(name)),
            None => Ok(None),
        }
    }

    pub(crate) fn string(&self, name: &str) -> Result<String, FieldError> {
        self.opt_string(name)?.ok_or_else(|| self.missing(name))
    }

    pub(crate) fn u64(&self, name: &str) -> Result<u64, FieldError> {
        self.json(name)?
            .and_then(Value::as_u64)
            .ok_or_else(|| self.missing(name))
    }

    /// Like [`Resolver::u64`], but an absent value is `default`.
    pub(crate) fn u64_or(&self, name: &str, default: u64) -> Result<u64, FieldError> {
        match self.json(name)? {
            Some(value) => value.as_u64().ok_or_else(|| self.missing(name)),
            None => Ok(default),
        }
    }

    pub(crate) fn array(&self, name: &str) -> Result<&'a [Value], FieldError> {
        match self.json(name)? {
            Some(value) => value
                .as_array()
                .map(Vec::as_slice)
                .ok_or_else(|| self.missing(name)),
            None => Ok(&[]),
        }
    }

    pub(crate) fn opt_timestamp(&self, name: &str) -> Result<Option<DateTime<Utc>>, FieldError> {
        match self.get(name)? {
            Some(FieldValue::Timestamp(ts)) => Ok(Some(ts)),
            Some(FieldValue::Json(_)) => Err(self.missing(name)),
            None => Ok(None),
        }
    }

    pub(crate) fn timestamp(&self, name: &str) -> Result<DateTime<Utc>, FieldError> {
        self.opt_timestamp(name)?.ok_or_else(|| self.missing(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const FIELDS: &[&str] = &["user_login", "title", "created_at", "closed_at"];
    const OTHER: &[&str] = &["additions"];
    const MAPPED: &[(&str, &str)] = &[("user_login", "user.login")];

    #[test]
    fn test_mapped_field_resolves_dotted_path() {
        let data = json!({"user": {"login": "alice"}});
        let value = attribute_lookup("user_login", &[(FIELDS, &data)], MAPPED, "PullRequest")
            .unwrap();
        assert_eq!(value, Some(FieldValue::Json(&json!("alice"))));
    }

    #[test]
    fn test_unknown_attribute_names_field_and_record() {
        let data = json!({"user": {"login": "alice"}});
        let err = attribute_lookup("milestone", &[(FIELDS, &data)], MAPPED, "PullRequest")
            .unwrap_err();
        assert_eq!(
            err,
            FieldError::UnknownAttribute {
                field: "milestone".to_string(),
                record: "PullRequest",
            }
        );
        assert!(err.to_string().contains("milestone"));
        assert!(err.to_string().contains("PullRequest"));
    }

    #[test]
    fn test_first_matching_source_wins() {
        let issue = json!({"title": "from issue"});
        let pull = json!({"title": "from pull", "additions": 5});
        let sources = [(FIELDS, &issue), (OTHER, &pull)];

        let title = attribute_lookup("title", &sources, MAPPED, "PullRequest").unwrap();
        assert_eq!(title, Some(FieldValue::Json(&json!("from issue"))));
        let additions = attribute_lookup("additions", &sources, MAPPED, "PullRequest").unwrap();
        assert_eq!(additions, Some(FieldValue::Json(&json!(5))));
    }

    #[test]
    fn test_absent_intermediate_short_circuits() {
        let data = json!({"user": null});
        assert_eq!(
            attribute_lookup("user_login", &[(FIELDS, &data)], MAPPED, "PullRequest").unwrap(),
            None
        );
        let data = json!({});
        assert_eq!(
            attribute_lookup("user_login", &[(FIELDS, &data)], MAPPED, "PullRequest").unwrap(),
            None
        );
    }

    #[test]
    fn test_timestamp_fields_are_parsed() {
        let data = json!({"created_at": "2021-01-02T03:04:05Z", "closed_at": null});
        let created = attribute_lookup("created_at", &[(FIELDS, &data)], MAPPED, "PullRequest")
            .unwrap();
        assert_eq!(
            created,
            Some(FieldValue::Timestamp(
                Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap()
            ))
        );
        let closed = attribute_lookup("closed_at", &[(FIELDS, &data)], MAPPED, "PullRequest")
            .unwrap();
        assert_eq!(closed, None);
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let data = json!({"created_at": "yesterday"});
        let err = attribute_lookup("created_at", &[(FIELDS, &data)], MAPPED, "PullRequest")
            .unwrap_err();
        assert!(matches!(err, FieldError::Timestamp { .. }));
    }

    #[test]
    fn test_deep_get() {
        let data = json!({"a": {"b": {"c": 1}}});
        assert_eq!(deep_get(&data, "a.b.c"), Some(&json!(1)));
        assert_eq!(deep_get(&data, "a.x.c"), None);
    }
}
