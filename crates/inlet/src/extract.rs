//! 🔎 Content extraction — pull `record[field]` (or `record[field][subfield]`) out of
//! anything that can be looked up by key.
//!
//! A JSON line, an Elasticsearch hit, a Solr doc: all of them are just "give me the
//! value under this name" with extra steps. [`FieldIndexable`] is that one step.
//! [`extract_content`] does the lookup and reports a recoverable [`ExtractError`]
//! when the path isn't there, so readers can log, skip, and keep going.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// How many record-level failures a remote reader will log before going quiet.
pub const DEFAULT_FAILURE_LOG_CAP: u32 = 10;

/// 🗝️ The only capability extraction needs: keyed lookup, plus an optional store-native id.
pub trait FieldIndexable {
    /// `None` means "no such field", or "this record isn't indexable at all".
    fn get_field(&self, name: &str) -> Option<&Value>;

    fn native_id(&self) -> Option<&str> {
        None
    }

    /// Whether keyed lookup makes sense for this record. Non-objects say no.
    fn is_indexable(&self) -> bool {
        true
    }
}

impl FieldIndexable for Map<String, Value> {
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl FieldIndexable for Value {
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(name))
    }

    fn is_indexable(&self) -> bool {
        self.is_object()
    }
}

/// 📡 One entry of `hits.hits` in an Elasticsearch search response.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

impl FieldIndexable for SearchHit {
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.source.as_ref().and_then(|s| s.get_field(name))
    }

    fn native_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn is_indexable(&self) -> bool {
        self.source.as_ref().is_some_and(Value::is_object)
    }
}

/// ☀️ A Solr document. Its native id lives in the `id` field, like a name tag sewn into a collar.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct SolrDocument(pub Map<String, Value>);

impl FieldIndexable for SolrDocument {
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    fn native_id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }
}

/// ✅ What a successful extraction hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Only populated when the caller asked for it.
    pub native_id: Option<String>,
    /// `field` or `field/subfield`.
    pub field_path: String,
    pub content: String,
}

/// ⚠️ Recoverable: the reader logs it and moves on to the next record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("record is not indexable")]
    NotIndexable,
    #[error("field '{0}' is missing or null")]
    MissingField(String),
    #[error("subfield '{0}' is missing or null")]
    MissingSubfield(String),
    #[error("record has no native id")]
    MissingId,
}

/// 🎯 Look up `field` (then `subfield`, if given) and render it as content.
///
/// `include_id` asks for the store-native id too; a record without one is an error
/// rather than a silently id-less result.
pub fn extract_content<R>(
    record: &R,
    field: &str,
    subfield: Option<&str>,
    include_id: bool,
) -> Result<Extracted, ExtractError>
where
    R: FieldIndexable + ?Sized,
{
    if !record.is_indexable() {
        return Err(ExtractError::NotIndexable);
    }

    let outer = record
        .get_field(field)
        .ok_or_else(|| ExtractError::MissingField(field.to_string()))?;

    let (value, field_path) = match subfield {
        Some(sub) => {
            if !outer.is_object() {
                return Err(ExtractError::NotIndexable);
            }
            let inner = outer
                .get_field(sub)
                .ok_or_else(|| ExtractError::MissingSubfield(sub.to_string()))?;
            (inner, format!("{field}/{sub}"))
        }
        None => (outer, field.to_string()),
    };

    let content = match render_content(value) {
        Some(content) => content,
        None => {
            return Err(match subfield {
                Some(sub) => ExtractError::MissingSubfield(sub.to_string()),
                None => ExtractError::MissingField(field.to_string()),
            });
        }
    };

    let native_id = if include_id {
        Some(
            record
                .native_id()
                .ok_or(ExtractError::MissingId)?
                .to_string(),
        )
    } else {
        None
    };

    Ok(Extracted {
        native_id,
        field_path,
        content,
    })
}

/// 📄 Turn a JSON value into document text.
///
/// Strings verbatim. Arrays of strings (hello, multi-valued Solr fields) joined by
/// newlines. `null` is absent. Anything else is rendered as compact JSON.
pub fn render_content(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_string) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        other => Some(other.to_string()),
    }
}

/// 🔇 A bounded counter for "may I still log this failure?".
///
/// Remote readers hold one each so a systematically broken index can't flood the logs.
#[derive(Debug, Clone)]
pub struct FailureLogBudget {
    remaining: u32,
}

impl FailureLogBudget {
    pub fn new(cap: u32) -> Self {
        Self { remaining: cap }
    }

    /// Spends one unit if any are left.
    pub fn try_spend(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

impl Default for FailureLogBudget {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_LOG_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(value: Value) -> SearchHit {
        serde_json::from_value(value).expect("hit fixture should deserialize")
    }

    #[test]
    fn the_one_where_a_plain_field_comes_out_clean() {
        let record = json!({"id": 1, "text": "Interstellar was incredible."});
        let extracted = extract_content(&record, "text", None, false).expect("field exists");
        assert_eq!(extracted.content, "Interstellar was incredible.");
        assert_eq!(extracted.field_path, "text");
        assert_eq!(extracted.native_id, None);
    }

    #[test]
    fn the_one_where_the_subfield_is_nested_one_level_down() {
        let record = hit(json!({
            "_id": "doc-7",
            "_source": {"body": {"abstract": "Ta2O5 nanorods", "title": "x"}}
        }));
        let extracted =
            extract_content(&record, "body", Some("abstract"), true).expect("subfield exists");
        assert_eq!(extracted.content, "Ta2O5 nanorods");
        assert_eq!(extracted.field_path, "body/abstract");
        assert_eq!(extracted.native_id.as_deref(), Some("doc-7"));
    }

    #[test]
    fn the_one_where_missing_paths_are_recoverable_not_fatal() {
        let record = json!({"title": "no text here"});
        assert_eq!(
            extract_content(&record, "text", None, false),
            Err(ExtractError::MissingField("text".into()))
        );
        assert_eq!(
            extract_content(&record, "title", Some("inner"), false),
            Err(ExtractError::NotIndexable)
        );
        let nested = json!({"body": {"other": 1}});
        assert_eq!(
            extract_content(&nested, "body", Some("abstract"), false),
            Err(ExtractError::MissingSubfield("abstract".into()))
        );
    }

    #[test]
    fn the_one_where_a_non_object_record_is_not_indexable() {
        let record = json!([1, 2, 3]);
        assert_eq!(
            extract_content(&record, "text", None, false),
            Err(ExtractError::NotIndexable)
        );
        let sourceless = hit(json!({"_id": "x"}));
        assert_eq!(
            extract_content(&sourceless, "text", None, false),
            Err(ExtractError::NotIndexable)
        );
    }

    #[test]
    fn the_one_where_null_content_counts_as_missing() {
        let record = json!({"text": null});
        assert_eq!(
            extract_content(&record, "text", None, false),
            Err(ExtractError::MissingField("text".into()))
        );
    }

    #[test]
    fn the_one_where_include_id_demands_an_id() {
        let record = hit(json!({"_source": {"text": "orphan"}}));
        assert_eq!(
            extract_content(&record, "text", None, true),
            Err(ExtractError::MissingId)
        );
    }

    #[test]
    fn the_one_where_solr_multivalued_fields_get_joined() {
        let doc: SolrDocument =
            serde_json::from_value(json!({"id": "s1", "text": ["first", "second"]}))
                .expect("solr doc");
        let extracted = extract_content(&doc, "text", None, true).expect("field exists");
        assert_eq!(extracted.content, "first\nsecond");
        assert_eq!(extracted.native_id.as_deref(), Some("s1"));
    }

    #[test]
    fn the_one_where_numbers_are_rendered_as_json_text() {
        assert_eq!(render_content(&json!(42)), Some("42".to_string()));
        assert_eq!(render_content(&json!({"a": 1})), Some("{\"a\":1}".to_string()));
        assert_eq!(render_content(&Value::Null), None);
    }

    #[test]
    fn the_one_where_the_log_budget_runs_dry_after_ten() {
        let mut budget = FailureLogBudget::default();
        let spent = (0..25).filter(|_| budget.try_spend()).count();
        assert_eq!(spent, 10);
    }

    #[test]
    fn the_one_where_extraction_never_touches_the_input() {
        let record = json!({"text": "same as before"});
        let before = record.clone();
        let _ = extract_content(&record, "text", None, false);
        assert_eq!(record, before);
    }
}
