//! SPARQL JSON results (`results.bindings[*].<var>.value`) flattened into
//! plain record objects.

use serde_json::{Map, Value};

use crate::error::{DirectoryError, Result};

const ENTITY_MARKER: &str = "entity/";

/// Flatten a SPARQL result document into a JSON array of records.
///
/// Rows that are not objects are passed through untouched so the batch
/// loader reports them. When a row lacks `qid` but carries a `person`
/// entity URI, the qid is taken from the URI.
pub fn flatten_bindings(document: Value) -> Result<Value> {
    let bindings = document
        .get("results")
        .and_then(|results| results.get("bindings"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            DirectoryError::invalid_input("wikidata results", "missing results.bindings array")
        })?;

    let rows = bindings
        .iter()
        .map(|row| match row.as_object() {
            Some(vars) => Value::Object(flatten_row(vars)),
            None => row.clone(),
        })
        .collect();
    Ok(Value::Array(rows))
}

fn flatten_row(vars: &Map<String, Value>) -> Map<String, Value> {
    let mut record: Map<String, Value> = vars
        .iter()
        .filter_map(|(var, binding)| {
            let value = binding.get("value")?;
            Some((var.clone(), value.clone()))
        })
        .collect();

    if !record.contains_key("qid") {
        let qid = record
            .get("person")
            .and_then(Value::as_str)
            .and_then(|uri| uri.rsplit_once(ENTITY_MARKER))
            .map(|(_, qid)| qid.to_string())
            .filter(|qid| !qid.is_empty());
        if let Some(qid) = qid {
            record.insert("qid".to_string(), Value::String(qid));
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flattens_binding_values() {
        let document = json!({
            "head": {"vars": ["qid", "personLabel", "x"]},
            "results": {"bindings": [
                {
                    "qid": {"type": "literal", "value": "Q123"},
                    "personLabel": {"type": "literal", "xml:lang": "de", "value": "Erika Muster"},
                    "x": {"type": "literal", "value": "erika"}
                }
            ]}
        });
        let rows = flatten_bindings(document).unwrap();
        assert_eq!(rows, json!([{"qid": "Q123", "personLabel": "Erika Muster", "x": "erika"}]));
    }

    #[test]
    fn test_qid_derived_from_person_uri() {
        let document = json!({"results": {"bindings": [
            {"person": {"type": "uri", "value": "http://www.wikidata.org/entity/Q42"}}
        ]}});
        let rows = flatten_bindings(document).unwrap();
        assert_eq!(rows[0]["qid"], "Q42");
    }

    #[test]
    fn test_missing_bindings_is_fatal() {
        let result = flatten_bindings(json!([{"qid": "Q1"}]));
        assert!(matches!(result, Err(DirectoryError::InvalidInput { .. })));
    }

    #[test]
    fn test_non_object_rows_pass_through() {
        let rows = flatten_bindings(json!({"results": {"bindings": [3]}})).unwrap();
        assert_eq!(rows, json!([3]));
    }
}
