//! Typed records produced by the structured payload channel
//!
//! The model emits an array of objects keyed by a `type` discriminator. The
//! set of types is open-ended: anything this crate does not recognize is
//! preserved as [`Record::Unknown`] with the raw value intact, so the
//! rendering layer can fall back to a generic card instead of losing data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One typed unit of structured output: a UI widget or a review comment
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Free-form markdown card
    Markdown(MarkdownWidget),
    /// Requirement snapshot card
    Snapshot(SnapshotWidget),
    /// Decision gateway offering the user a set of options
    Gateway(GatewayWidget),
    /// Stakeholder card
    KeyPerson(KeyPersonWidget),
    /// Document review comment
    Comment(ReviewComment),
    /// Anything with a missing, unrecognized, or ill-shaped `type`
    Unknown(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownWidget {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotWidget {
    pub title: String,
    pub fields: Vec<SnapshotField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotField {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayWidget {
    pub prompt: String,
    pub options: Vec<GatewayOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayOption {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPersonWidget {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stance: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewComment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Record {
    /// Build a record from a raw JSON value. Total: values that do not fit a
    /// known shape come back as [`Record::Unknown`], never an error.
    pub fn from_value(value: Value) -> Record {
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Record::Unknown(value);
        };
        let parsed = match kind {
            "markdown" => serde_json::from_value(value.clone()).map(Record::Markdown),
            "snapshot" => serde_json::from_value(value.clone()).map(Record::Snapshot),
            "gateway" => serde_json::from_value(value.clone()).map(Record::Gateway),
            "key_person" => serde_json::from_value(value.clone()).map(Record::KeyPerson),
            "comment" => serde_json::from_value(value.clone()).map(Record::Comment),
            _ => return Record::Unknown(value),
        };
        parsed.unwrap_or(Record::Unknown(value))
    }

    /// The `type` discriminator, when one is known or present
    pub fn record_type(&self) -> Option<&str> {
        match self {
            Record::Markdown(_) => Some("markdown"),
            Record::Snapshot(_) => Some("snapshot"),
            Record::Gateway(_) => Some("gateway"),
            Record::KeyPerson(_) => Some("key_person"),
            Record::Comment(_) => Some("comment"),
            Record::Unknown(value) => value.get("type").and_then(Value::as_str),
        }
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::Error as _;

        let body = match self {
            Record::Unknown(value) => return value.serialize(serializer),
            Record::Markdown(widget) => serde_json::to_value(widget),
            Record::Snapshot(widget) => serde_json::to_value(widget),
            Record::Gateway(widget) => serde_json::to_value(widget),
            Record::KeyPerson(widget) => serde_json::to_value(widget),
            Record::Comment(comment) => serde_json::to_value(comment),
        };
        let mut body = body.map_err(S::Error::custom)?;
        if let Value::Object(map) = &mut body {
            let kind = self.record_type().unwrap_or_default();
            map.insert("type".to_string(), Value::String(kind.to_string()));
        }
        body.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Record::from_value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_markdown_from_value() {
        let record = Record::from_value(json!({"type": "markdown", "content": "hi"}));
        assert_eq!(
            record,
            Record::Markdown(MarkdownWidget {
                content: "hi".to_string()
            })
        );
        assert_eq!(record.record_type(), Some("markdown"));
    }

    #[test]
    fn test_unknown_type_preserved() {
        let raw = json!({"type": "hologram", "payload": {"x": 1}});
        let record = Record::from_value(raw.clone());
        assert_eq!(record, Record::Unknown(raw));
        assert_eq!(record.record_type(), Some("hologram"));
    }

    #[test]
    fn test_missing_type_preserved() {
        let raw = json!({"body": "needs a deadline", "severity": "high"});
        let record = Record::from_value(raw.clone());
        assert_eq!(record, Record::Unknown(raw));
        assert_eq!(record.record_type(), None);
    }

    #[test]
    fn test_ill_shaped_known_type_falls_back() {
        // `content` must be a string; a number demotes the whole element.
        let raw = json!({"type": "markdown", "content": 7});
        assert_eq!(Record::from_value(raw.clone()), Record::Unknown(raw));
    }

    #[test]
    fn test_extra_fields_tolerated() {
        let record = Record::from_value(
            json!({"type": "key_person", "name": "Dana", "stance": "wary", "age": 44}),
        );
        let Record::KeyPerson(person) = record else {
            panic!("expected key_person");
        };
        assert_eq!(person.name, "Dana");
        assert_eq!(person.stance.as_deref(), Some("wary"));
    }

    #[test]
    fn test_serialize_reinjects_type_tag() {
        let record = Record::Gateway(GatewayWidget {
            prompt: "pick one".to_string(),
            options: vec![GatewayOption {
                id: "a".to_string(),
                label: "Accept".to_string(),
                description: None,
            }],
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "gateway");
        assert_eq!(value["options"][0]["label"], "Accept");
    }

    #[test]
    fn test_serde_round_trip() {
        let records = vec![
            Record::Markdown(MarkdownWidget {
                content: "# Terms".to_string(),
            }),
            Record::Snapshot(SnapshotWidget {
                title: "Budget".to_string(),
                fields: vec![SnapshotField {
                    label: "ceiling".to_string(),
                    value: "$40k".to_string(),
                }],
            }),
            Record::Comment(ReviewComment {
                quote: Some("within 5 days".to_string()),
                severity: Some("medium".to_string()),
                body: "ambiguous business vs calendar days".to_string(),
                suggestion: None,
            }),
            Record::Unknown(json!({"type": "custom", "blob": [1, 2, 3]})),
        ];
        let json = serde_json::to_string(&records).unwrap();
        let back: Vec<Record> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, records);
    }
}
