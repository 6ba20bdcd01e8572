//! Typed schema of the `data.json` export (DCAT-US, as written by
//! ckanext-datajson)
//!
//! The document is validated once when it is read. Top-level fields are
//! required; dataset, distribution and theme records that fail to parse
//! are kept as raw values so the importer can report and skip them without
//! rejecting the whole document. The same goes for a dataset's publisher
//! and each entry of its `theme` and `keyword` lists, so one bad value never
//! costs the rest of the dataset.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::CatalogError;
use crate::model::NewAgent;
use crate::vocab::DEFAULT_AGENT_TYPE;

/// A record that either matches its schema or is kept verbatim
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Record<T> {
    Valid(T),
    Invalid(Value),
}

impl<T> Record<T> {
    pub fn valid(&self) -> Option<&T> {
        match self {
            Record::Valid(record) => Some(record),
            Record::Invalid(_) => None,
        }
    }
}

/// Best-effort label for a record that failed to parse
pub fn raw_label(raw: &Value) -> String {
    ["identifier", "id", "title"]
        .iter()
        .find_map(|key| match raw.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "<unidentified>".to_string())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub title: String,
    pub description: String,
    pub publisher: PublisherRecord,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub theme_taxonomy: Vec<Record<ThemeRecord>>,
    #[serde(default)]
    pub dataset: Vec<Record<DatasetRecord>>,
}

impl ExportDocument {
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn datasets(&self) -> impl Iterator<Item = &DatasetRecord> {
        self.dataset.iter().filter_map(Record::valid)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherRecord {
    pub name: String,
    #[serde(default)]
    pub mbox: Option<String>,
    #[serde(rename = "@type", default)]
    pub agent_type: Option<String>,
}

impl PublisherRecord {
    pub fn to_new_agent(&self) -> NewAgent {
        NewAgent {
            name: self.name.trim().to_string(),
            agent_type: self
                .agent_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_AGENT_TYPE.to_string()),
            mbox: self.mbox.clone().filter(|m| !m.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThemeRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRecord {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub identifier: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub publisher: Option<Record<PublisherRecord>>,
    #[serde(default, deserialize_with = "terms")]
    pub theme: Vec<Record<String>>,
    #[serde(default, deserialize_with = "terms")]
    pub keyword: Vec<Record<String>>,
    #[serde(default)]
    pub issued: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub landing_page: Option<String>,
    #[serde(default)]
    pub distribution: Vec<Record<DistributionRecord>>,
}

impl DatasetRecord {
    /// Identifier when present, otherwise the title
    pub fn label(&self) -> &str {
        self.identifier
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.title)
    }

    pub fn distributions(&self) -> impl Iterator<Item = &DistributionRecord> {
        self.distribution.iter().filter_map(Record::valid)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRecord {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(rename = "downloadURL", default)]
    pub download_url: Option<String>,
    #[serde(rename = "accessURL", default)]
    pub access_url: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

impl DistributionRecord {
    /// Identifier, file name or title, whichever comes first
    pub fn label(&self) -> &str {
        [&self.identifier, &self.file_name, &self.title]
            .into_iter()
            .find_map(|v| v.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("<unnamed distribution>")
    }

    pub fn file_name(&self) -> Option<&str> {
        non_blank(&self.file_name)
    }

    pub fn download_url(&self) -> Option<&str> {
        non_blank(&self.download_url)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {}",
            other
        ))),
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {}",
            other
        ))),
    }
}

/// A list of codes or words, checked entry by entry
///
/// Numbers are taken as their text and a single bare value counts as a
/// one-element list.
fn terms<'de, D>(deserializer: D) -> Result<Vec<Record<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(values) => values,
        other => vec![other],
    };
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            Value::String(s) => Record::Valid(s),
            Value::Number(n) => Record::Valid(n.to_string()),
            other => Record::Invalid(other),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "title": "FAO Data in Emergencies",
            "description": "Emergency datasets",
            "publisher": {"name": "FAO", "@type": "org:Organization"},
            "license": "CC_BY_4_0",
            "themeTaxonomy": [
                {"id": "AGRI", "label": "Agriculture", "description": "Agriculture, fisheries"},
                {"label": "no id"}
            ],
            "dataset": [
                {
                    "identifier": 1042,
                    "title": "Colombia - Round 3",
                    "theme": ["AGRI"],
                    "distribution": [
                        {"identifier": "d1", "title": "CSV", "downloadURL": "https://x.org/a.csv"},
                        "not an object"
                    ]
                },
                {"identifier": "no-title"}
            ]
        })
    }

    #[test]
    fn test_parse_keeps_invalid_records() {
        let doc = ExportDocument::parse(&sample().to_string()).unwrap();

        assert_eq!(doc.theme_taxonomy.len(), 2);
        assert!(doc.theme_taxonomy[1].valid().is_none());

        assert_eq!(doc.dataset.len(), 2);
        let datasets: Vec<_> = doc.datasets().collect();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].identifier.as_deref(), Some("1042"));
        assert_eq!(datasets[0].distribution.len(), 2);
        assert_eq!(datasets[0].distributions().count(), 1);

        match &doc.dataset[1] {
            Record::Invalid(raw) => assert_eq!(raw_label(raw), "no-title"),
            Record::Valid(_) => panic!("dataset without title must not parse"),
        }
    }

    #[test]
    fn test_missing_top_level_field_is_rejected() {
        let mut value = sample();
        value.as_object_mut().unwrap().remove("publisher");
        assert!(matches!(
            ExportDocument::parse(&value.to_string()),
            Err(CatalogError::Json(_))
        ));
    }

    #[test]
    fn test_publisher_agent_defaults() {
        let publisher: PublisherRecord =
            serde_json::from_value(json!({"name": " FAO ", "mbox": ""})).unwrap();
        let agent = publisher.to_new_agent();
        assert_eq!(agent.name, "FAO");
        assert_eq!(agent.agent_type, "foaf:Agent");
        assert_eq!(agent.mbox, None);
    }

    #[test]
    fn test_bad_publisher_or_theme_entry_keeps_the_dataset() {
        let doc = ExportDocument::parse(
            &json!({
                "title": "Catalog",
                "description": "Lenient fields",
                "publisher": {"name": "FAO"},
                "dataset": [{
                    "identifier": "ds",
                    "title": "Dataset",
                    "publisher": {"@type": "org:Organization"},
                    "theme": ["AGRI", {"id": "SOCI"}, 7],
                    "keyword": "Food Security",
                    "distribution": [{"identifier": "d1"}]
                }]
            })
            .to_string(),
        )
        .unwrap();

        let datasets: Vec<_> = doc.datasets().collect();
        assert_eq!(datasets.len(), 1);
        let dataset = datasets[0];
        assert!(matches!(dataset.publisher, Some(Record::Invalid(_))));
        let themes: Vec<_> = dataset.theme.iter().map(|t| t.valid().cloned()).collect();
        assert_eq!(themes, vec![Some("AGRI".to_string()), None, Some("7".to_string())]);
        assert_eq!(dataset.keyword.len(), 1);
        assert_eq!(dataset.keyword[0].valid().map(String::as_str), Some("Food Security"));
        assert_eq!(dataset.distributions().count(), 1);
    }

    #[test]
    fn test_distribution_label() {
        let d = DistributionRecord {
            file_name: Some("data.csv".to_string()),
            ..Default::default()
        };
        assert_eq!(d.label(), "data.csv");
        assert_eq!(DistributionRecord::default().label(), "<unnamed distribution>");
    }
}
