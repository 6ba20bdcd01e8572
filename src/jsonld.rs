//! JSON-LD serialization of loaded catalog graphs
//!
//! Serialization is a read-only projection: it takes entities already
//! loaded from the store (see [`crate::store::Store::load_catalog_graph`])
//! and never touches storage or the network.
//!
//! Every node starts with `@type`. Empty optional values are left out rather
//! than written as `null` or `""`, URL-valued properties are wrapped as
//! `foaf:Document` nodes, and child collections keep creation order.

use serde_json::{json, Map, Value};

use crate::error::CatalogError;
use crate::model::{
    Agent, CatalogGraph, Checksum, DataServiceGraph, DataTheme, DatasetGraph, DistributionGraph,
    LicenceDocument, MediaType, SiteUrls,
};
use crate::vocab::{self, spdx_algorithm};

/// Projection of an entity onto an ordered JSON-LD node
pub trait LinkedData {
    fn to_linked_data(&self, urls: &SiteUrls) -> Map<String, Value>;
}

/// Builder for a JSON-LD node that drops empty values
struct Node(Map<String, Value>);

impl Node {
    fn typed(node_type: &str) -> Self {
        let mut map = Map::new();
        map.insert(vocab::TYPE.to_string(), json!(node_type));
        Node(map)
    }

    /// Scalar text, only when non-empty
    fn text(mut self, key: &str, value: &str) -> Self {
        if !value.trim().is_empty() {
            self.0.insert(key.to_string(), json!(value));
        }
        self
    }

    fn opt_text(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.text(key, v),
            None => self,
        }
    }

    /// URL wrapped as a `foaf:Document` node
    fn document(mut self, key: &str, url: Option<&str>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.0.insert(key.to_string(), document(url));
        }
        self
    }

    fn child(mut self, key: &str, child: Option<Map<String, Value>>) -> Self {
        if let Some(child) = child {
            self.0.insert(key.to_string(), Value::Object(child));
        }
        self
    }

    /// Sequence of values, omitted entirely when empty
    fn list(mut self, key: &str, items: Vec<Value>) -> Self {
        if !items.is_empty() {
            self.0.insert(key.to_string(), Value::Array(items));
        }
        self
    }

    fn build(self) -> Map<String, Value> {
        self.0
    }
}

/// `{"@type": "foaf:Document", "foaf:Document": url}`
pub fn document(url: &str) -> Value {
    let mut map = Map::new();
    map.insert(vocab::TYPE.to_string(), json!(vocab::DOCUMENT_TYPE));
    map.insert(vocab::DOCUMENT_TYPE.to_string(), json!(url));
    Value::Object(map)
}

fn nodes<'a, T: LinkedData + 'a>(
    items: impl IntoIterator<Item = &'a T>,
    urls: &SiteUrls,
) -> Vec<Value> {
    items
        .into_iter()
        .map(|item| Value::Object(item.to_linked_data(urls)))
        .collect()
}

impl LinkedData for Agent {
    fn to_linked_data(&self, _urls: &SiteUrls) -> Map<String, Value> {
        // The agent's own type, not a fixed literal
        Node::typed(&self.agent_type)
            .text(vocab::NAME, &self.name)
            .opt_text(vocab::MBOX, self.mbox.as_deref())
            .build()
    }
}

impl LinkedData for MediaType {
    fn to_linked_data(&self, _urls: &SiteUrls) -> Map<String, Value> {
        Node::typed(vocab::MEDIA_TYPE_TYPE)
            .opt_text(vocab::IDENTIFIER, self.code.as_deref())
            .text(vocab::LABEL, &self.extension)
            .build()
    }
}

impl LinkedData for LicenceDocument {
    fn to_linked_data(&self, _urls: &SiteUrls) -> Map<String, Value> {
        Node::typed(vocab::LICENSE_DOCUMENT_TYPE)
            .text(vocab::LABEL, &self.label)
            .opt_text(vocab::IDENTIFIER, self.code.as_deref())
            .document(vocab::HOMEPAGE, self.url_general.as_deref())
            .document(vocab::PAGE, self.url_document.as_deref())
            .build()
    }
}

impl LinkedData for DataTheme {
    fn to_linked_data(&self, _urls: &SiteUrls) -> Map<String, Value> {
        Node::typed(vocab::CONCEPT_TYPE)
            .text(vocab::NOTATION, &self.code)
            .text(vocab::PREF_LABEL, &self.label)
            .opt_text(vocab::DEFINITION, self.description.as_deref())
            .build()
    }
}

impl LinkedData for Checksum {
    fn to_linked_data(&self, _urls: &SiteUrls) -> Map<String, Value> {
        Node::typed(vocab::CHECKSUM_TYPE)
            .text(vocab::ALGORITHM, &spdx_algorithm(&self.algorithm))
            .text(vocab::CHECKSUM_VALUE, &self.checksum_value)
            .build()
    }
}

impl LinkedData for DistributionGraph {
    fn to_linked_data(&self, urls: &SiteUrls) -> Map<String, Value> {
        let d = &self.distribution;
        let mut node = Node::typed(vocab::DISTRIBUTION_TYPE);
        // accessURL is mandatory and always resolvable
        node.0
            .insert(vocab::ACCESS_URL.to_string(), json!(d.access_url(urls)));

        node.text(vocab::TITLE, &d.title)
            .text(vocab::DESCRIPTION, &d.description)
            .text(vocab::DOWNLOAD_URL, &d.download_url(urls))
            .child(vocab::FORMAT, self.format.as_ref().map(|f| f.to_linked_data(urls)))
            .opt_text(
                vocab::MEDIA_TYPE,
                self.format.as_ref().map(|f| f.media_type.as_str()),
            )
            .child(vocab::LICENSE, self.license.as_ref().map(|l| l.to_linked_data(urls)))
            .child(vocab::CHECKSUM, self.checksum.as_ref().map(|c| c.to_linked_data(urls)))
            .build()
    }
}

impl LinkedData for DatasetGraph {
    fn to_linked_data(&self, urls: &SiteUrls) -> Map<String, Value> {
        let d = &self.dataset;
        Node::typed(vocab::DATASET_TYPE)
            .text(vocab::TITLE, &d.title)
            .opt_text(vocab::DESCRIPTION, d.description.as_deref())
            .child(
                vocab::PUBLISHER,
                self.publisher.as_ref().map(|p| p.to_linked_data(urls)),
            )
            .opt_text(vocab::ISSUED, d.issued.as_deref())
            .opt_text(vocab::MODIFIED, d.modified.as_deref())
            .document(vocab::LANDING_PAGE, d.landing_page.as_deref())
            .list(vocab::THEME, nodes(&self.themes, urls))
            .list(
                vocab::KEYWORD,
                self.keywords.iter().map(|k| json!(k.name)).collect(),
            )
            .list(vocab::DISTRIBUTION, nodes(&self.distributions, urls))
            .build()
    }
}

impl LinkedData for DataServiceGraph {
    fn to_linked_data(&self, urls: &SiteUrls) -> Map<String, Value> {
        let s = &self.service;
        Node::typed(vocab::DATA_SERVICE_TYPE)
            .text(vocab::TITLE, &s.title)
            .text(vocab::ENDPOINT_URL, &s.endpoint_url)
            .child(vocab::LICENSE, self.license.as_ref().map(|l| l.to_linked_data(urls)))
            .list(
                vocab::MEDIA_TYPE,
                self.media_types
                    .iter()
                    .filter(|m| !m.media_type.is_empty())
                    .map(|m| json!(m.media_type))
                    .collect(),
            )
            .build()
    }
}

impl LinkedData for CatalogGraph {
    fn to_linked_data(&self, urls: &SiteUrls) -> Map<String, Value> {
        let c = &self.catalog;
        Node::typed(vocab::CATALOG_TYPE)
            .text(vocab::TITLE, &c.title)
            .text(vocab::DESCRIPTION, &c.description)
            .child(vocab::PUBLISHER, Some(self.publisher.to_linked_data(urls)))
            .document(vocab::HOMEPAGE, c.homepage.as_deref())
            .child(vocab::LICENSE, self.license.as_ref().map(|l| l.to_linked_data(urls)))
            .list(vocab::THEME_TAXONOMY, nodes(&self.themes, urls))
            .list(vocab::DATASET, nodes(&self.datasets, urls))
            .list(vocab::SERVICE, nodes(&self.services, urls))
            .build()
    }
}

/// Complete JSON-LD document for one catalog: `@context` plus the catalog node
pub fn to_document(graph: &CatalogGraph, urls: &SiteUrls) -> Value {
    let mut doc = Map::new();
    doc.insert(vocab::CONTEXT.to_string(), vocab::context());
    doc.extend(graph.to_linked_data(urls));
    Value::Object(doc)
}

/// Document holding several catalogs under `@graph`
pub fn to_graph_document(graphs: &[CatalogGraph], urls: &SiteUrls) -> Value {
    let mut doc = Map::new();
    doc.insert(vocab::CONTEXT.to_string(), vocab::context());
    doc.insert("@graph".to_string(), Value::Array(nodes(graphs, urls)));
    Value::Object(doc)
}

/// Render a document as JSON text
pub fn to_json_string(doc: &Value, pretty: bool) -> Result<String, CatalogError> {
    if pretty {
        Ok(serde_json::to_string_pretty(doc)?)
    } else {
        Ok(serde_json::to_string(doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Catalog, Dataset, Distribution};

    fn urls() -> SiteUrls {
        SiteUrls::new("https://data.example.org/", "/media/").unwrap()
    }

    fn publisher() -> Agent {
        Agent {
            id: 1,
            name: "Food and Agriculture Organization of the United Nations".to_string(),
            agent_type: "foaf:Agent".to_string(),
            mbox: None,
        }
    }

    fn distribution(id: i64, title: &str, description: &str, access: &str) -> DistributionGraph {
        DistributionGraph {
            distribution: Distribution {
                id,
                dataset_id: 1,
                title: title.to_string(),
                description: description.to_string(),
                file: None,
                external_download_url: None,
                external_access_url: Some(access.to_string()),
                format_id: None,
                license_id: None,
                checksum_id: None,
            },
            format: None,
            license: None,
            checksum: None,
        }
    }

    fn dataset(id: i64, title: &str, description: Option<&str>) -> DatasetGraph {
        DatasetGraph {
            dataset: Dataset {
                id,
                catalog_id: 1,
                title: title.to_string(),
                description: description.map(String::from),
                publisher_id: None,
                issued: None,
                modified: None,
                landing_page: None,
            },
            publisher: None,
            themes: vec![],
            keywords: vec![],
            distributions: vec![],
        }
    }

    fn catalog(homepage: Option<&str>, datasets: Vec<DatasetGraph>) -> CatalogGraph {
        CatalogGraph {
            catalog: Catalog {
                id: 1,
                title: "FAO Data in Emergencies".to_string(),
                description: "A testing catalog based on true data.".to_string(),
                homepage: homepage.map(String::from),
                publisher_id: 1,
                license_id: None,
            },
            publisher: publisher(),
            license: None,
            themes: vec![],
            datasets,
            services: vec![],
        }
    }

    #[test]
    fn test_agent_type_comes_from_agent() {
        let mut agent = publisher();
        let result = agent.to_linked_data(&urls());
        assert_eq!(result["@type"], json!(agent.agent_type));
        assert_eq!(result["foaf:name"], json!(agent.name));

        agent.agent_type = "org:Organization".to_string();
        let result = agent.to_linked_data(&urls());
        assert_eq!(result["@type"], json!("org:Organization"));
    }

    #[test]
    fn test_type_is_first_key() {
        let result = catalog(None, vec![]).to_linked_data(&urls());
        assert_eq!(result.keys().next().map(String::as_str), Some("@type"));
    }

    #[test]
    fn test_distribution_to_jsonld() {
        let d = distribution(
            1,
            "ArcGIS Hub Dataset",
            "Web page",
            "https://external.com/distribution/webpage",
        );
        let result = d.to_linked_data(&urls());

        assert_eq!(result["@type"], json!("dcat:Distribution"));
        assert_eq!(result["dcat:accessURL"], json!(d.distribution.access_url(&urls())));
        assert_eq!(result["dct:title"], json!("ArcGIS Hub Dataset"));
        assert_eq!(result["dct:description"], json!("Web page"));
        assert!(!result.contains_key("dcat:downloadURL"));
    }

    #[test]
    fn test_dataset_to_jsonld() {
        let mut ds = dataset(
            1,
            "Colombia - Household Questionnaire - Round 3",
            Some("Household questionarie"),
        );
        let d0 = distribution(
            1,
            "ArcGIS Hub Dataset",
            "Web page",
            "https://external.com/distribution/webpage",
        );
        let d1 = distribution(
            2,
            "ArcGIS GeoService",
            "Esri REST",
            "https://external.com/distribution/rest",
        );
        ds.distributions = vec![d0.clone(), d1.clone()];

        let result = ds.to_linked_data(&urls());
        assert_eq!(result["dct:title"], json!("Colombia - Household Questionnaire - Round 3"));
        assert_eq!(result["dct:description"], json!("Household questionarie"));
        assert_eq!(result["dcat:distribution"][0], Value::Object(d0.to_linked_data(&urls())));
        assert_eq!(result["dcat:distribution"][1], Value::Object(d1.to_linked_data(&urls())));
    }

    #[test]
    fn test_dataset_omits_empty_fields() {
        let result = dataset(2, "Afghanistan - Household Questionnaire - Round 6", None)
            .to_linked_data(&urls());
        assert!(!result.contains_key("dct:description"));
        assert!(!result.contains_key("dcat:distribution"));
        assert!(!result.contains_key("dct:publisher"));
        assert!(result.values().all(|v| !v.is_null()));
    }

    #[test]
    fn test_catalog_homepage_is_wrapped() {
        let homepage = "https://data-in-emergencies.fao.org";
        let result = catalog(Some(homepage), vec![]).to_linked_data(&urls());
        assert_eq!(
            result["foaf:homepage"],
            json!({"@type": "foaf:Document", "foaf:Document": homepage})
        );
    }

    #[test]
    fn test_catalog_without_homepage() {
        for homepage in [None, Some("")] {
            let result = catalog(homepage, vec![]).to_linked_data(&urls());
            assert!(!result.contains_key("foaf:homepage"));
        }
    }

    #[test]
    fn test_catalog_to_jsonld() {
        let datasets = vec![
            dataset(
                1,
                "Colombia - Household Questionnaire - Round 3",
                Some("Household questionarie"),
            ),
            dataset(2, "Afghanistan - Household Questionnaire - Round 6", None),
        ];
        let graph = catalog(None, datasets);
        let result = graph.to_linked_data(&urls());

        assert_eq!(result["@type"], json!("dcat:Catalog"));
        assert_eq!(result["dct:title"], json!(graph.catalog.title));
        assert_eq!(result["dct:description"], json!(graph.catalog.description));
        assert_eq!(result["dct:publisher"], Value::Object(graph.publisher.to_linked_data(&urls())));

        let datasets = result["dcat:dataset"].as_array().unwrap();
        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0], Value::Object(graph.datasets[0].to_linked_data(&urls())));
        assert_eq!(
            datasets[1]["dct:title"],
            json!("Afghanistan - Household Questionnaire - Round 6")
        );
    }

    #[test]
    fn test_catalog_without_datasets() {
        let result = catalog(None, vec![]).to_linked_data(&urls());
        assert!(!result.contains_key("dcat:dataset"));
    }

    #[test]
    fn test_checksum_and_format() {
        let mut d = distribution(3, "CSV export", "", "https://external.com/csv");
        d.format = Some(MediaType {
            id: 1,
            extension: "csv".to_string(),
            code: Some("CSV".to_string()),
            media_type: "text/csv".to_string(),
            description: String::new(),
        });
        d.checksum = Some(Checksum {
            id: 1,
            checksum_value: "e3b0c442".to_string(),
            algorithm: "sha256".to_string(),
        });

        let result = d.to_linked_data(&urls());
        assert!(!result.contains_key("dct:description"));
        assert_eq!(result["dct:format"]["dct:identifier"], json!("CSV"));
        assert_eq!(result["dcat:mediaType"], json!("text/csv"));
        assert_eq!(
            result["spdx:checksum"],
            json!({
                "@type": "spdx:Checksum",
                "spdx:algorithm": "spdx:checksumAlgorithm_sha256",
                "spdx:checksumValue": "e3b0c442"
            })
        );
    }

    #[test]
    fn test_to_document() {
        let doc = to_document(&catalog(None, vec![]), &urls());
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys[0], "@context");
        assert_eq!(keys[1], "@type");

        let text = to_json_string(&doc, false).unwrap();
        assert!(text.starts_with("{\"@context\""));
    }
}
