//! Vocabulary terms used in serialized catalogs
//!
//! All output keys are compact IRIs. The prefixes are declared once in the
//! document `@context` returned by [`context`].

/// Dublin Core terms namespace
pub const DCT_NS: &str = "http://purl.org/dc/terms/";

/// DCAT namespace
pub const DCAT_NS: &str = "http://www.w3.org/ns/dcat#";

/// FOAF namespace
pub const FOAF_NS: &str = "http://xmlns.com/foaf/0.1/";

/// SPDX namespace (checksums)
pub const SPDX_NS: &str = "http://spdx.org/rdf/terms#";

/// SKOS namespace (themes)
pub const SKOS_NS: &str = "http://www.w3.org/2004/02/skos/core#";

/// RDFS namespace (labels)
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";

pub const TYPE: &str = "@type";
pub const CONTEXT: &str = "@context";

// Entity types
pub const CATALOG_TYPE: &str = "dcat:Catalog";
pub const DATASET_TYPE: &str = "dcat:Dataset";
pub const DISTRIBUTION_TYPE: &str = "dcat:Distribution";
pub const DATA_SERVICE_TYPE: &str = "dcat:DataService";
pub const MEDIA_TYPE_TYPE: &str = "dct:MediaTypeOrExtent";
pub const LICENSE_DOCUMENT_TYPE: &str = "dct:LicenseDocument";
pub const CONCEPT_TYPE: &str = "skos:Concept";
pub const CHECKSUM_TYPE: &str = "spdx:Checksum";
pub const DOCUMENT_TYPE: &str = "foaf:Document";

/// Fallback `@type` for agents created without one
pub const DEFAULT_AGENT_TYPE: &str = "foaf:Agent";

// Dublin Core properties
pub const TITLE: &str = "dct:title";
pub const DESCRIPTION: &str = "dct:description";
pub const PUBLISHER: &str = "dct:publisher";
pub const LICENSE: &str = "dct:license";
pub const FORMAT: &str = "dct:format";
pub const ISSUED: &str = "dct:issued";
pub const MODIFIED: &str = "dct:modified";
pub const IDENTIFIER: &str = "dct:identifier";

// DCAT properties
pub const DATASET: &str = "dcat:dataset";
pub const DISTRIBUTION: &str = "dcat:distribution";
pub const SERVICE: &str = "dcat:service";
pub const THEME: &str = "dcat:theme";
pub const THEME_TAXONOMY: &str = "dcat:themeTaxonomy";
pub const KEYWORD: &str = "dcat:keyword";
pub const LANDING_PAGE: &str = "dcat:landingPage";
pub const ACCESS_URL: &str = "dcat:accessURL";
pub const DOWNLOAD_URL: &str = "dcat:downloadURL";
pub const MEDIA_TYPE: &str = "dcat:mediaType";
pub const ENDPOINT_URL: &str = "dcat:endpointURL";

// FOAF properties
pub const NAME: &str = "foaf:name";
pub const MBOX: &str = "foaf:mbox";
pub const HOMEPAGE: &str = "foaf:homepage";
pub const PAGE: &str = "foaf:page";

// SPDX properties
pub const CHECKSUM: &str = "spdx:checksum";
pub const ALGORITHM: &str = "spdx:algorithm";
pub const CHECKSUM_VALUE: &str = "spdx:checksumValue";

// SKOS / RDFS properties
pub const NOTATION: &str = "skos:notation";
pub const PREF_LABEL: &str = "skos:prefLabel";
pub const DEFINITION: &str = "skos:definition";
pub const LABEL: &str = "rdfs:label";

/// Prefix declarations for the document `@context`
pub fn context() -> serde_json::Value {
    serde_json::json!({
        "dct": DCT_NS,
        "dcat": DCAT_NS,
        "foaf": FOAF_NS,
        "spdx": SPDX_NS,
        "skos": SKOS_NS,
        "rdfs": RDFS_NS
    })
}

/// Map a stored checksum algorithm name to its SPDX individual
pub fn spdx_algorithm(algorithm: &str) -> String {
    format!("spdx:checksumAlgorithm_{}", algorithm.to_ascii_lowercase())
}
