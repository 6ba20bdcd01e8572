//! Entity model for DCAT catalogs
//!
//! Plain data types mirroring the rows kept by [`crate::store`]. Optional
//! attributes are `Option`s; the only behaviour attached here is the
//! derivation of download and access URLs for distributions.

use url::Url;

use crate::error::CatalogError;

/// Anyone acting on catalog entities, typically a publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    /// Linked-data type of the agent, e.g. `foaf:Organization`
    pub agent_type: String,
    pub mbox: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAgent {
    pub name: String,
    pub agent_type: String,
    pub mbox: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub homepage: Option<String>,
    pub publisher_id: i64,
    pub license_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCatalog {
    pub title: String,
    pub description: String,
    pub homepage: Option<String>,
    pub publisher_id: i64,
    pub license_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub id: i64,
    pub catalog_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub publisher_id: Option<i64>,
    pub issued: Option<String>,
    pub modified: Option<String>,
    pub landing_page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewDataset {
    pub catalog_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub publisher_id: Option<i64>,
    pub issued: Option<String>,
    pub modified: Option<String>,
    pub landing_page: Option<String>,
}

/// A concrete file or access point of a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub id: i64,
    pub dataset_id: i64,
    pub title: String,
    pub description: String,
    /// Path of the attached file, relative to the media root
    pub file: Option<String>,
    pub external_download_url: Option<String>,
    pub external_access_url: Option<String>,
    pub format_id: Option<i64>,
    pub license_id: Option<i64>,
    pub checksum_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewDistribution {
    pub dataset_id: i64,
    pub title: String,
    pub description: String,
    pub file: Option<String>,
    pub external_download_url: Option<String>,
    pub external_access_url: Option<String>,
    pub format_id: Option<i64>,
    pub license_id: Option<i64>,
    pub checksum_id: Option<i64>,
}

impl Distribution {
    /// URL the distribution's content can be downloaded from.
    ///
    /// The external URL wins over an attached file; with neither the result
    /// is empty.
    pub fn download_url(&self, urls: &SiteUrls) -> String {
        if let Some(external) = non_empty(&self.external_download_url) {
            return external.to_string();
        }
        match non_empty(&self.file) {
            Some(path) => urls.file_url(path),
            None => String::new(),
        }
    }

    /// URL giving access to the distribution. Always resolvable.
    pub fn access_url(&self, urls: &SiteUrls) -> String {
        if let Some(external) = non_empty(&self.external_access_url) {
            return external.to_string();
        }
        let download = self.download_url(urls);
        if !download.is_empty() {
            return download;
        }
        urls.distribution_url(self.id)
    }
}

/// An API or endpoint serving data of a catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataService {
    pub id: i64,
    pub catalog_id: i64,
    pub title: String,
    pub endpoint_url: String,
    pub license_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDataService {
    pub catalog_id: i64,
    pub title: String,
    pub endpoint_url: String,
    pub license_id: Option<i64>,
}

/// File type from the EU file-type vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub id: i64,
    pub extension: String,
    pub code: Option<String>,
    pub media_type: String,
    pub description: String,
}

/// Licence from the EU licence vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenceDocument {
    pub id: i64,
    pub label: String,
    pub code: Option<String>,
    pub url_general: Option<String>,
    pub url_document: Option<String>,
}

impl LicenceDocument {
    /// The general URL when known, otherwise the label
    pub fn licence_type(&self) -> &str {
        non_empty(&self.url_general).unwrap_or(&self.label)
    }
}

/// Theme from the data theme taxonomy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTheme {
    pub id: i64,
    pub code: String,
    pub label: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl Keyword {
    /// Lowercase slug; runs of non-alphanumerics collapse into a single `-`
    pub fn slugify(name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;
        for c in name.chars() {
            if c.is_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.extend(c.to_lowercase());
            } else {
                pending_dash = true;
            }
        }
        slug
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub id: i64,
    pub checksum_value: String,
    pub algorithm: String,
}

/// Catalog with every related entity loaded, ready for serialization
#[derive(Debug, Clone)]
pub struct CatalogGraph {
    pub catalog: Catalog,
    pub publisher: Agent,
    pub license: Option<LicenceDocument>,
    pub themes: Vec<DataTheme>,
    pub datasets: Vec<DatasetGraph>,
    pub services: Vec<DataServiceGraph>,
}

#[derive(Debug, Clone)]
pub struct DatasetGraph {
    pub dataset: Dataset,
    pub publisher: Option<Agent>,
    pub themes: Vec<DataTheme>,
    pub keywords: Vec<Keyword>,
    pub distributions: Vec<DistributionGraph>,
}

#[derive(Debug, Clone)]
pub struct DistributionGraph {
    pub distribution: Distribution,
    pub format: Option<MediaType>,
    pub license: Option<LicenceDocument>,
    pub checksum: Option<Checksum>,
}

#[derive(Debug, Clone)]
pub struct DataServiceGraph {
    pub service: DataService,
    pub media_types: Vec<MediaType>,
    pub license: Option<LicenceDocument>,
}

/// Public URLs of the catalog site and of its stored files
#[derive(Debug, Clone)]
pub struct SiteUrls {
    base_url: Url,
    media_url: Url,
}

impl SiteUrls {
    pub fn new(base_url: &str, media_url: &str) -> Result<Self, CatalogError> {
        let base_url = parse_directory_url(base_url)?;
        // A relative media URL is resolved against the site
        let media_url = match Url::parse(media_url) {
            Ok(url) => with_trailing_slash(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let joined =
                    base_url
                        .join(media_url.trim_start_matches('/'))
                        .map_err(|source| CatalogError::InvalidUrl {
                            url: media_url.to_string(),
                            source,
                        })?;
                with_trailing_slash(joined)
            }
            Err(source) => {
                return Err(CatalogError::InvalidUrl {
                    url: media_url.to_string(),
                    source,
                })
            }
        };
        Ok(Self {
            base_url,
            media_url,
        })
    }

    /// Public URL of a file stored under the media root
    pub fn file_url(&self, path: &str) -> String {
        join_or_append(&self.media_url, path.trim_start_matches('/'))
    }

    /// Canonical URL of a distribution record
    pub fn distribution_url(&self, id: i64) -> String {
        join_or_append(&self.base_url, &format!("distributions/{}", id))
    }
}

fn parse_directory_url(raw: &str) -> Result<Url, CatalogError> {
    Url::parse(raw)
        .map(with_trailing_slash)
        .map_err(|source| CatalogError::InvalidUrl {
            url: raw.to_string(),
            source,
        })
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn join_or_append(base: &Url, relative: &str) -> String {
    match base.join(relative) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base, relative),
    }
}

/// Treat empty strings the same as absent values
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distribution() -> Distribution {
        Distribution {
            id: 7,
            dataset_id: 3,
            title: "ArcGIS Hub Dataset".to_string(),
            description: "Web page".to_string(),
            file: None,
            external_download_url: None,
            external_access_url: None,
            format_id: None,
            license_id: None,
            checksum_id: None,
        }
    }

    fn urls() -> SiteUrls {
        SiteUrls::new("https://data.example.org", "/media").unwrap()
    }

    #[test]
    fn test_external_access_url_only() {
        let mut d = distribution();
        d.external_access_url = Some("https://external.com/distribution/webpage".to_string());

        assert_eq!(d.access_url(&urls()), "https://external.com/distribution/webpage");
        assert_eq!(d.download_url(&urls()), "");
    }

    #[test]
    fn test_download_url_prefers_external() {
        let mut d = distribution();
        d.file = Some("files/datasets/3/data.csv".to_string());
        d.external_download_url = Some("https://portal.example.org/data.csv".to_string());

        assert_eq!(d.download_url(&urls()), "https://portal.example.org/data.csv");
    }

    #[test]
    fn test_download_url_from_file() {
        let mut d = distribution();
        d.file = Some("files/datasets/3/data.csv".to_string());

        assert_eq!(
            d.download_url(&urls()),
            "https://data.example.org/media/files/datasets/3/data.csv"
        );
        assert_eq!(d.access_url(&urls()), d.download_url(&urls()));
    }

    #[test]
    fn test_access_url_falls_back_to_record() {
        let d = distribution();
        assert_eq!(d.download_url(&urls()), "");
        assert_eq!(d.access_url(&urls()), "https://data.example.org/distributions/7");
    }

    #[test]
    fn test_empty_external_url_is_ignored() {
        let mut d = distribution();
        d.external_download_url = Some(String::new());
        assert_eq!(d.download_url(&urls()), "");
    }

    #[test]
    fn test_absolute_media_url() {
        let urls = SiteUrls::new("https://data.example.org/", "https://cdn.example.org/m").unwrap();
        assert_eq!(urls.file_url("a.csv"), "https://cdn.example.org/m/a.csv");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(Keyword::slugify("Food Security"), "food-security");
        assert_eq!(Keyword::slugify("  COVID-19 / response "), "covid-19-response");
        assert_eq!(Keyword::slugify("!!!"), "");
    }

    #[test]
    fn test_licence_type() {
        let mut licence = LicenceDocument {
            id: 1,
            label: "Creative Commons Attribution 4.0".to_string(),
            code: Some("CC_BY_4_0".to_string()),
            url_general: None,
            url_document: None,
        };
        assert_eq!(licence.licence_type(), "Creative Commons Attribution 4.0");
        licence.url_general = Some("https://creativecommons.org/licenses/by/4.0/".to_string());
        assert_eq!(licence.licence_type(), "https://creativecommons.org/licenses/by/4.0/");
    }
}
