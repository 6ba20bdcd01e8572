//! Loading complete catalog graphs for serialization

use crate::error::CatalogError;
use crate::model::{
    CatalogGraph, DataServiceGraph, Dataset, DatasetGraph, Distribution, DistributionGraph,
};
use crate::store::Store;

impl Store {
    /// Load a catalog with its publisher, themes, datasets, distributions and
    /// services. Children keep their creation order.
    pub fn load_catalog_graph(&self, catalog_id: i64) -> Result<CatalogGraph, CatalogError> {
        let catalog = self.get_catalog(catalog_id)?;
        let publisher = self.get_agent(catalog.publisher_id)?;
        let license = catalog
            .license_id
            .map(|id| self.get_licence(id))
            .transpose()?;
        let themes = self.themes_of_catalog(catalog_id)?;

        let datasets = self
            .datasets_of(catalog_id)?
            .into_iter()
            .map(|dataset| self.load_dataset_graph(dataset))
            .collect::<Result<Vec<_>, _>>()?;

        let services = self
            .services_of(catalog_id)?
            .into_iter()
            .map(|service| {
                Ok(DataServiceGraph {
                    media_types: self.media_types_of_service(service.id)?,
                    license: service.license_id.map(|id| self.get_licence(id)).transpose()?,
                    service,
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        Ok(CatalogGraph {
            catalog,
            publisher,
            license,
            themes,
            datasets,
            services,
        })
    }

    fn load_dataset_graph(&self, dataset: Dataset) -> Result<DatasetGraph, CatalogError> {
        let publisher = dataset
            .publisher_id
            .map(|id| self.get_agent(id))
            .transpose()?;
        let themes = self.themes_of_dataset(dataset.id)?;
        let keywords = self.keywords_of_dataset(dataset.id)?;
        let distributions = self
            .distributions_of(dataset.id)?
            .into_iter()
            .map(|distribution| self.load_distribution_graph(distribution))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DatasetGraph {
            dataset,
            publisher,
            themes,
            keywords,
            distributions,
        })
    }

    fn load_distribution_graph(
        &self,
        distribution: Distribution,
    ) -> Result<DistributionGraph, CatalogError> {
        Ok(DistributionGraph {
            format: distribution
                .format_id
                .map(|id| self.get_media_type(id))
                .transpose()?,
            license: distribution
                .license_id
                .map(|id| self.get_licence(id))
                .transpose()?,
            checksum: distribution
                .checksum_id
                .map(|id| self.get_checksum(id))
                .transpose()?,
            distribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewAgent, NewCatalog, NewDataService, NewDataset, NewDistribution};
    use crate::store::{Lookup, NewMediaType, Reference};

    #[test]
    fn test_load_catalog_graph() {
        let store = Store::open_in_memory().unwrap();
        let publisher_id = store
            .resolve_agent(&NewAgent {
                name: "FAO".to_string(),
                agent_type: "foaf:Organization".to_string(),
                mbox: None,
            })
            .unwrap();
        let catalog_id = store
            .create_catalog(&NewCatalog {
                title: "FAO Data in Emergencies".to_string(),
                description: "Testing catalog".to_string(),
                homepage: Some("https://data-in-emergencies.fao.org".to_string()),
                publisher_id,
                license_id: None,
            })
            .unwrap();
        let dataset_id = store
            .create_dataset(&NewDataset {
                catalog_id,
                title: "Colombia - Household Questionnaire - Round 3".to_string(),
                ..Default::default()
            })
            .unwrap();
        let csv = store
            .resolve_or_create(
                &Reference::MediaType(NewMediaType {
                    code: Some("CSV".to_string()),
                    extension: "csv".to_string(),
                    ..Default::default()
                }),
                Lookup::CodeOnly,
            )
            .unwrap()
            .unwrap();
        store
            .create_distribution(&NewDistribution {
                dataset_id,
                title: "ArcGIS GeoService".to_string(),
                format_id: Some(csv.id),
                ..Default::default()
            })
            .unwrap();
        let service_id = store
            .create_data_service(&NewDataService {
                catalog_id,
                title: "Feature API".to_string(),
                endpoint_url: "https://api.example.org/features".to_string(),
                license_id: None,
            })
            .unwrap();
        store.add_service_media_type(service_id, csv.id).unwrap();

        let graph = store.load_catalog_graph(catalog_id).unwrap();
        assert_eq!(graph.publisher.name, "FAO");
        assert_eq!(graph.datasets.len(), 1);
        assert_eq!(graph.datasets[0].distributions.len(), 1);
        assert_eq!(
            graph.datasets[0].distributions[0].format.as_ref().map(|f| f.extension.as_str()),
            Some("csv")
        );
        assert_eq!(graph.services.len(), 1);
        assert_eq!(graph.services[0].media_types.len(), 1);
    }

    #[test]
    fn test_load_missing_catalog() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            store.load_catalog_graph(9),
            Err(CatalogError::NotFound { .. })
        ));
    }
}
