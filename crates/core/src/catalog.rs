use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::product::{Product, ProductFamily};
use crate::text;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate model `{model}` in catalog")]
    DuplicateModel { model: String },
    #[error("catalog contains no products")]
    Empty,
}

/// Read-only product set, kept in file order.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    pub family: Option<ProductFamily>,
    pub category: Option<String>,
    pub query: Option<String>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for product in &products {
            if !seen.insert(product.model.as_str()) {
                return Err(CatalogError::DuplicateModel { model: product.model.clone() });
            }
        }
        Ok(Self { products })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(path: &Path, raw: &str) -> Result<Self, CatalogError> {
        let products: Vec<Product> = serde_json::from_str(raw)
            .map_err(|source| CatalogError::Parse { path: path.to_path_buf(), source })?;
        if products.is_empty() {
            return Err(CatalogError::Empty);
        }
        Self::new(products)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })?;
        Self::from_json(path, &raw)
    }

    /// Loads the catalog, degrading to an empty one when the file is missing,
    /// malformed or empty. Callers treat an empty catalog as unavailable.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalog) => {
                info!(
                    event_name = "system.catalog.loaded",
                    path = %path.display(),
                    products = catalog.len(),
                    "catalog loaded"
                );
                catalog
            }
            Err(error) => {
                warn!(
                    event_name = "system.catalog.unavailable",
                    path = %path.display(),
                    error = %error,
                    "catalog unavailable, continuing with an empty catalog"
                );
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Exact model lookup, falling back to a case and accent insensitive match.
    pub fn find(&self, model: &str) -> Option<&Product> {
        self.products.iter().find(|product| product.model == model).or_else(|| {
            let wanted = text::fold(model.trim());
            self.products.iter().find(|product| text::fold(&product.model) == wanted)
        })
    }

    pub fn by_family(&self, family: ProductFamily) -> Vec<&Product> {
        self.products.iter().filter(|product| product.family == family).collect()
    }

    pub fn families(&self) -> Vec<ProductFamily> {
        ProductFamily::ALL
            .into_iter()
            .filter(|family| self.products.iter().any(|product| product.family == *family))
            .collect()
    }

    pub fn filter(&self, filter: &CatalogFilter) -> Vec<&Product> {
        let category = filter.category.as_deref().map(text::fold);
        let query = filter.query.as_deref().map(text::fold).filter(|query| !query.is_empty());

        self.products
            .iter()
            .filter(|product| filter.family.map_or(true, |family| product.family == family))
            .filter(|product| {
                category.as_ref().map_or(true, |category| &text::fold(&product.category) == category)
            })
            .filter(|product| {
                query.as_ref().map_or(true, |query| {
                    text::fold(&product.model).contains(query.as_str())
                        || text::fold(&product.description).contains(query.as_str())
                })
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use super::Catalog;

    pub const CATALOG_JSON: &str = include_str!("../../../data/catalog.json");

    pub fn catalog() -> Catalog {
        Catalog::from_json(Path::new("data/catalog.json"), CATALOG_JSON)
            .expect("bundled catalog parses")
    }
}
