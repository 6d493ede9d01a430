use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Package size in centimetres and weight in kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Object)]
pub struct ProductDimensions {
    pub length: f64,
    pub breadth: f64,
    pub height: f64,
    pub weight: f64,
}

impl Default for ProductDimensions {
    fn default() -> Self {
        Self {
            length: 10.0,
            breadth: 8.0,
            height: 5.0,
            weight: 0.5,
        }
    }
}

/// Source of package dimensions by product name.
///
/// Unknown products resolve to [`ProductDimensions::default`]; that is policy, not an error.
pub trait ProductCatalog: Send + Sync {
    fn dimensions(&self, product: &str) -> ProductDimensions;
}

/// Catalog backed by a JSON object of `name -> dimensions`.
///
/// The file is re-read on every lookup so edits apply without a restart.
pub struct JsonProductCatalog {
    path: PathBuf,
}

impl JsonProductCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> HashMap<String, ProductDimensions> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Product catalog not readable");
                return HashMap::new();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Product catalog is not valid JSON");
            HashMap::new()
        })
    }
}

impl ProductCatalog for JsonProductCatalog {
    fn dimensions(&self, product: &str) -> ProductDimensions {
        self.load().get(product).copied().unwrap_or_else(|| {
            debug!(product, "Unknown product, using default dimensions");
            ProductDimensions::default()
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: HashMap<String, ProductDimensions>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, name: &str, dimensions: ProductDimensions) -> Self {
        self.products.insert(name.to_string(), dimensions);
        self
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn dimensions(&self, product: &str) -> ProductDimensions {
        self.products.get(product).copied().unwrap_or_default()
    }
}
