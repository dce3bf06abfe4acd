//! Vendor registry

use crate::error::{CloudError, Result};
use crate::provider::Provider;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Providers keyed by vendor tag
///
/// Filled once by the composition root before any tree is built.
#[derive(Default, Clone)]
pub struct Registry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let vendor = provider.vendor().to_string();
        tracing::debug!(vendor = %vendor, "registering provider");
        self.providers.insert(vendor, provider);
    }

    pub fn get(&self, vendor: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(vendor)
            .cloned()
            .ok_or_else(|| CloudError::ProviderNotFound(vendor.to_string()))
    }

    pub fn vendors(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DatacenterFactory, Settings};

    struct Nothing;

    impl Provider for Nothing {
        fn vendor(&self) -> &str {
            "nothing"
        }

        fn datacenter(&self, _: &str, _: &Settings) -> Result<Arc<dyn DatacenterFactory>> {
            Err(CloudError::Unsupported("nothing".to_string()))
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Nothing));

        assert!(registry.get("nothing").is_ok());
        assert_eq!(registry.vendors().collect::<Vec<_>>(), vec!["nothing"]);
        assert!(matches!(
            registry.get("aws"),
            Err(CloudError::ProviderNotFound(v)) if v == "aws"
        ));
    }

    #[test]
    fn test_default_families_unsupported() {
        let provider = Nothing;
        assert!(matches!(
            provider.dns(&Settings::new()),
            Err(CloudError::Unsupported(_))
        ));
    }
}
