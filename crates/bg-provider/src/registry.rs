use std::collections::HashMap;
use std::sync::Arc;

use crate::Provider;

/// Providers are chosen at startup from a registry keyed by scheme
/// (`docker`, `kubernetes`, …), per §9's "interface abstractions ...
/// implementations are chosen at startup from a registry keyed by scheme".
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scheme: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(scheme.into(), provider);
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(scheme).cloned()
    }

    /// Every registered scheme, for the dispatcher to enumerate
    /// `provider:<scheme>` queues at startup.
    pub fn scheme_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ContainerProvider;

    #[test]
    fn registry_resolves_by_scheme() {
        let mut registry = ProviderRegistry::new();
        registry.register("docker", Arc::new(ContainerProvider::new("http://daemon.local")));
        assert!(registry.get("docker").is_some());
        assert!(registry.get("kubernetes").is_none());
    }
}
