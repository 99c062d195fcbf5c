use std::collections::HashMap;

use crate::config::Config;
use crate::idp::{dummy::DummyIdentityProvider, local::LocalIdentityProvider, stub::StubIdentityProvider, IdentityProvider};

/// Keys the configured auth methods (§6 `[{name,type,config,enabled}]`) to a live
/// `IdentityProvider` instance, one per mounted auth method (§4.10).
pub struct IdpRegistry {
    providers: HashMap<String, Box<dyn IdentityProvider>>,
}

impl IdpRegistry {
    pub fn from_config(config: &Config) -> Self {
        let mut providers: HashMap<String, Box<dyn IdentityProvider>> = HashMap::new();
        for method in &config.auth_methods {
            if !method.enabled {
                continue;
            }
            let provider: Box<dyn IdentityProvider> = match method.kind.as_str() {
                "local" => Box::new(LocalIdentityProvider::default()),
                "dummy" => Box::new(DummyIdentityProvider::default()),
                "oauth2" => Box::new(StubIdentityProvider::oauth2()),
                "saml" => Box::new(StubIdentityProvider::saml()),
                "twitter" => Box::new(StubIdentityProvider::twitter()),
                other => {
                    tracing::warn!(auth_method = %method.name, kind = other, "unknown auth method type, defaulting to dummy");
                    Box::new(DummyIdentityProvider::default())
                }
            };
            providers.insert(method.name.clone(), provider);
        }
        Self { providers }
    }

    pub fn get(&self, auth_method_id: &str) -> Option<&dyn IdentityProvider> {
        self.providers.get(auth_method_id).map(|b| b.as_ref())
    }
}
