//! Service-provider configuration files (`META-INF/services/<interface>`).

use crate::remapper::Remapper;

pub const SERVICES_PREFIX: &str = "META-INF/services/";

/// Names are in dotted binary form, as they appear in the file and its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub service: String,
    pub providers: Vec<String>,
}

impl ServiceConfig {
    pub fn parse(service: &str, text: &str) -> Self {
        let providers = text
            .lines()
            .map(|line| match line.find('#') {
                Some(index) => &line[..index],
                None => line,
            })
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            service: service.to_string(),
            providers,
        }
    }

    pub fn path(&self) -> String {
        format!("{SERVICES_PREFIX}{}", self.service)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for provider in &self.providers {
            out.push_str(provider);
            out.push('\n');
        }
        out.into_bytes()
    }
}

/// Remaps the service interface and every provider class.
pub fn rewrite_service_config(remapper: &Remapper<'_>, config: ServiceConfig) -> ServiceConfig {
    let map_binary = |name: &str| {
        remapper
            .map_class(&name.replace('.', "/"))
            .replace('/', ".")
    };
    ServiceConfig {
        service: map_binary(&config.service),
        providers: config.providers.iter().map(|p| map_binary(p)).collect(),
    }
}
