//! Model Registry - 按名称选择模型实现
//!
//! 启动时注册名称到工厂的映射，未注册的名称返回 UnknownModel

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{FakeModel, HttpModelClient, HttpModelClientConfig};
use crate::application::ports::{ModelError, ModelPort};
use crate::config::{ModelBackend, ModelConfig};

type ModelFactory = Arc<dyn Fn(&str) -> Result<Box<dyn ModelPort>, ModelError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ModelRegistry {
    factories: BTreeMap<String, ModelFactory>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置的后端注册所有模型名称
    pub fn from_config(config: &ModelConfig) -> Self {
        let mut registry = Self::new();
        for name in &config.names {
            match config.backend {
                ModelBackend::Fake => {
                    registry.register(name, |name| Ok(Box::new(FakeModel::new(name))));
                }
                ModelBackend::Http => {
                    let http_config = HttpModelClientConfig {
                        base_url: config.url.clone(),
                        timeout_secs: config.timeout_secs,
                    };
                    registry.register(name, move |name| {
                        Ok(Box::new(HttpModelClient::new(name, http_config.clone())?))
                    });
                }
            }
        }
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str) -> Result<Box<dyn ModelPort>, ModelError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// 加载模型
    pub fn load(&self, name: &str) -> Result<Box<dyn ModelPort>, ModelError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ModelError::UnknownModel(name.to_string(), self.names().join(", ")))?;
        factory(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_registered() {
        let registry = ModelRegistry::from_config(&ModelConfig::default());
        assert!(registry.contains("hat"));
        assert!(registry.contains("cabinet_meter"));
        assert_eq!(registry.names().len(), 5);
    }

    #[test]
    fn test_unknown_model_is_an_error() {
        let registry = ModelRegistry::from_config(&ModelConfig::default());
        match registry.load("smoke") {
            Err(ModelError::UnknownModel(name, available)) => {
                assert_eq!(name, "smoke");
                assert!(available.contains("hat"));
            }
            _ => panic!("expected UnknownModel"),
        }
        assert!(registry.load("hat").is_ok());
    }
}
