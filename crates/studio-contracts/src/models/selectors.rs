use super::registry::{Capability, ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    pub fn select(
        &self,
        requested: Option<&str>,
        capability: Capability,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let (fallback_reason, requested_text) = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(requested_value, capability) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            (
                Some(format!(
                    "Requested model '{requested_value}' unavailable for capability '{capability}'."
                )),
                Some(requested_value.to_string()),
            )
        } else {
            (None, None)
        };

        let candidates = self.registry.by_capability(capability);
        let Some(model) = candidates.first().cloned() else {
            return Err(format!(
                "No models available for capability '{capability}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason,
        })
    }

    /// First capable model served by `provider`, used when a provider is
    /// forced without naming a model.
    pub fn select_for_provider(&self, provider: &str, capability: Capability) -> Option<ModelSpec> {
        self.registry
            .by_capability(capability)
            .into_iter()
            .find(|model| model.provider == provider)
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{Capability, ModelRegistry, ModelSelector, ModelSpec};

    fn spec(name: &str, provider: &str, capabilities: &[Capability]) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: provider.to_string(),
            capabilities: capabilities.to_vec(),
        }
    }

    #[test]
    fn defaults_pick_imagen_for_generate_and_gemini_for_edit() {
        let selector = ModelSelector::new(None);
        let generate = selector.select(None, Capability::Generate).unwrap();
        assert_eq!(generate.model.name, "imagen-4.0-generate-001");
        assert_eq!(generate.fallback_reason, None);

        let edit = selector.select(None, Capability::Edit).unwrap();
        assert_eq!(edit.model.name, "gemini-2.5-flash-image-preview");
    }

    #[test]
    fn falls_back_when_requested_model_lacks_capability() {
        let selection = ModelSelector::new(None)
            .select(Some("imagen-4.0-generate-001"), Capability::Edit)
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-flash-image-preview");
        assert_eq!(
            selection.requested.as_deref(),
            Some("imagen-4.0-generate-001")
        );
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'imagen-4.0-generate-001' unavailable for capability 'edit'.")
        );
    }

    #[test]
    fn errors_when_no_model_has_capability() {
        let mut models = IndexMap::new();
        models.insert(
            "gen-only".to_string(),
            spec("gen-only", "dryrun", &[Capability::Generate]),
        );
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("gen-only"), Capability::Edit)
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'edit'.");
    }

    #[test]
    fn select_for_provider_respects_registry_order() {
        let selector = ModelSelector::new(None);
        let model = selector
            .select_for_provider("dryrun", Capability::Edit)
            .map(|model| model.name);
        assert_eq!(model.as_deref(), Some("dryrun-image-1"));
        assert!(selector
            .select_for_provider("imagen", Capability::Edit)
            .is_none());
    }
}
