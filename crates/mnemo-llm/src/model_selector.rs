//! Parses the `MODEL_SELECTION` environment variable (`spec.md` §6), shaped
//! like the original's `KnownModelName` strings
//! (`"anthropic:claude-haiku-4-5"`, `"ollama:qwen2.5-coder"`).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelector {
    pub provider: String,
    pub model: String,
}

impl ModelSelector {
    pub fn parse(selection: &str) -> Result<Self, String> {
        let (provider, model) = selection
            .split_once(':')
            .ok_or_else(|| format!("invalid MODEL_SELECTION '{selection}', expected provider:model"))?;
        if provider.is_empty() || model.is_empty() {
            return Err(format!("invalid MODEL_SELECTION '{selection}'"));
        }
        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_and_model() {
        let s = ModelSelector::parse("anthropic:claude-haiku-4-5").unwrap();
        assert_eq!(s.provider, "anthropic");
        assert_eq!(s.model, "claude-haiku-4-5");
    }

    #[test]
    fn rejects_missing_colon() {
        assert!(ModelSelector::parse("claude-haiku-4-5").is_err());
    }
}
