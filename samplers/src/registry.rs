//! Lazily-resolving tool registry with the built-in tools

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use campaign_core::{
    CampaignConfig, CampaignError, CampaignResult, OutcomeKind, OutcomeModel, ToolBinding,
    ToolRegistry,
};
use serde_json::Value;

use crate::generators::{SequenceGenerator, WordlistGenerator};
use crate::models::{BernoulliModel, FixedOutcomeModel, LookupBoostModel};

/// Flood tool: runs to its bound, every outcome is just tallied
pub const FLOOD_TOOL: &str = "flood";

/// Wordlist tool: walks candidates until one succeeds
pub const WORDLIST_TOOL: &str = "wordlist";

/// Built-in candidates for the wordlist tool, most common first
pub const DEFAULT_WORDLIST: &[&str] = &[
    "123456",
    "password",
    "123456789",
    "12345678",
    "12345",
    "qwerty",
    "abc123",
    "111111",
    "letmein",
    "dragon",
    "monkey",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "welcome",
    "admin",
    "passw0rd",
    "trustno1",
    "shadow",
];

/// Inputs the wordlist tool's model treats as likely hits
const COMMON_CANDIDATES: usize = 5;

type Factory = Box<dyn Fn() -> ToolBinding + Send + Sync>;

struct ToolEntry {
    factory: Factory,
    binding: OnceLock<ToolBinding>,
}

/// Tool registry whose bindings are constructed on first use
///
/// Tools are registered as factories; a tool's generator and model are built
/// once, the first time it is resolved, and shared by every campaign after.
pub struct BuiltinRegistry {
    tools: BTreeMap<String, ToolEntry>,
    models: BTreeMap<String, Arc<dyn OutcomeModel>>,
}

impl BuiltinRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            models: BTreeMap::new(),
        }
    }

    /// Registry with the `flood` and `wordlist` tools and the fixed outcome models
    pub fn with_defaults() -> Self {
        let mut registry = Self::new()
            .register(FLOOD_TOOL, flood_binding)
            .register(WORDLIST_TOOL, wordlist_binding);

        for outcome in OutcomeKind::ALL {
            let model = FixedOutcomeModel::new(outcome);
            registry = registry.register_model(model.name().to_string(), Arc::new(model));
        }
        registry
    }

    /// Register a tool factory, replacing any tool with the same id
    pub fn register<F>(mut self, tool_id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> ToolBinding + Send + Sync + 'static,
    {
        self.tools.insert(
            tool_id.into(),
            ToolEntry {
                factory: Box::new(factory),
                binding: OnceLock::new(),
            },
        );
        self
    }

    /// Register a named outcome model that campaigns may select via `outcome_model`
    pub fn register_model(
        mut self,
        name: impl Into<String>,
        model: Arc<dyn OutcomeModel>,
    ) -> Self {
        self.models.insert(name.into(), model);
        self
    }

    /// Named outcome models
    pub fn model_names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ToolRegistry for BuiltinRegistry {
    fn resolve(&self, tool_id: &str) -> CampaignResult<ToolBinding> {
        let entry = self
            .tools
            .get(tool_id)
            .ok_or_else(|| CampaignError::tool_not_found(tool_id))?;

        let binding = entry.binding.get_or_init(|| {
            tracing::debug!(tool_id, "Constructing tool binding");
            (entry.factory)()
        });
        Ok(binding.clone())
    }

    fn tool_ids(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    fn outcome_model(&self, name: &str) -> Option<Arc<dyn OutcomeModel>> {
        self.models.get(name).cloned()
    }
}

impl std::fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn flood_binding() -> ToolBinding {
    let model = BernoulliModel::new(0.6)
        .with_reject_rate(0.3)
        .with_error_rate(0.02);
    ToolBinding::new(Arc::new(SequenceGenerator::new("pkt-")), Arc::new(model))
}

fn wordlist_binding() -> ToolBinding {
    let model = LookupBoostModel::new(
        DEFAULT_WORDLIST.iter().take(COMMON_CANDIDATES).copied(),
        0.05,
        BernoulliModel::new(0.001).with_reject_rate(0.01),
    );
    ToolBinding::new(
        Arc::new(WordlistGenerator::new(DEFAULT_WORDLIST.iter().copied())),
        Arc::new(model),
    )
    .with_prerequisites(Arc::new(wordlist_prerequisites))
}

/// A non-empty `target` is required; a `wordlist` override must be a
/// non-empty array of strings.
fn wordlist_prerequisites(config: &CampaignConfig) -> Result<(), String> {
    let has_target = config
        .param("target")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.trim().is_empty());
    if !has_target {
        return Err("wordlist tool requires a 'target' parameter".into());
    }

    if let Some(list) = config.param("wordlist") {
        let words = list
            .as_array()
            .ok_or("'wordlist' parameter must be an array of strings")?;
        if words.is_empty() || !words.iter().all(Value::is_string) {
            return Err("'wordlist' parameter must be a non-empty array of strings".into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::{CampaignBounds, PrerequisiteCheck, TrialGenerator, TrialRate};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> CampaignConfig {
        CampaignConfig::new(TrialRate::PerSecond(1.0), CampaignBounds::attempts(10))
    }

    #[test]
    fn test_defaults_registered() {
        let registry = BuiltinRegistry::with_defaults();
        assert_eq!(registry.tool_ids(), vec!["flood", "wordlist"]);
        assert_eq!(
            registry.model_names(),
            vec![
                "always_error",
                "always_miss",
                "always_rejected",
                "always_success"
            ]
        );
        assert!(registry.outcome_model("always_success").is_some());
        assert!(registry.outcome_model("bogus").is_none());
    }

    #[test]
    fn test_unknown_tool() {
        let registry = BuiltinRegistry::with_defaults();
        let err = registry.resolve("deauth").unwrap_err();
        assert!(matches!(err, CampaignError::ToolNotFound(ref t) if t == "deauth"));
    }

    #[test]
    fn test_bindings_constructed_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let registry = BuiltinRegistry::new().register("counted", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            flood_binding()
        });

        assert_eq!(built.load(Ordering::SeqCst), 0);
        let first = registry.resolve("counted").unwrap();
        let second = registry.resolve("counted").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first.model, &second.model));
    }

    #[test]
    fn test_flood_has_no_prerequisites() {
        let binding = BuiltinRegistry::with_defaults().resolve(FLOOD_TOOL).unwrap();
        assert_eq!(binding.generator.name(), "sequence");
        assert_eq!(binding.model.name(), "bernoulli");
        assert!(binding.prerequisites.check(&config()).is_ok());
    }

    #[test]
    fn test_wordlist_prerequisites() {
        let binding = BuiltinRegistry::with_defaults()
            .resolve(WORDLIST_TOOL)
            .unwrap();
        assert_eq!(binding.model.name(), "lookup_boost");

        let missing = binding.prerequisites.check(&config()).unwrap_err();
        assert!(missing.contains("target"));

        let ok = config().with_param("target", json!("router-admin"));
        assert!(binding.prerequisites.check(&ok).is_ok());

        let bad_list = ok.clone().with_param("wordlist", json!([]));
        assert!(binding.prerequisites.check(&bad_list).is_err());

        let bad_type = ok.with_param("wordlist", json!("hunter2"));
        assert!(binding.prerequisites.check(&bad_type).is_err());
    }
}
