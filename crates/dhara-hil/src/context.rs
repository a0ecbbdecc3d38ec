//! Typed context sent with every registration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Rendering hints for approval UIs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayHints {
    /// Headline shown to the reviewer.
    pub title: String,
    /// Free-form grouping label.
    pub category: String,
    /// Opaque section descriptors, forwarded untouched.
    pub sections: Vec<Value>,
}

impl DisplayHints {
    /// Create hints with a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Append a section descriptor.
    #[must_use]
    pub fn with_section(mut self, section: Value) -> Self {
        self.sections.push(section);
        self
    }

    /// The JSON object sent on the wire.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "title": self.title,
            "category": self.category,
            "sections": self.sections,
        })
    }
}

/// Who is calling, for which run and step, and how the call should be
/// presented to reviewers.
///
/// Every field has a default, so `ToolContext::default()` is a valid
/// context for ad hoc calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolContext {
    /// Agent identifier.
    pub agent_id: String,
    /// Run identifier; also the idempotency key when none is set.
    pub run_id: String,
    /// Step identifier within the run.
    pub step_id: String,
    /// Risk level label. `None` uses the driver's configured default.
    pub risk_level: Option<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Short human-readable summary of what the agent is doing.
    pub context_summary: String,
    /// Idempotency key. Empty means "use `run_id`".
    pub idempotency_key: String,
    /// Webhook the gateway calls when a decision is made.
    pub decision_url: String,
    /// Free-form string metadata.
    pub metadata: BTreeMap<String, String>,
    /// Rendering hints.
    pub display: Option<DisplayHints>,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            agent_id: "unknown".to_owned(),
            run_id: "run".to_owned(),
            step_id: "step".to_owned(),
            risk_level: None,
            tags: Vec::new(),
            context_summary: String::new(),
            idempotency_key: String::new(),
            decision_url: String::new(),
            metadata: BTreeMap::new(),
            display: None,
        }
    }
}

impl ToolContext {
    /// Create a context for an agent run.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    /// Set the step identifier.
    #[must_use]
    pub fn with_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = step_id.into();
        self
    }

    /// Set the risk level.
    #[must_use]
    pub fn with_risk_level(mut self, risk_level: impl Into<String>) -> Self {
        self.risk_level = Some(risk_level.into());
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set the context summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.context_summary = summary.into();
        self
    }

    /// Set an explicit idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = key.into();
        self
    }

    /// Set the decision webhook URL.
    #[must_use]
    pub fn with_decision_url(mut self, url: impl Into<String>) -> Self {
        self.decision_url = url.into();
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set display hints.
    #[must_use]
    pub fn with_display(mut self, display: DisplayHints) -> Self {
        self.display = Some(display);
        self
    }

    /// The idempotency key to send.
    #[must_use]
    pub fn effective_idempotency_key(&self) -> &str {
        if self.idempotency_key.is_empty() {
            &self.run_id
        } else {
            &self.idempotency_key
        }
    }

    /// The risk level to send, falling back to `default`.
    #[must_use]
    pub fn risk_level_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.risk_level.as_deref().unwrap_or(default)
    }

    /// A copy whose risk level is pinned, using `default` when unset.
    ///
    /// Registration and every later proposal for one action must carry the
    /// same level, so drivers resolve it once up front.
    #[must_use]
    pub fn with_resolved_risk_level(&self, default: &str) -> Self {
        let mut resolved = self.clone();
        resolved
            .risk_level
            .get_or_insert_with(|| default.to_owned());
        resolved
    }
}
