//! Planned and applied child-resource actions

use serde::{Deserialize, Serialize};

/// One step of a child reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,

    /// Identity of the child (`private_network:<uuid>`, `public_network`, ...).
    pub target: String,

    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Add,
    Migrate,
    Remove,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Add => write!(f, "add"),
            ActionType::Migrate => write!(f, "migrate"),
            ActionType::Remove => write!(f, "remove"),
        }
    }
}

/// Result of applying actions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    pub succeeded: Vec<ActionResult>,
    pub failed: Vec<ActionResult>,
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, target: impl Into<String>, message: impl Into<String>) {
        self.succeeded.push(ActionResult {
            target: target.into(),
            message: message.into(),
            error: None,
        });
    }

    pub fn add_failure(&mut self, target: impl Into<String>, error: impl Into<String>) {
        self.failed.push(ActionResult {
            target: target.into(),
            message: String::new(),
            error: Some(error.into()),
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub target: String,
    pub message: String,
    pub error: Option<String>,
}

/// Ordered list of actions: removes, then migrates, then adds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn has_changes(&self) -> bool {
        !self.actions.is_empty()
    }

    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            add: self.actions_by_type(ActionType::Add).len(),
            migrate: self.actions_by_type(ActionType::Migrate).len(),
            remove: self.actions_by_type(ActionType::Remove).len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanSummary {
    pub add: usize,
    pub migrate: usize,
    pub remove: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to add, {} to migrate, {} to remove",
            self.add, self.migrate, self.remove
        )
    }
}
