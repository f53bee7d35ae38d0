//! Deployment plan: ordered contract creations and their argument bindings.
//!
//! A plan is validated once, when it is built, so that a malformed plan is rejected
//! before any transaction reaches the network. After validation every
//! [`StepArg::StepAddress`] is guaranteed to name a step that appears strictly earlier.

use std::collections::HashSet;

use anyhow::Result;
use derive_more::Deref;
use serde::{Deserialize, Serialize};

/// Raw argument value as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

/// A constructor argument binding.
///
/// In configuration files a string starting with `@` references the address of the step
/// with that name, and `@@` escapes a literal leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ArgValue", into = "ArgValue")]
pub enum StepArg {
    /// A literal value, coerced against the constructor ABI at deployment time.
    Literal(String),
    /// The address produced by an earlier step.
    StepAddress(String),
}

impl StepArg {
    /// A literal argument.
    pub fn literal(value: impl ToString) -> Self {
        Self::Literal(value.to_string())
    }

    /// A reference to the address deployed by the step named `step`.
    pub fn step(step: impl Into<String>) -> Self {
        Self::StepAddress(step.into())
    }
}

impl From<ArgValue> for StepArg {
    fn from(value: ArgValue) -> Self {
        match value {
            ArgValue::Bool(b) => Self::Literal(b.to_string()),
            ArgValue::Integer(i) => Self::Literal(i.to_string()),
            ArgValue::Text(s) => {
                if let Some(rest) = s.strip_prefix("@@") {
                    Self::Literal(format!("@{rest}"))
                } else if let Some(step) = s.strip_prefix('@') {
                    Self::StepAddress(step.to_string())
                } else {
                    Self::Literal(s)
                }
            }
        }
    }
}

impl From<StepArg> for ArgValue {
    fn from(arg: StepArg) -> Self {
        match arg {
            StepArg::Literal(s) if s.starts_with('@') => ArgValue::Text(format!("@{s}")),
            StepArg::Literal(s) => ArgValue::Text(s),
            StepArg::StepAddress(step) => ArgValue::Text(format!("@{step}")),
        }
    }
}

impl std::fmt::Display for StepArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepArg::Literal(s) => write!(f, "{s}"),
            StepArg::StepAddress(step) => write!(f, "@{step}"),
        }
    }
}

/// One contract creation within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStep {
    /// Unique name of the step, used by later steps to reference its address.
    pub name: String,
    /// Name of the contract artifact to deploy.
    pub contract: String,
    /// Human-readable label used in log lines. Defaults to the contract name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Constructor arguments, in declaration order.
    #[serde(default)]
    pub args: Vec<StepArg>,
}

impl DeploymentStep {
    /// Create a step without constructor arguments.
    pub fn new(name: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: contract.into(),
            label: None,
            args: Vec::new(),
        }
    }

    /// Set the label used in log lines.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a constructor argument.
    pub fn arg(mut self, arg: StepArg) -> Self {
        self.args.push(arg);
        self
    }

    /// The label printed when the step completes.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.contract)
    }

    /// Names of the steps this step depends on.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            StepArg::StepAddress(step) => Some(step.as_str()),
            StepArg::Literal(_) => None,
        })
    }
}

/// A validated, ordered sequence of deployment steps.
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct DeploymentPlan {
    steps: Vec<DeploymentStep>,
}

impl DeploymentPlan {
    /// Validate `steps` and build a plan.
    ///
    /// Fails if the plan is empty, if a step name or contract is blank, if two steps
    /// share a name, or if a step references itself, a later step or an unknown step.
    pub fn new(steps: Vec<DeploymentStep>) -> Result<Self> {
        if steps.is_empty() {
            anyhow::bail!("Deployment plan has no steps");
        }

        let mut seen: HashSet<&str> = HashSet::new();

        for (index, step) in steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                anyhow::bail!("Step #{} has an empty name", index + 1);
            }

            if step.contract.trim().is_empty() {
                anyhow::bail!("Step '{}' does not name a contract", step.name);
            }

            for dependency in step.dependencies() {
                if dependency == step.name {
                    anyhow::bail!("Step '{}' references its own address", step.name);
                }

                if !seen.contains(dependency) {
                    if steps[index..].iter().any(|s| s.name == dependency) {
                        anyhow::bail!(
                            "Step '{}' references step '{}', which is deployed later",
                            step.name,
                            dependency
                        );
                    }
                    anyhow::bail!(
                        "Step '{}' references unknown step '{}'",
                        step.name,
                        dependency
                    );
                }
            }

            if !seen.insert(step.name.as_str()) {
                anyhow::bail!("Duplicate step name '{}'", step.name);
            }
        }

        Ok(Self { steps })
    }

    /// The steps, in execution order.
    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }
}
