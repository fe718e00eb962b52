//! `prompt`: ask for values before expanding.
//!
//! ```toml
//! [[targets]]
//! name = "Ask"
//! type = "prompt"
//! targets = ["Server"]
//! cache = true
//! prompts = [
//!     { text = "User name", properties = "user", default = "deploy" },
//!     { text = "Port", properties = ["port"], type = "number" },
//! ]
//! ```
//!
//! Every answer is written into each listed property of each resolved
//! target. Dismissing a prompt aborts the operation without an error.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use shipwright_core::{BoxFuture, DeployError, DeployResult, Settings, Target, value_to_string_list};

use crate::capability::Operation;
use crate::iterable::TargetExpander;
use crate::workspace::Workspace;

/// Type an answer is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptValueType {
    #[default]
    #[serde(alias = "str", alias = "text")]
    String,
    #[serde(alias = "int", alias = "integer", alias = "float")]
    Number,
    #[serde(alias = "boolean")]
    Bool,
}

impl PromptValueType {
    /// Convert a raw answer.
    pub fn convert(self, prompt: &str, answer: &str) -> DeployResult<Value> {
        let invalid = |message: &str| DeployError::Prompt {
            prompt: prompt.to_string(),
            message: message.to_string(),
        };

        match self {
            Self::String => Ok(Value::String(answer.to_string())),
            Self::Number => {
                let answer = answer.trim();
                if let Ok(n) = answer.parse::<i64>() {
                    return Ok(Value::Number(n.into()));
                }
                answer
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| invalid("not a number"))
            }
            Self::Bool => match answer.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid("expected yes or no")),
            },
        }
    }
}

/// A question handed to the [`Prompter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Question text.
    #[serde(default)]
    pub text: String,

    /// Properties the answer is written to.
    #[serde(default)]
    pub properties: Value,

    #[serde(default, rename = "type")]
    pub value_type: PromptValueType,

    /// Pre-filled answer.
    #[serde(default)]
    pub default: Option<Value>,

    /// Reject empty answers.
    #[serde(default)]
    pub required: bool,
}

impl PromptRequest {
    pub fn new(text: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            properties: Value::String(property.into()),
            value_type: PromptValueType::String,
            default: None,
            required: false,
        }
    }

    /// Property names the answer is written to.
    pub fn property_names(&self) -> Vec<String> {
        value_to_string_list(&self.properties)
    }

    /// Default answer as text.
    pub fn default_text(&self) -> Option<String> {
        match &self.default {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    fn answer(&self, raw: &str) -> DeployResult<Option<Value>> {
        if !raw.trim().is_empty() {
            return self.value_type.convert(&self.text, raw).map(Some);
        }
        if self.required {
            return Err(DeployError::Prompt {
                prompt: self.text.clone(),
                message: "a value is required".to_string(),
            });
        }
        self.default_text()
            .map(|d| self.value_type.convert(&self.text, &d))
            .transpose()
    }
}

/// Source of answers for prompt targets.
pub trait Prompter: Send + Sync {
    /// Ask one question. `None` means the user dismissed it.
    fn prompt<'a>(&'a self, request: &'a PromptRequest) -> BoxFuture<'a, Option<String>>;
}

/// Non-interactive prompter that dismisses every question.
#[derive(Debug, Clone, Copy, Default)]
pub struct DismissPrompter;

impl Prompter for DismissPrompter {
    fn prompt<'a>(&'a self, request: &'a PromptRequest) -> BoxFuture<'a, Option<String>> {
        tracing::debug!(target: "prompt", text = %request.text, "no interactive input, dismissing");
        Box::pin(async { None })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptExpander;

impl PromptExpander {
    /// Prompts configured on a prompt target.
    pub fn requests(target: &Target) -> DeployResult<Vec<PromptRequest>> {
        match target.setting("prompts") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                DeployError::invalid_target(target.display_name(), format!("prompts: {e}"))
            }),
        }
    }

    async fn ask(target: &Target, workspace: &Workspace) -> DeployResult<Option<Settings>> {
        let mut answers = Settings::new();
        for request in Self::requests(target)? {
            let Some(raw) = workspace.prompter().prompt(&request).await else {
                return Ok(None);
            };
            if let Some(value) = request.answer(&raw)? {
                for property in request.property_names() {
                    answers.insert(property, value.clone());
                }
            }
        }
        Ok(Some(answers))
    }

    fn prompted_properties(base: &Target) -> DeployResult<Vec<String>> {
        Ok(Self::requests(base)?
            .iter()
            .flat_map(PromptRequest::property_names)
            .collect())
    }
}

impl TargetExpander for PromptExpander {
    fn kind(&self) -> &'static str {
        "prompt"
    }

    fn prepare_base_target<'a>(
        &'a self,
        target: &'a Target,
        workspace: &'a Workspace,
        _operation: Operation,
    ) -> BoxFuture<'a, DeployResult<Option<Target>>> {
        Box::pin(async move {
            let use_cache = target.bool_setting(&["cache"], false);

            let answers = match use_cache.then(|| workspace.cached_answers(target)).flatten() {
                Some(cached) => cached,
                None => match Self::ask(target, workspace).await? {
                    Some(answers) => answers,
                    None => return Ok(None),
                },
            };

            if use_cache {
                workspace.cache_answers(target, answers.clone());
            }
            Ok(Some(target.with_overrides(&answers)))
        })
    }

    fn prepare_targets_many<'a>(
        &'a self,
        base: &'a Target,
        targets: Vec<Target>,
        _operation: Operation,
        _workspace: &'a Workspace,
    ) -> BoxFuture<'a, DeployResult<Vec<Target>>> {
        Box::pin(async move {
            let answers: Settings = Self::prompted_properties(base)?
                .into_iter()
                .filter_map(|p| base.setting(&p).cloned().map(|v| (p, v)))
                .collect();

            Ok(targets.iter().map(|t| t.with_overrides(&answers)).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::context::PluginContext;
    use crate::iterable::IterablePlugin;
    use crate::meta::testing::workspace;

    /// Answers questions from a script and counts how often it was asked.
    struct Scripted {
        answers: Mutex<VecDeque<Option<String>>>,
        asked: Mutex<usize>,
    }

    impl Scripted {
        fn new(answers: &[Option<&str>]) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.iter().map(|a| a.map(str::to_string)).collect()),
                asked: Mutex::new(0),
            })
        }

        fn asked(&self) -> usize {
            *self.asked.lock().unwrap()
        }
    }

    impl Prompter for Scripted {
        fn prompt<'a>(&'a self, _request: &'a PromptRequest) -> BoxFuture<'a, Option<String>> {
            *self.asked.lock().unwrap() += 1;
            let answer = self.answers.lock().unwrap().pop_front().flatten();
            Box::pin(async move { answer })
        }
    }

    const TARGETS: &str = r#"
        [[targets]]
        name = "Ask"
        type = "prompt"
        targets = ["Server"]
        cache = true
        prompts = [
            { text = "User", properties = "user", default = "deploy" },
            { text = "Port", properties = ["port", "fallback_port"], type = "number", required = true },
        ]

        [[targets]]
        name = "Server"
        type = "test"
        user = "root"
    "#;

    #[tokio::test]
    async fn test_answers_are_written_into_targets() {
        let prompter = Scripted::new(&[Some(""), Some("2222")]);
        let ws = workspace(TARGETS).with_prompter(prompter.clone());
        let plugin = IterablePlugin::new(PromptExpander, PluginContext::default());
        let ask = ws.find_target("ask").unwrap();

        let targets = plugin.resolve(ask, Operation::Upload, &ws).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].str_setting("user"), Some("deploy"));
        assert_eq!(targets[0].setting("port"), Some(&Value::from(2222)));
        assert_eq!(targets[0].setting("fallback_port"), Some(&Value::from(2222)));
        assert_eq!(prompter.asked(), 2);

        // Cached answers are reused without asking again.
        let targets = plugin.resolve(ask, Operation::Upload, &ws).await.unwrap();
        assert_eq!(targets[0].setting("port"), Some(&Value::from(2222)));
        assert_eq!(prompter.asked(), 2);
    }

    #[tokio::test]
    async fn test_dismissal_aborts() {
        let prompter = Scripted::new(&[None]);
        let ws = workspace(TARGETS).with_prompter(prompter.clone());
        let plugin = IterablePlugin::new(PromptExpander, PluginContext::default());
        let ask = ws.find_target("ask").unwrap();

        let targets = plugin.resolve(ask, Operation::Upload, &ws).await.unwrap();
        assert!(targets.is_empty());
        assert_eq!(prompter.asked(), 1);
        assert!(ws.cached_answers(ask).is_none());
    }

    #[tokio::test]
    async fn test_invalid_answer() {
        let prompter = Scripted::new(&[Some("admin"), Some("many")]);
        let ws = workspace(TARGETS).with_prompter(prompter);
        let plugin = IterablePlugin::new(PromptExpander, PluginContext::default());
        let ask = ws.find_target("ask").unwrap();

        let err = plugin.resolve(ask, Operation::Upload, &ws).await.unwrap_err();
        assert!(matches!(err, DeployError::Prompt { ref prompt, .. } if prompt == "Port"));
    }

    #[test]
    fn test_convert() {
        assert_eq!(PromptValueType::Bool.convert("x", "Yes").unwrap(), Value::Bool(true));
        assert_eq!(PromptValueType::Number.convert("x", "1.5").unwrap(), Value::from(1.5));
        assert!(PromptValueType::Number.convert("x", "abc").is_err());
    }
}
