//! Built-in `text` plugin.
//!
//! `constant` reports the `text` parameter as is. `command` runs a program
//! and reports its standard output; the component path and delivery are
//! passed through the environment.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use delivman_core::{
    find_parameter, CollectRequest, ImportPlugin, Parameter, PluginError, StrategyDescriptor,
    ValueCell,
};

/// Plugin name.
pub const TEXT_PLUGIN: &str = "text";

/// Free text per component, typed in or produced by a command.
pub struct TextPlugin;

impl TextPlugin {
    async fn run(&self, request: &CollectRequest<'_>) -> Result<Value, PluginError> {
        let program = find_parameter(request.parameters, "command")
            .and_then(ValueCell::as_str)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PluginError::InvalidParameter("command".to_string()))?;
        let args: Vec<String> = find_parameter(request.parameters, "args")
            .and_then(ValueCell::as_list)
            .unwrap_or_default()
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect();

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .env("DELIVMAN_COMPONENT", request.path.join("/"))
            .env("DELIVMAN_DELIVERY", &request.delivery.name);
        if let Some(since) = request.since {
            cmd.env("DELIVMAN_SINCE", &since.name);
        }

        debug!(program, ?args, "running command");
        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PluginError::Command {
                command: std::iter::once(program.to_string()).chain(args).collect::<Vec<_>>().join(" "),
                message: if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    stderr
                },
            });
        }
        Ok(json!({ "text": String::from_utf8_lossy(&output.stdout).trim_end() }))
    }
}

#[async_trait]
impl ImportPlugin for TextPlugin {
    fn name(&self) -> &str {
        TEXT_PLUGIN
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn strategies(&self) -> Vec<StrategyDescriptor> {
        vec![
            StrategyDescriptor {
                name: "constant".to_string(),
                description: "Text entered by hand".to_string(),
                default_parameters: vec![Parameter::new("text", "")],
            },
            StrategyDescriptor {
                name: "command".to_string(),
                description: "Standard output of a command".to_string(),
                default_parameters: vec![
                    Parameter::new("command", ""),
                    Parameter::new("args", Vec::<String>::new()),
                ],
            },
        ]
    }

    async fn collect(&self, request: &CollectRequest<'_>) -> Result<Value, PluginError> {
        match request.strategy {
            "constant" => {
                let text = find_parameter(request.parameters, "text")
                    .and_then(ValueCell::as_str)
                    .unwrap_or_default();
                Ok(json!({ "text": text }))
            }
            "command" => self.run(request).await,
            other => Err(PluginError::Other(format!("unknown strategy '{}'", other))),
        }
    }

    fn has_content(&self, content: &Value) -> bool {
        content["text"].as_str().is_some_and(|t| !t.trim().is_empty())
    }

    fn differs(&self, older: &Value, newer: &Value) -> bool {
        older["text"] != newer["text"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use delivman_core::{ComponentId, Delivery};
    use pretty_assertions::assert_eq;

    fn request<'a>(
        path: &'a [String],
        delivery: &'a Delivery,
        strategy: &'a str,
        parameters: &'a [Parameter],
    ) -> CollectRequest<'a> {
        CollectRequest {
            component: ComponentId::new(),
            path,
            delivery,
            since: None,
            strategy,
            parameters,
        }
    }

    #[tokio::test]
    async fn test_constant() {
        let delivery = Delivery::new("d1", "ann", Utc::now());
        let path = vec!["app".to_string()];
        let parameters = vec![Parameter::new("text", "Release notes")];
        let content = TextPlugin
            .collect(&request(&path, &delivery, "constant", &parameters))
            .await
            .unwrap();
        assert_eq!(content, json!({ "text": "Release notes" }));
        assert!(TextPlugin.has_content(&content));
        assert!(!TextPlugin.has_content(&json!({ "text": "  " })));
    }

    #[tokio::test]
    async fn test_missing_command_is_invalid() {
        let delivery = Delivery::new("d1", "ann", Utc::now());
        let path = vec!["app".to_string()];
        let parameters = vec![Parameter::new("command", "")];
        let err = TextPlugin
            .collect(&request(&path, &delivery, "command", &parameters))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidParameter(name) if name == "command"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_output_and_failure() {
        let delivery = Delivery::new("d1", "ann", Utc::now());
        let path = vec!["app".to_string(), "ui".to_string()];
        let parameters = vec![
            Parameter::new("command", "sh"),
            Parameter::new("args", vec!["-c", "echo $DELIVMAN_COMPONENT@$DELIVMAN_DELIVERY"]),
        ];
        let content = TextPlugin
            .collect(&request(&path, &delivery, "command", &parameters))
            .await
            .unwrap();
        assert_eq!(content, json!({ "text": "app/ui@d1" }));

        let parameters = vec![
            Parameter::new("command", "sh"),
            Parameter::new("args", vec!["-c", "echo broken >&2; exit 3"]),
        ];
        let err = TextPlugin
            .collect(&request(&path, &delivery, "command", &parameters))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Command { message, .. } if message == "broken"));
    }

    #[test]
    fn test_differs_compares_text() {
        assert!(TextPlugin.differs(&json!({ "text": "a" }), &json!({ "text": "b" })));
        assert!(!TextPlugin.differs(&json!({ "text": "a" }), &json!({ "text": "a" })));
    }
}
