use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeResult, Value};

/// Parse JSON string to Value
pub struct JsonParseNode;

#[async_trait]
impl Node for JsonParseNode {
    fn node_type(&self) -> &str {
        "transform.json_parse"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeResult, NodeError> {
        let input = ctx.input_str("json")?;

        let parsed: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(NodeResult::output(Value::Json(parsed)))
    }
}

/// Stringify Value to JSON
pub struct JsonStringifyNode;

#[async_trait]
impl Node for JsonStringifyNode {
    fn node_type(&self) -> &str {
        "transform.json_stringify"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeResult, NodeError> {
        let value = ctx.require_input("value")?;

        let json_str = serde_json::to_string_pretty(value)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(NodeResult::output(json_str))
    }
}

/// Fill `{name}` placeholders in the `template` config from the inputs
pub struct TemplateNode;

#[async_trait]
impl Node for TemplateNode {
    fn node_type(&self) -> &str {
        "transform.template"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeResult, NodeError> {
        let template = ctx.require_config("template")?;
        let template = template.as_str().ok_or_else(|| {
            NodeError::Configuration(format!(
                "template must be a string, got {}",
                template.type_name()
            ))
        })?;

        let rendered = render(template, |key| ctx.require_input(key))?;
        Ok(NodeResult::output(rendered))
    }
}

fn render<'a, F>(template: &str, lookup: F) -> Result<String, NodeError>
where
    F: Fn(&str) -> Result<&'a Value, NodeError>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = after[..close].trim();
                out.push_str(&lookup(key)?.to_string());
                rest = &after[close + 1..];
            }
            None => {
                // Unterminated placeholder; keep it verbatim
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    Ok(out)
}
