use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeResult};

/// Simple debug node that logs its inputs
pub struct DebugNode;

#[async_trait]
impl Node for DebugNode {
    fn node_type(&self) -> &str {
        "debug.log"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeResult, NodeError> {
        let message = match ctx.inputs.get("message") {
            Some(value) => value.to_string(),
            None => {
                ctx.events.warn("no message input given");
                "(no message)".to_string()
            }
        };

        tracing::info!(step = %ctx.step, "DEBUG: {}", message);
        ctx.events.info(format!("DEBUG: {}", message));

        // Also log all inputs for visibility
        for (key, value) in &ctx.inputs {
            ctx.events.info(format!("  {}: {:?}", key, value));
        }

        Ok(NodeResult::output(message))
    }
}
