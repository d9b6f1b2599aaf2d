use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeResult, Value};
use tokio::time::{sleep, Duration};

/// Delay execution for a specified duration
pub struct DelayNode;

#[async_trait]
impl Node for DelayNode {
    fn node_type(&self) -> &str {
        "time.delay"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeResult, NodeError> {
        let delay_ms = ctx
            .get_config_or("delay_ms", Value::Number(1000.0))
            .as_f64()
            .ok_or_else(|| NodeError::Configuration("delay_ms must be a number".to_string()))?;
        if !delay_ms.is_finite() || delay_ms < 0.0 {
            return Err(NodeError::Configuration(format!(
                "delay_ms must be a finite, non-negative number, got {}",
                delay_ms
            )));
        }

        ctx.events.info(format!("Delaying for {}ms", delay_ms));
        sleep(Duration::from_millis(delay_ms as u64)).await;

        // Pass through the `value` input, or every input as an object
        let output = match ctx.inputs.get("value") {
            Some(value) => value.clone(),
            None => Value::Object(ctx.inputs),
        };

        Ok(NodeResult::output(output))
    }
}
