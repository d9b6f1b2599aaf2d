//! Standard node library
//!
//! Collection of built-in node bodies for common operations

mod debug;
mod time;
mod transform;

pub use debug::DebugNode;
pub use time::DelayNode;
pub use transform::{JsonParseNode, JsonStringifyNode, TemplateNode};

use flowcore::Node;
use std::sync::Arc;

/// One shareable instance of every standard node
pub fn builtin_nodes() -> Vec<Arc<dyn Node>> {
    vec![
        Arc::new(DebugNode),
        Arc::new(DelayNode),
        Arc::new(JsonParseNode),
        Arc::new(JsonStringifyNode),
        Arc::new(TemplateNode),
    ]
}
