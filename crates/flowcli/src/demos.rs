// crates/flowcli/src/demos.rs

//! Demo step trees for the `run` command

use async_trait::async_trait;
use clap::ValueEnum;
use flowcore::{
    Node, NodeContext, NodeError, NodeResult, NodeStep, OutputFuture, Sequence, Step, Value,
};
use flownodes::{DebugNode, DelayNode, TemplateNode};
use flowruntime::ExecutionContext;
use std::sync::Arc;

const TWEET_LIMIT: usize = 280;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Demo {
    /// Two template nodes chained through one output
    Hello,
    /// A blog writer and a tweet writer wired together through outputs
    Parallel,
    /// A quick post whose tweet is built from its output
    Nested,
}

/// A root step plus the outputs worth printing after the run
pub struct DemoTree {
    pub root: Box<dyn Step>,
    pub outputs: Vec<(&'static str, OutputFuture<Value>)>,
}

impl Demo {
    pub fn build(self, ctx: &ExecutionContext) -> DemoTree {
        match self {
            Demo::Hello => hello(ctx),
            Demo::Parallel => parallel(ctx),
            Demo::Nested => nested(ctx),
        }
    }
}

fn hello(ctx: &ExecutionContext) -> DemoTree {
    let (hello, set_hello) = ctx.create_output::<Value>();
    let (greeting, set_greeting) = ctx.create_output::<Value>();

    let root = Sequence::new()
        .with_name("hello")
        .step(
            NodeStep::new(Arc::new(TemplateNode))
                .with_name("node_a")
                .with_config("template", "hello")
                .output(set_hello),
        )
        .step(
            NodeStep::new(Arc::new(TemplateNode))
                .with_name("node_b")
                .with_config("template", "{input} world")
                .input("input", &hello)
                .output(set_greeting),
        )
        .step(
            NodeStep::new(Arc::new(DebugNode))
                .with_name("node_c")
                .input("message", &greeting),
        );

    DemoTree {
        root: root.boxed(),
        outputs: vec![("greeting", greeting)],
    }
}

fn parallel(ctx: &ExecutionContext) -> DemoTree {
    let (post, set_post) = ctx.create_output::<Value>();
    let (tweet, set_tweet) = ctx.create_output::<Value>();

    // The tweet writer is wired to the post before the blog writer has run
    let root = Sequence::new()
        .with_name("parallel")
        .step(
            NodeStep::new(Arc::new(BlogWritingNode))
                .with_name("blog")
                .input("title", "Secrets of the Deep")
                .input("prompt", "What lives below the thermocline")
                .output(set_post),
        )
        .step(
            NodeStep::new(Arc::new(TweetWritingNode))
                .with_name("tweet")
                .input("content", &post)
                .output(set_tweet),
        );

    DemoTree {
        root: root.boxed(),
        outputs: vec![("blog post", post), ("tweet", tweet)],
    }
}

fn nested(ctx: &ExecutionContext) -> DemoTree {
    let (post, set_post) = ctx.create_output::<Value>();
    let (tweet, set_tweet) = ctx.create_output::<Value>();

    let root = NodeStep::new(Arc::new(TemplateNode))
        .with_name("quick_post")
        .with_config("template", "{title}: {body}")
        .input("title", "Tide pools")
        .input("body", "small worlds that reset twice a day")
        .output(set_post)
        .then(move |post: &Value| {
            vec![NodeStep::new(Arc::new(TweetWritingNode))
                .with_name("tweet")
                .input("content", post.clone())
                .output(set_tweet)
                .boxed()]
        });

    DemoTree {
        root: root.boxed(),
        outputs: vec![("post", post), ("tweet", tweet)],
    }
}

/// Composite node: research, draft and edit a post, handing its own
/// outputs to the edit step
pub struct BlogWritingNode;

#[async_trait]
impl Node for BlogWritingNode {
    fn node_type(&self) -> &str {
        "demo.blog"
    }

    async fn execute(&self, mut ctx: NodeContext) -> Result<NodeResult, NodeError> {
        let title = ctx.require_input("title")?.clone();
        let prompt = ctx.require_input("prompt")?.clone();

        let (research, set_research) = ctx.create_output();
        let (draft, set_draft) = ctx.create_output();
        let published = ctx.take_declared_outputs();

        let research_step = NodeStep::new(Arc::new(DelayNode))
            .with_name(format!("{}.research", ctx.step))
            .with_config("delay_ms", 100.0)
            .input("value", format!("field notes on {}", title))
            .output(set_research);

        let draft_step = NodeStep::new(Arc::new(TemplateNode))
            .with_name(format!("{}.draft", ctx.step))
            .with_config("template", "# {title}\n\n{prompt}. Drawn from {research}.")
            .input("title", title)
            .input("prompt", prompt)
            .input("research", research)
            .output(set_draft);

        let edit_step = NodeStep::new(Arc::new(TemplateNode))
            .with_name(format!("{}.edit", ctx.step))
            .with_config("template", "{draft}\n\n(edited)")
            .input("draft", draft)
            .outputs(published);

        Ok(NodeResult::new()
            .with_child(research_step)
            .with_child(draft_step)
            .with_child(edit_step))
    }
}

/// Announce a piece of content within the tweet length limit
pub struct TweetWritingNode;

#[async_trait]
impl Node for TweetWritingNode {
    fn node_type(&self) -> &str {
        "demo.tweet"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeResult, NodeError> {
        let content = ctx.require_input("content")?.to_string();
        let headline = content
            .lines()
            .map(|line| line.trim_start_matches('#').trim())
            .find(|line| !line.is_empty())
            .unwrap_or_default();

        let tweet: String = format!("New post: {}", headline)
            .chars()
            .take(TWEET_LIMIT)
            .collect();

        Ok(NodeResult::output(tweet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowruntime::RuntimeConfig;

    async fn run(demo: Demo) -> Vec<(&'static str, Value)> {
        let ctx = ExecutionContext::with_config(&RuntimeConfig::default());
        let tree = demo.build(&ctx);
        ctx.run(tree.root).await.unwrap();

        let mut values = Vec::new();
        for (label, output) in tree.outputs {
            values.push((label, output.wait().await.unwrap()));
        }
        values
    }

    #[tokio::test]
    async fn hello_demo_greets() {
        let values = run(Demo::Hello).await;
        assert_eq!(values, vec![("greeting", Value::from("hello world"))]);
    }

    #[tokio::test]
    async fn parallel_demo_tweets_the_blog_headline() {
        let values = run(Demo::Parallel).await;

        let post = values[0].1.to_string();
        assert!(post.starts_with("# Secrets of the Deep"));
        assert!(post.ends_with("(edited)"));
        assert_eq!(values[1].1, Value::from("New post: Secrets of the Deep"));
    }

    #[tokio::test]
    async fn nested_demo_builds_tweet_from_post() {
        let values = run(Demo::Nested).await;

        assert_eq!(
            values[1].1,
            Value::from("New post: Tide pools: small worlds that reset twice a day")
        );
    }
}
