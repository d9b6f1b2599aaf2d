// crates/flowcli/src/main.rs

mod demos;

use anyhow::Result;
use clap::{Parser, Subcommand};
use demos::Demo;
use flowcore::{ExecutionEvent, NodeEvent};
use flowruntime::{FlowRuntime, RuntimeConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one of the demo trees
    Run {
        /// Which demo tree to run
        #[arg(value_enum)]
        demo: Demo,

        /// How long an output may stay pending before it fails
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,

        /// Stop trees that nest deeper than this
        #[arg(long)]
        max_depth: Option<usize>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List available node types
    Nodes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            demo,
            timeout_ms,
            max_depth,
            verbose,
        } => {
            let default_level = if verbose { "debug" } else { "info" };
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(default_level)),
                )
                .init();

            let config = RuntimeConfig {
                output_timeout: Duration::from_millis(timeout_ms),
                max_depth,
                ..RuntimeConfig::default()
            };
            run_demo(demo, config).await?;
        }

        Commands::Nodes => {
            list_nodes();
        }
    }

    Ok(())
}

async fn run_demo(demo: Demo, config: RuntimeConfig) -> Result<()> {
    println!("🚀 Running demo: {:?}", demo);
    println!("   Output timeout: {}ms", config.output_timeout.as_millis());
    println!();

    let runtime = FlowRuntime::with_config(config);
    let ctx = runtime.context();
    let tree = demo.build(&ctx);
    tracing::debug!(execution_id = %ctx.execution_id(), ?demo, "Built demo tree");

    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(event);
        }
    });

    let result = ctx.run(tree.root).await;

    // Wait for events to finish printing
    tokio::time::sleep(Duration::from_millis(100)).await;
    event_task.abort();

    let summary = result?;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", summary.execution_id);
    println!(
        "   Steps: {} executed, {} skipped",
        summary.steps_executed, summary.steps_skipped
    );
    println!("   Deepest level: {}", summary.max_depth);
    if !summary.unresolved_outputs.is_empty() {
        println!("   Unresolved outputs: {}", summary.unresolved_outputs.len());
    }

    println!();
    println!("📤 Outputs:");
    for (label, output) in &tree.outputs {
        match output.wait().await {
            Ok(value) => println!("   {}:\n{}\n", label, indent(&value.to_string())),
            Err(e) => println!("   {}: ❌ {}", label, e),
        }
    }

    Ok(())
}

fn print_event(event: ExecutionEvent) {
    match event {
        ExecutionEvent::RunStarted { .. } => {
            println!("▶️  Run started");
        }
        ExecutionEvent::StepStarted { step, depth, .. } => {
            println!("{}⚡ {}", "  ".repeat(depth + 1), step);
        }
        ExecutionEvent::StepCompleted {
            step, duration_ms, ..
        } => {
            println!("  ✅ {} completed in {}ms", step, duration_ms);
        }
        ExecutionEvent::StepSkipped { step, .. } => {
            println!("  ⏭️  {} skipped, identical call already ran", step);
        }
        ExecutionEvent::StepFailed { step, error, .. } => {
            println!("  ❌ {} failed: {}", step, error);
        }
        ExecutionEvent::OutputPublished {
            step, output_id, ..
        } => {
            println!("  📤 {} resolved {}", step, output_id);
        }
        ExecutionEvent::NodeEvent { step, event, .. } => match event {
            NodeEvent::Info { message } => {
                println!("     ℹ️  [{}] {}", step, message);
            }
            NodeEvent::Warning { message } => {
                println!("     ⚠️  [{}] {}", step, message);
            }
        },
        ExecutionEvent::RunCompleted {
            success,
            steps_executed,
            duration_ms,
            ..
        } => {
            if success {
                println!(
                    "✨ Run completed: {} steps in {}ms",
                    steps_executed, duration_ms
                );
            } else {
                println!("💥 Run failed after {}ms", duration_ms);
            }
        }
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("     {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let mut types: Vec<String> = flownodes::builtin_nodes()
        .iter()
        .map(|node| node.node_type().to_string())
        .collect();
    types.sort();

    for node_type in types {
        println!("  • {}", node_type);
    }
}
