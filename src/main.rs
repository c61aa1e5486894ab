use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

mod error;
mod model;
mod network;
mod render;
mod spec;
mod telemetry;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "sqs-fargate-pipe")]
#[command(about = "SQS -> EventBridge Pipe -> Fargate task deployment descriptor", long_about = None)]
struct Cli {
    #[arg(long, value_enum, global = true, default_value_t = telemetry::LogFormat::Text)]
    log_format: telemetry::LogFormat,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct StackArgs {
    #[arg(long, env = "CDK_DEFAULT_ACCOUNT")]
    account: String,

    #[arg(long, env = "CDK_DEFAULT_REGION")]
    region: String,

    #[arg(long, default_value = model::stack::DEFAULT_STACK_NAME)]
    stack_name: String,

    /// Cached lookup results (default VPC).
    #[arg(long, default_value = "cdk.context.json")]
    context: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the descriptor and write its template (validates while building).
    Synth {
        #[command(flatten)]
        stack: StackArgs,

        #[arg(short = 'o', long, default_value = "cdk.out")]
        out_dir: PathBuf,
    },
    /// Build the descriptor and list its resources and outputs.
    Describe {
        #[command(flatten)]
        stack: StackArgs,
    },
}

fn build(args: &StackArgs) -> Result<model::Descriptor> {
    let env = spec::Environment::new(&args.account, &args.region)?;
    let lookup: network::ContextLookup = network::load_context_file(&args.context)?;
    let props = model::StackProps {
        stack_name: args.stack_name.clone(),
        env,
    };
    model::build_descriptor(&props, &lookup)
        .with_context(|| format!("descriptor construction failed for stack {}", args.stack_name))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_format);

    match cli.cmd {
        Commands::Synth { stack, out_dir } => {
            let descriptor = build(&stack)?;
            let text = render::render_template(&descriptor)?;

            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("create output directory {}", out_dir.display()))?;
            let path = out_dir.join(format!("{}.template.json", descriptor.stack_name));
            std::fs::write(&path, text)
                .with_context(|| format!("write template {}", path.display()))?;
            info!(path = %path.display(), "wrote template");

            println!("Wrote {}", path.display());
            for o in &descriptor.outputs {
                println!("Output {} = {}", o.logical_id, o.value);
            }
        }
        Commands::Describe { stack } => {
            let descriptor = build(&stack)?;
            for r in &descriptor.resources {
                println!("{:<48} {}", r.logical_id(), r.resource_type());
            }
            for p in descriptor.routing_rules() {
                println!(
                    "Pipe {} : {} -> {} (batch {}, window {}s)",
                    p.name,
                    p.source,
                    p.target,
                    p.source_params.batch_size,
                    p.source_params.max_batching_window_secs
                );
            }
            for o in &descriptor.outputs {
                println!(
                    "Output {:<41} {}  {}",
                    o.logical_id,
                    o.value,
                    o.description.as_deref().unwrap_or("")
                );
            }
        }
    }

    Ok(())
}
