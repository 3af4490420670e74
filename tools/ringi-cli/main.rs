use clap::{Parser, Subcommand};
use ringi::execution::{Execution, StepOutcome};
use ringi::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Define, activate and run MPR approval flows
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Registry state file (bincode), created on first write
    #[arg(short, long, global = true, default_value = "ringi-state.bin")]
    state: String,

    /// Optional engine configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Acting user recorded on lifecycle changes and decisions
    #[arg(short, long, global = true, default_value = "")]
    actor: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the built-in flow templates
    Templates,
    /// Create a Draft flow from a template or a JSON spec
    Create {
        /// Template to instantiate (simple, conditional, comprehensive)
        #[arg(short, long, conflicts_with = "spec")]
        template: Option<Template>,
        /// Path to a JSON flow spec
        #[arg(long)]
        spec: Option<String>,
        /// Flow name, used with --template
        #[arg(short, long, default_value = "MPR Approval")]
        name: String,
    },
    /// List flows
    List {
        #[arg(long)]
        status: Option<FlowStatus>,
    },
    /// Show a flow's nodes and edges
    Show { flow: Uuid },
    /// Validate a flow and print every violation
    Validate { flow: Uuid },
    /// Make a flow the single active flow
    Activate { flow: Uuid },
    /// Retire the active flow
    Deactivate,
    /// Start an execution against the active flow (or --flow)
    Start {
        #[arg(long)]
        flow: Option<Uuid>,
        /// Payload JSON file; the sample MPR is used when omitted
        #[arg(short, long)]
        payload: Option<String>,
    },
    /// Record an approval decision on a waiting execution
    Resume {
        execution: Uuid,
        /// Reject instead of approving
        #[arg(long)]
        reject: bool,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Abandon a waiting execution
    Abandon {
        execution: Uuid,
        #[arg(long, default_value = "abandoned from the command line")]
        reason: String,
    },
    /// List executions, newest first
    Executions {
        #[arg(long)]
        status: Option<ExecutionStatus>,
    },
    /// List approvals waiting on a decision
    Pending,
    /// Print registry statistics
    Stats,
    /// Delete finished executions older than the retention period
    Cleanup {
        /// Override the configured retention period
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Dry-run a flow, auto-approving every approval
    Test {
        flow: Uuid,
        #[arg(short, long)]
        payload: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ringi=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load config: {}", e))),
        None => EngineConfig::default(),
    };
    let registry = load_registry(&cli.state, config);

    if run_command(&registry, cli.command, &cli.actor) {
        registry
            .snapshot()
            .save(&cli.state)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to save state: {}", e)));
    }
}

fn load_registry(path: &str, config: EngineConfig) -> FlowRegistry {
    if !Path::new(path).exists() {
        return FlowRegistry::new(config);
    }
    let snapshot = Snapshot::from_file(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load state '{}': {}", path, e)));
    FlowRegistry::from_snapshot(config, snapshot)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to restore state: {}", e)))
}

fn load_payload(path: Option<&str>) -> Payload {
    match path {
        Some(path) => Payload::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load payload: {}", e))),
        None => {
            println!("No payload file provided. Using the sample MPR.");
            Payload::sample_mpr()
        }
    }
}

/// Runs one command. Returns true when the registry changed and must be saved.
fn run_command(registry: &FlowRegistry, command: Command, actor: &str) -> bool {
    match command {
        Command::Templates => {
            for template in Template::ALL {
                println!("{:<14} {}", template.to_string(), template.description());
            }
            false
        }
        Command::Create {
            template,
            spec,
            name,
        } => {
            let flow = match (template, spec) {
                (Some(template), _) => registry.create_from_template(template, &name, actor),
                (None, Some(path)) => {
                    let json = std::fs::read_to_string(&path).unwrap_or_else(|e| {
                        exit_with_error(&format!("Failed to read spec file '{}': {}", path, e))
                    });
                    let spec = FlowSpec::from_json(&json)
                        .unwrap_or_else(|e| exit_with_error(&e.to_string()));
                    registry.create(spec, actor)
                }
                (None, None) => exit_with_error("Either --template or --spec is required."),
            }
            .unwrap_or_else(|e| exit_with_error(&e.to_string()));
            println!("Created {} v{} ({}) as draft", flow.name, flow.version, flow.id);
            true
        }
        Command::List { status } => {
            let flows = registry.list(&FlowFilter { status, name: None });
            if flows.is_empty() {
                println!("No flows registered.");
            }
            for flow in flows {
                println!(
                    "{}  {:<24} v{:<3} {:<9} {} nodes",
                    flow.id,
                    flow.name,
                    flow.version,
                    flow.status.to_string(),
                    flow.node_count()
                );
            }
            false
        }
        Command::Show { flow } => {
            let flow = registry
                .get(flow)
                .unwrap_or_else(|e| exit_with_error(&e.to_string()));
            println!("{} v{} [{}]", flow.name, flow.version, flow.status);
            if !flow.description.is_empty() {
                println!("{}", flow.description);
            }
            println!("Created by {} at {}", flow.created_by, flow.created_at);
            println!("\nNodes:");
            for node in &flow.nodes {
                println!("  {:<16} {:<12} {}", node.id, node.kind.name(), node.label);
            }
            println!("\nEdges:");
            for edge in &flow.edges {
                println!("  {} -> {} ({})", edge.source, edge.target, edge.guard);
            }
            false
        }
        Command::Validate { flow } => {
            let report = registry
                .validate(flow)
                .unwrap_or_else(|e| exit_with_error(&e.to_string()));
            println!("{}", report);
            if !report.is_valid() {
                std::process::exit(2);
            }
            false
        }
        Command::Activate { flow } => {
            let flow = registry
                .activate(flow, actor)
                .unwrap_or_else(|e| exit_with_error(&e.to_string()));
            println!("-> {} v{} is now active", flow.name, flow.version);
            true
        }
        Command::Deactivate => {
            match registry
                .deactivate(actor)
                .unwrap_or_else(|e| exit_with_error(&e.to_string()))
            {
                Some(flow) => println!("-> {} v{} deactivated", flow.name, flow.version),
                None => println!("No flow was active."),
            }
            true
        }
        Command::Start { flow, payload } => {
            let payload = load_payload(payload.as_deref());
            let started = Instant::now();
            match registry.start_execution(flow, payload) {
                Ok(execution) => print_execution(&execution),
                Err(RegistryError::RunFailed {
                    execution_id,
                    source,
                }) => {
                    eprintln!("\nError: {}", source);
                    if let Ok(failed) = registry.execution(execution_id) {
                        print_execution(&failed);
                    }
                }
                Err(e) => exit_with_error(&e.to_string()),
            }
            println!("Execution time: {:?}", started.elapsed());
            true
        }
        Command::Resume {
            execution,
            reject,
            comment,
        } => {
            let mut decision = if reject {
                Decision::reject(actor)
            } else {
                Decision::approve(actor)
            };
            if let Some(comment) = comment {
                decision = decision.with_comment(&comment);
            }
            let execution = registry
                .resume_execution(execution, decision)
                .unwrap_or_else(|e| exit_with_error(&e.to_string()));
            print_execution(&execution);
            true
        }
        Command::Abandon { execution, reason } => {
            let execution = registry
                .abandon_execution(execution, actor, &reason)
                .unwrap_or_else(|e| exit_with_error(&e.to_string()));
            print_execution(&execution);
            true
        }
        Command::Executions { status } => {
            let executions = registry.executions(&ExecutionFilter { flow: None, status });
            if executions.is_empty() {
                println!("No executions.");
            }
            for execution in executions {
                println!(
                    "{}  {:<21} {}  at {}",
                    execution.id,
                    execution.status.to_string(),
                    execution.flow,
                    execution.current_node().unwrap_or("-")
                );
            }
            false
        }
        Command::Pending => {
            let pending = registry.pending_approvals();
            if pending.is_empty() {
                println!("No approvals pending.");
            }
            for approval in pending {
                println!(
                    "{}  {:<16} {:<12} since {}",
                    approval.execution,
                    approval.node,
                    approval.role,
                    approval.waiting_since.format("%Y-%m-%d %H:%M")
                );
            }
            false
        }
        Command::Stats => {
            println!("{}", registry.statistics());
            false
        }
        Command::Cleanup { days, dry_run } => {
            let older_than = match days {
                Some(days) => chrono::Duration::days(i64::from(days)),
                None => registry.config().retention(),
            };
            let count = registry.cleanup(older_than, dry_run);
            if dry_run {
                println!("Would remove {} execution(s).", count);
            } else {
                println!("Removed {} execution(s).", count);
            }
            !dry_run
        }
        Command::Test { flow, payload } => {
            let payload = load_payload(payload.as_deref());
            let execution = registry
                .simulate(flow, payload, actor)
                .unwrap_or_else(|e| exit_with_error(&e.to_string()));
            print_execution(&execution);
            false
        }
    }
}

fn print_execution(execution: &Execution) {
    println!("\nExecution {} [{}]", execution.id, execution.status);
    println!("  Flow: {}", execution.flow);
    for step in &execution.steps {
        let detail = match &step.outcome {
            StepOutcome::Started { .. } => String::new(),
            StepOutcome::Notified { recipients, .. } => format!("notified {}", recipients.join(", ")),
            StepOutcome::Routed { reason, .. } => reason.clone(),
            StepOutcome::Approval { role, decision } => match decision {
                Some(d) => format!("{} by {} ({})", d.verdict, d.actor, role),
                None => format!("waiting on {}", role),
            },
            StepOutcome::Finished { final_status } => final_status.clone().unwrap_or_default(),
        };
        println!(
            "  {:>2}. {:<16} {:<12} {}",
            step.sequence, step.node, step.kind_name, detail
        );
    }
    if let Some(failure) = &execution.failure {
        println!("  -> Failed ({}): {}", failure.kind, failure.message);
    }
    if let Some(duration) = execution.duration() {
        println!("  -> Took {}ms", duration.num_milliseconds());
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
