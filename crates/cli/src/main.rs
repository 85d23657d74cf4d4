//! Chance CLI - goals, next steps, and failure patterns.

use anyhow::{Context, Result};
use chance_core::{
    parse_dependency_list, Action, ActionId, ActionStatus, CompletionStatus, EnergyLevel, GoalId,
    GoalStatus, Time,
};
use chance_execution::{ActionIndex, DependencyResolver, ReadyActionView, Resolution};
use chance_storage::{EventFilter, JsonStorage};
use chance_work::{
    compose, default_layers, BasicGoalManager, Decomposer, EventEntry, GoalDetail, GoalManager,
    GoalSpec, GoalUpdate, NewAction, SingleStepDecomposer, StaticDecomposer, WorkConfig,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chance")]
#[command(about = "Pick the next doable step and spot recurring failures", long_about = None)]
struct Cli {
    /// Data directory
    #[arg(long, global = true, default_value = ".chance")]
    data_dir: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage goals
    #[command(subcommand)]
    Goal(GoalCommand),
    /// Manage actions
    #[command(subcommand)]
    Action(ActionCommand),
    /// Show the next executable steps of a goal
    Next {
        /// Goal ID
        goal: GoalId,
        /// Maximum number of steps
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Record the outcome of an action
    Log {
        /// Action ID
        action: ActionId,
        /// done, failed or blocked
        status: CompletionStatus,
        /// Why it did not work out
        #[arg(long)]
        reason: Option<String>,
    },
    /// List recorded events, oldest first
    Events {
        /// Only events of this goal
        #[arg(long)]
        goal: Option<GoalId>,
        /// Only events of this action
        #[arg(long)]
        action: Option<ActionId>,
    },
    /// List detected breakpoints
    Breakpoints {
        /// Only breakpoints of this action
        #[arg(long)]
        action: Option<ActionId>,
    },
    /// Aggregate statistics
    #[command(subcommand)]
    Stats(StatsCommand),
}

#[derive(Subcommand)]
enum GoalCommand {
    /// Create a goal and decompose it into actions
    Add {
        /// What you want to achieve
        description: String,
        /// Deadline (RFC 3339)
        #[arg(long)]
        deadline: Option<Time>,
        /// Outcome cannot be measured
        #[arg(long)]
        unmeasurable: bool,
        /// JSON plan to use instead of the built-in decomposer
        #[arg(long)]
        plan: Option<PathBuf>,
    },
    /// List goals
    List,
    /// Show a goal with its actions
    Show {
        /// Goal ID
        id: GoalId,
    },
    /// Change a goal
    Update {
        /// Goal ID
        id: GoalId,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New status
        #[arg(long)]
        status: Option<GoalStatus>,
    },
    /// Mark a goal cancelled
    Cancel {
        /// Goal ID
        id: GoalId,
    },
    /// Replace a goal's actions with a fresh decomposition
    Redecompose {
        /// Goal ID
        id: GoalId,
        /// JSON plan to use instead of the built-in decomposer
        #[arg(long)]
        plan: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ActionCommand {
    /// Add an action to a goal
    Add {
        /// Goal ID
        goal: GoalId,
        /// What to do
        description: String,
        /// Estimated minutes
        #[arg(long, default_value = "30")]
        duration: u32,
        /// low, medium or high
        #[arg(long, default_value = "medium")]
        energy: EnergyLevel,
        /// Higher is more urgent
        #[arg(long, default_value = "0")]
        priority: i32,
        /// Action IDs that must be done first, as "1,2" or "[1,2]"
        #[arg(long, default_value = "")]
        deps: String,
    },
    /// Set an action's status
    Status {
        /// Action ID
        id: ActionId,
        /// pending, available, in_progress, done or blocked
        status: ActionStatus,
    },
}

#[derive(Subcommand)]
enum StatsCommand {
    /// Recent completions, stuck goals and failure reasons
    Summary,
    /// Recurring failure causes and actions that keep failing
    Parasitic,
    /// Breakpoint patterns ranked by risk
    Prediction,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    let plan = match &cli.command {
        Commands::Goal(GoalCommand::Add { plan, .. })
        | Commands::Goal(GoalCommand::Redecompose { plan, .. }) => plan.clone(),
        _ => None,
    };
    let manager = open(&cli.data_dir, plan.as_deref()).await?;

    match cli.command {
        Commands::Goal(command) => run_goal(&manager, command, json).await?,
        Commands::Action(command) => run_action(&manager, command, json).await?,
        Commands::Next { goal, limit } => {
            let steps = manager.next_steps(goal, limit).await?;
            if json {
                print_json(&steps)?;
            } else if steps.is_empty() {
                println!("Nothing ready for goal {}", goal);
            } else {
                println!("Next steps for goal {}", goal);
                for step in &steps {
                    print_step(step);
                }
            }
        }
        Commands::Log { action, status, reason } => {
            let logged = manager
                .log_event(EventEntry {
                    action_id: action,
                    status,
                    failure_reason: reason,
                })
                .await?;
            if json {
                print_json(&serde_json::json!({
                    "event": logged.event,
                    "breakpoints": logged.breakpoints,
                }))?;
            } else {
                println!("Logged event {}: action {} {}", logged.event.id, action, status);
                for breakpoint in &logged.breakpoints {
                    println!(
                        "  Breakpoint: {} failures, pattern {}",
                        breakpoint.failure_count, breakpoint.pattern
                    );
                }
            }
        }
        Commands::Events { goal, action } => {
            let events = manager
                .events(EventFilter {
                    goal_id: goal,
                    action_id: action,
                    ..Default::default()
                })
                .await?;
            if json {
                print_json(&events)?;
            } else {
                println!("Events ({})", events.len());
                for event in events {
                    println!(
                        "  {} | {} | action {} | {}{}",
                        event.id,
                        event.timestamp.format("%Y-%m-%d %H:%M"),
                        event.action_id,
                        event.status,
                        event
                            .failure_reason
                            .as_deref()
                            .map(|r| format!(" - {}", r))
                            .unwrap_or_default(),
                    );
                }
            }
        }
        Commands::Breakpoints { action } => {
            let breakpoints = manager.breakpoints(action).await?;
            if json {
                print_json(&breakpoints)?;
            } else {
                println!("Breakpoints ({})", breakpoints.len());
                for bp in breakpoints {
                    println!(
                        "  {} | action {} | {} | {} failures",
                        bp.id, bp.action_id, bp.pattern, bp.failure_count
                    );
                }
            }
        }
        Commands::Stats(command) => run_stats(&manager, command, json).await?,
    }

    Ok(())
}

async fn open(data_dir: &Path, plan: Option<&Path>) -> Result<BasicGoalManager<JsonStorage>> {
    let config = WorkConfig::load(data_dir)
        .await
        .with_context(|| format!("loading configuration from {}", data_dir.display()))?;
    debug!(?config, "configuration loaded");

    let storage = JsonStorage::new(&config.data_dir)
        .await
        .with_context(|| format!("opening store at {}", config.data_dir.display()))?;

    let base: Arc<dyn Decomposer> = match plan {
        Some(path) => Arc::new(StaticDecomposer::from_file(path).await?),
        None => Arc::new(SingleStepDecomposer),
    };
    let decomposer = compose(base, &default_layers(&config));

    Ok(BasicGoalManager::new(storage, decomposer, config))
}

async fn run_goal(manager: &impl GoalManager, command: GoalCommand, json: bool) -> Result<()> {
    match command {
        GoalCommand::Add { description, deadline, unmeasurable, .. } => {
            let detail = manager
                .create_goal(GoalSpec {
                    description,
                    measurable: !unmeasurable,
                    time_bound: deadline,
                })
                .await?;
            if json {
                print_detail_json(&detail)?;
            } else {
                println!("Created goal {}: {}", detail.goal.id, detail.goal.description);
                print_detail(&detail);
            }
        }
        GoalCommand::List => {
            let goals = manager.list_goals().await?;
            if json {
                print_json(&goals)?;
            } else {
                println!("Goals ({})", goals.len());
                for goal in goals {
                    println!("  {} | {} | {}", goal.id, goal.status, goal.description);
                }
            }
        }
        GoalCommand::Show { id } => {
            let detail = manager.goal_detail(id).await?;
            if json {
                print_detail_json(&detail)?;
            } else {
                let goal = &detail.goal;
                println!("Goal: {}", goal.id);
                println!("  Description: {}", goal.description);
                println!("  Status: {}", goal.status);
                println!("  Measurable: {}", goal.measurable);
                if let Some(deadline) = goal.time_bound {
                    println!("  Deadline: {}", deadline);
                }
                println!("  Created: {}", goal.created_at);
                print_detail(&detail);
            }
        }
        GoalCommand::Update { id, description, status } => {
            let goal = manager.update_goal(id, GoalUpdate { description, status }).await?;
            if json {
                print_json(&goal)?;
            } else {
                println!("Updated goal {}: {} ({})", goal.id, goal.description, goal.status);
            }
        }
        GoalCommand::Cancel { id } => {
            let goal = manager.cancel_goal(id).await?;
            if json {
                print_json(&goal)?;
            } else {
                println!("Cancelled goal {}", goal.id);
            }
        }
        GoalCommand::Redecompose { id, .. } => {
            let actions = manager.redecompose(id).await?;
            if json {
                print_json(&actions)?;
            } else {
                println!("Goal {} now has {} actions", id, actions.len());
                for action in actions {
                    println!("  {} | {} | {}", action.id, action.status, action.description);
                }
            }
        }
    }
    Ok(())
}

async fn run_action(manager: &impl GoalManager, command: ActionCommand, json: bool) -> Result<()> {
    match command {
        ActionCommand::Add { goal, description, duration, energy, priority, deps } => {
            let dependencies = parse_dependency_list(&deps).context("parsing --deps")?;
            let action = manager
                .add_action(
                    goal,
                    NewAction {
                        description,
                        duration_min: duration,
                        energy_level: energy,
                        priority,
                        dependencies,
                    },
                )
                .await?;
            if json {
                print_json(&action)?;
            } else {
                println!("Added action {}: {} ({})", action.id, action.description, action.status);
            }
        }
        ActionCommand::Status { id, status } => {
            let action = manager.set_action_status(id, status).await?;
            if json {
                print_json(&action)?;
            } else {
                println!("Action {} is now {}", action.id, action.status);
            }
        }
    }
    Ok(())
}

async fn run_stats(manager: &impl GoalManager, command: StatsCommand, json: bool) -> Result<()> {
    match command {
        StatsCommand::Summary => {
            let summary = manager.summary().await?;
            if json {
                return print_json(&summary);
            }
            println!("Summary");
            println!("  Done in window: {}", summary.done_in_window);
            println!("  Stuck goals: {}", summary.stuck_goals);
            for (reason, count) in &summary.failure_reasons {
                println!("  {:>3} x {}", count, reason);
            }
        }
        StatsCommand::Parasitic => {
            let report = manager.parasitic().await?;
            if json {
                return print_json(&report);
            }
            println!("Breakpoint patterns");
            for (pattern, count) in &report.breakpoint_patterns {
                println!("  {}: {}", pattern, count);
            }
            println!("Actions that keep failing");
            for action in &report.negative_utility_actions {
                println!("  action {}: {} failures", action.action_id, action.failure_count);
            }
        }
        StatsCommand::Prediction => {
            let risks = manager.prediction().await?;
            if json {
                return print_json(&risks);
            }
            println!("Risk by pattern");
            for risk in &risks {
                println!(
                    "  {}: {:.2}% ({} breakpoints)",
                    risk.pattern, risk.risk_percentage, risk.count
                );
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_detail_json(detail: &GoalDetail) -> Result<()> {
    print_json(&serde_json::json!({
        "goal": detail.goal,
        "actions": detail.actions,
        "progress": detail.progress,
        "waiting_on": waiting_on(&detail.actions),
    }))
}

/// Unmet dependencies of every unfinished action that has any.
fn waiting_on(actions: &[Action]) -> BTreeMap<ActionId, Vec<ActionId>> {
    let index = ActionIndex::new(actions);
    let resolver = DependencyResolver::new();
    actions
        .iter()
        .filter(|a| a.status != ActionStatus::Done)
        .filter_map(|a| match resolver.check(a, &index) {
            Resolution::Blocked(unmet) => Some((a.id, unmet)),
            Resolution::Ready => None,
        })
        .collect()
}

fn print_detail(detail: &GoalDetail) {
    let progress = &detail.progress;
    println!(
        "  Progress: {}/{} done, {} blocked, {} ready ({:.0}%)",
        progress.done, progress.total, progress.blocked, progress.ready, progress.percentage
    );
    println!("  Actions ({})", detail.actions.len());
    let waiting = waiting_on(&detail.actions);
    for action in &detail.actions {
        let deps = join_ids(&action.dependencies);
        println!(
            "    {} | {} | p{} | {}m {} | {}{}",
            action.id,
            action.status,
            action.priority,
            action.duration_min,
            action.energy_level,
            action.description,
            if deps.is_empty() {
                String::new()
            } else {
                format!(" (after {})", deps)
            },
        );
        if let Some(unmet) = waiting.get(&action.id) {
            println!("      waiting on {}", join_ids(unmet));
        }
    }
}

fn join_ids(ids: &[ActionId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn print_step(step: &ReadyActionView) {
    println!(
        "  {} | p{} | {}m {} | {}",
        step.action_id, step.priority, step.duration_min, step.energy_level, step.description
    );
}
