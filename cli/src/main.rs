//! Warden operator CLI.
//!
//! Configuration comes from `WARDEN_CONFIG`, `WARDEN_STATE_DIR`,
//! `WARDEN_LOG_DIR` and `WARDEN_WORKSPACE_ROOT`; see `warden_runtime::config`.
//!
//! Usage:
//!   warden check --role content --tool Write --params '{"file_path":"app/x.ts"}'
//!   warden budget --role ops
//!   warden prune --keep-days 30
//!   warden scenarios

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use warden_contracts::{
    budget::{lamports_to_native, micros_to_usd, BudgetSummary},
    error::{ValidationKind, WardenError, WardenResult},
    policy::ToolRequest,
    role::AgentRole,
};
use warden_core::traits::BudgetLedger;
use warden_runtime::{scenarios, Warden, WardenBuilder, WardenConfig};

/// Exit status for a denied `check`.
const EXIT_DENIED: i32 = 2;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "warden",
    about = "Guardrail pipeline for role-scoped AI agents",
    long_about = "Evaluates agent tool calls against rate limits, input rules, daily budgets\n\
                  and role capabilities, and inspects the shared budget store."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one tool call through every gate and print the decision.
    Check {
        #[arg(long, value_parser = parse_role)]
        role: AgentRole,
        #[arg(long)]
        tool: String,
        /// Tool parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
        /// Rate-limit key for the caller.
        #[arg(long, default_value = "anonymous")]
        client: String,
    },
    /// Print today's spend against each role's ceilings.
    Budget {
        #[arg(long, value_parser = parse_role)]
        role: Option<AgentRole>,
    },
    /// Delete budget records older than the retention window.
    Prune {
        /// Overrides the configured retention.
        #[arg(long)]
        keep_days: Option<u32>,
    },
    /// Run the reference scenarios against an in-memory pipeline.
    Scenarios,
}

fn parse_role(s: &str) -> Result<AgentRole, String> {
    s.parse::<AgentRole>().map_err(|e| e.to_string())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // RUST_LOG=debug for gate-by-gate output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Check {
            role,
            tool,
            params,
            client,
        } => run_check(role, &tool, &params, &client),
        Command::Budget { role } => run_budget(role).map(|()| 0),
        Command::Prune { keep_days } => run_prune(keep_days).map(|()| 0),
        Command::Scenarios => run_scenarios(),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("warden: {}", e);
            std::process::exit(1);
        }
    }
}

fn load() -> WardenResult<Warden> {
    WardenBuilder::new(WardenConfig::from_env()?).build()
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn run_check(role: AgentRole, tool: &str, params: &str, client: &str) -> WardenResult<i32> {
    let params: serde_json::Value =
        serde_json::from_str(params).map_err(|e| WardenError::ValidationFailed {
            field: "params".to_string(),
            reason: format!("not valid JSON: {}", e),
            kind: ValidationKind::Malformed,
        })?;

    let warden = load()?;
    let decision = warden
        .pipeline()
        .check(&ToolRequest::new(role, client, tool, params));

    let rendered = serde_json::to_string_pretty(&decision).map_err(|e| WardenError::Internal {
        reason: format!("failed to render decision: {}", e),
    })?;
    println!("{}", rendered);

    Ok(if decision.allow { 0 } else { EXIT_DENIED })
}

fn run_budget(role: Option<AgentRole>) -> WardenResult<()> {
    let warden = load()?;
    let summaries = match role {
        Some(role) => vec![warden.budget().summary(role)?],
        None => warden.budget().all_summaries()?,
    };

    println!(
        "{:<10} {:>9} {:>9} {:>6}   {:>9} {:>9} {:>4}",
        "role", "api $", "limit $", "calls", "native", "limit", "txs"
    );
    for summary in &summaries {
        print_summary(summary);
    }
    Ok(())
}

fn print_summary(summary: &BudgetSummary) {
    let record = &summary.record;
    let limits = &summary.limits;
    println!(
        "{:<10} {:>9.4} {:>9.2} {:>6}   {:>9.4} {:>9.3} {:>4}{}",
        record.role.as_str(),
        record.api_cost_usd(),
        micros_to_usd(limits.max_api_cost_micros),
        record.api_calls,
        record.native_spent(),
        lamports_to_native(limits.max_native_lamports),
        record.on_chain_tx_count,
        if summary.is_exhausted() { "  EXHAUSTED" } else { "" }
    );
}

fn run_prune(keep_days: Option<u32>) -> WardenResult<()> {
    let warden = load()?;
    let pruned = match keep_days {
        Some(days) => warden.budget().prune_old_records(days)?,
        None => warden.budget().prune_expired()?,
    };
    println!("Pruned {} budget record(s).", pruned);
    Ok(())
}

fn run_scenarios() -> WardenResult<i32> {
    let reports = scenarios::run_all()?;

    println!();
    println!("Warden reference scenarios");
    println!("==========================");
    println!();
    for report in &reports {
        println!("=== {} ===", report.name);
        for line in &report.lines {
            println!("  {}", line);
        }
        println!(
            "  RESULT: {}",
            if report.passed { "SUCCESS" } else { "FAILURE" }
        );
        println!();
    }

    Ok(if reports.iter().all(|r| r.passed) { 0 } else { 1 })
}
