use anyhow::{Context, Result};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tasktable::config::Config;
use tasktable::context::{AppContext, SharedContext, StandardContext};
use tasktable::history::History;
use tasktable::model::{
    Task, check_and_migrate, generate_diff, merge_tasks, parse_markdown_table, partition_done,
    tasks_to_markdown,
};
use tasktable::remote::FileRemote;
use tasktable::storage::LocalStorage;
use tasktable::sync::{LoadSource, SyncManager};

const BINARY_NAME: &str = "tasktable";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    // Handle help flag
    if args
        .iter()
        .any(|a| a == "--help" || a == "-h" || a == "help")
    {
        tasktable::cli::print_help(BINARY_NAME);
        return Ok(());
    }

    let mut root = None;
    if let Some(pos) = args.iter().position(|a| a == "--root" || a == "-r") {
        if pos + 1 >= args.len() {
            anyhow::bail!("--root requires a path");
        }
        root = Some(PathBuf::from(args.remove(pos + 1)));
        args.remove(pos);
    }

    let ctx: SharedContext = Arc::new(StandardContext::new(root));
    let config = Config::load_or_default(ctx.as_ref())?;
    init_logging(&config);

    let command = args.first().cloned().unwrap_or_else(|| "show".to_string());
    match command.as_str() {
        // CLI Command: tasktable diff <old> <new>
        "diff" => {
            let [old, new] = file_args::<2>(&args, "diff <old.md> <new.md>")?;
            let old = parse_markdown_table(&read_file(&old)?);
            let new = parse_markdown_table(&read_file(&new)?);
            println!("{}", generate_diff(&old, &new));
        }
        // CLI Command: tasktable merge <base|-> <local> <remote> [--json]
        "merge" => {
            let json = args.iter().any(|a| a == "--json");
            args.retain(|a| a != "--json");
            let [base, local, remote] =
                file_args::<3>(&args, "merge <base.md|-> <local.md> <remote.md>")?;
            let base = if base == "-" {
                None
            } else {
                Some(parse_markdown_table(&read_file(&base)?))
            };
            let local = parse_markdown_table(&read_file(&local)?);
            let remote = parse_markdown_table(&read_file(&remote)?);
            let result = merge_tasks(base.as_deref(), &local, &remote);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for change in &result.changes {
                    eprintln!("{}", change);
                }
                for conflict in &result.conflicts {
                    eprintln!("Conflict: {}", conflict);
                }
                print!("{}", tasks_to_markdown(&result.merged));
            }
        }
        // CLI Command: tasktable export
        "export" => {
            let tasks = LocalStorage::load(ctx.as_ref())?;
            print!("{}", tasks_to_markdown(&tasks));
        }
        // CLI Command: tasktable import <file>
        "import" => {
            let [path] = file_args::<1>(&args, "import <tasks.md>")?;
            let check = check_and_migrate(&read_file(&path)?);
            if check.tasks.is_empty() {
                anyhow::bail!("No tasks found in {}", path);
            }
            let manager = build_manager(&ctx, &config)?;
            let mut history = resume_history(&ctx, &config)?;
            let outcome = manager.save(&check.tasks).await?;
            record_history(&ctx, &mut history)?;
            println!("Imported {} tasks from {}", check.tasks.len(), path);
            report_remote(outcome.remote_saved);
            if let Some(merge) = outcome.merge {
                println!("Merged with remote changes ({} conflicts)", merge.conflicts.len());
            }
        }
        // CLI Command: tasktable sync
        "sync" => {
            let manager = build_manager(&ctx, &config)?;
            let mut history = resume_history(&ctx, &config)?;
            let report = manager.reconcile().await?;
            record_history(&ctx, &mut history)?;
            for change in &report.merge.changes {
                println!("{}", change);
            }
            for conflict in &report.merge.conflicts {
                println!("Conflict: {}", conflict);
            }
            println!(
                "{} tasks after sync ({} changes, {} conflicts)",
                report.merge.merged.len(),
                report.merge.changes.len(),
                report.merge.conflicts.len()
            );
            report_remote(report.remote_saved);
        }
        // CLI Command: tasktable undo / redo
        "undo" | "redo" => {
            let manager = build_manager(&ctx, &config)?;
            let mut history = resume_history(&ctx, &config)?;
            let state = if command == "undo" {
                history.undo()
            } else {
                history.redo()
            };
            let Some(state) = state.map(<[Task]>::to_vec) else {
                println!("Nothing to {}.", command);
                return Ok(());
            };
            let outcome = manager.save(&state).await?;
            history.save(ctx.as_ref())?;
            println!("Restored {} tasks.", state.len());
            report_remote(outcome.remote_saved);
        }
        "show" => {
            let manager = build_manager(&ctx, &config)?;
            let outcome = manager.load().await?;
            if outcome.migrated {
                println!("Note: stored table uses the old layout and will be upgraded on save.");
            }
            if outcome.source == LoadSource::LocalCache {
                println!("Note: remote unavailable, showing local copy.");
            }
            let query = args.get(1).map(String::as_str);
            print_tasks(&outcome.tasks, query);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            tasktable::cli::print_help(BINARY_NAME);
            std::process::exit(2);
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let log_config = ConfigBuilder::new()
        .set_time_level(log::LevelFilter::Off)
        .build();
    // Ignore the error if a logger is already set.
    let _ = TermLogger::init(
        config.log_level_filter(),
        log_config,
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}

fn build_manager(ctx: &SharedContext, config: &Config) -> Result<SyncManager<FileRemote>> {
    let remote_dir = config.resolve_remote_dir(ctx.as_ref())?;
    log::debug!(
        "Data dir {:?}, remote dir {:?}",
        ctx.get_data_dir()?,
        remote_dir
    );
    Ok(SyncManager::new(
        ctx.clone(),
        FileRemote::new(remote_dir)?,
        config.user_id.clone(),
    ))
}

/// Undo stack positioned at the current local copy.
fn resume_history(ctx: &SharedContext, config: &Config) -> Result<History> {
    let current = LocalStorage::load(ctx.as_ref())?;
    History::resume(ctx.as_ref(), current, config.undo_limit)
}

/// Records whatever the local copy holds after a command.
fn record_history(ctx: &SharedContext, history: &mut History) -> Result<()> {
    history.record(LocalStorage::load(ctx.as_ref())?);
    history.save(ctx.as_ref())
}

fn file_args<const N: usize>(args: &[String], usage: &str) -> Result<[String; N]> {
    let rest: Vec<String> = args.iter().skip(1).take(N).cloned().collect();
    rest.try_into()
        .map_err(|_| anyhow::anyhow!("Usage: {} {}", BINARY_NAME, usage))
}

fn read_file(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))
}

fn report_remote(saved: bool) {
    if !saved {
        println!("Remote unreachable: changes kept locally, run 'sync' later.");
    }
}

fn print_tasks(tasks: &[Task], query: Option<&str>) {
    let filtered: Vec<Task> = tasks
        .iter()
        .filter(|t| query.is_none_or(|q| t.matches(q)))
        .cloned()
        .collect();
    let (active, done) = partition_done(&filtered);

    for t in &active {
        let sub = if t.subcategory.is_empty() {
            String::new()
        } else {
            format!(" / {}", t.subcategory)
        };
        println!(
            "{:>3}. [{}{}] {} ({})",
            t.priority,
            t.category,
            sub,
            t.task.replace('\n', " "),
            t.color
        );
    }
    if !done.is_empty() {
        println!();
        println!("Done:");
        for t in &done {
            println!("     [{}] {}", t.category, t.task.replace('\n', " "));
        }
    }
}
