//! vd - pattern-based task scheduling from the command line.
//!
//! Usage:
//!   vd validate <tasks.yaml>             Check a task document
//!   vd list <tasks.yaml>                 List tasks and their attributes
//!   vd build <tasks.yaml> --from <t>     Build a schedule window
//!   vd export <tasks.yaml> --from <t>    Build and emit iCalendar

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::error;

use virtualdate::{export_ical, ConfigError, ScheduledInstance, Scheduler, YamlLoader};

/// vd - pattern-based task scheduling
#[derive(Parser)]
#[command(name = "vd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a task document without scheduling
    Validate {
        /// Path to the task YAML file
        #[arg(value_name = "TASKS_FILE")]
        file: PathBuf,
    },

    /// List the tasks in a document
    List {
        /// Path to the task YAML file
        #[arg(value_name = "TASKS_FILE")]
        file: PathBuf,
    },

    /// Build a schedule for a window and print the placements
    Build {
        /// Path to the task YAML file
        #[arg(value_name = "TASKS_FILE")]
        file: PathBuf,

        /// Window start (RFC 3339)
        #[arg(long)]
        from: DateTime<Utc>,

        /// Window end (RFC 3339); defaults to one day past the start
        #[arg(long)]
        to: Option<DateTime<Utc>>,

        /// Print each placement's explanation trace
        #[arg(long)]
        explain: bool,
    },

    /// Build a schedule and emit it as iCalendar
    Export {
        /// Path to the task YAML file
        #[arg(value_name = "TASKS_FILE")]
        file: PathBuf,

        /// Window start (RFC 3339)
        #[arg(long)]
        from: DateTime<Utc>,

        /// Window end (RFC 3339); defaults to one day past the start
        #[arg(long)]
        to: Option<DateTime<Utc>>,

        /// Calendar name for X-WR-CALNAME
        #[arg(long, default_value = "virtualdate")]
        name: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => validate(file),
        Commands::List { file } => list(file),
        Commands::Build {
            file,
            from,
            to,
            explain,
        } => build(file, from, to.unwrap_or(from + Duration::days(1)), explain),
        Commands::Export {
            file,
            from,
            to,
            name,
        } => export(file, from, to.unwrap_or(from + Duration::days(1)), name),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn validate(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match YamlLoader::load_tasks(&file) {
        Ok(tasks) => {
            println!("{}: {} task(s), all valid", file.display(), tasks.len());
            Ok(())
        }
        Err(ConfigError::Validation(issues)) => {
            for issue in &issues {
                eprintln!("{}:{}", file.display(), issue);
            }
            Err(format!("{} validation error(s)", issues.len()).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn list(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let tasks = YamlLoader::load_tasks(&file)?;

    if tasks.is_empty() {
        println!("No tasks in {}", file.display());
        return Ok(());
    }

    println!("Tasks in {}:", file.display());
    println!();
    for task in &tasks {
        println!("ID: {}", task.id);
        println!("  Due patterns: {}", task.due.len());
        println!("  Omit patterns: {}", task.omit.len());
        println!("  Duration: {}s", task.duration.num_seconds());
        if task.parallel > 1 {
            println!("  Parallel: {}", task.parallel);
        }
        if task.priority != 0 {
            println!("  Priority: {}", task.priority);
        }
        if task.fixed {
            println!("  Fixed: yes");
        }
        if !task.flags.is_empty() {
            let flags: Vec<&str> = task.flags.iter().map(String::as_str).collect();
            println!("  Flags: {}", flags.join(", "));
        }
        if !task.depends_on.is_empty() {
            println!("  Depends on: {}", task.depends_on.join(", "));
        }
        println!();
    }
    Ok(())
}

fn build(
    file: PathBuf,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    explain: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let tasks = YamlLoader::load_tasks(&file)?;
    let scheduler = Scheduler::with_tasks(tasks);
    let schedule = scheduler.build(from, to)?;

    if schedule.is_empty() {
        println!("No placements in [{}, {})", from.to_rfc3339(), to.to_rfc3339());
        return Ok(());
    }

    for instance in &schedule {
        print_instance(instance, explain);
    }
    Ok(())
}

fn print_instance(instance: &ScheduledInstance<'_>, explain: bool) {
    println!(
        "{}  {} .. {}",
        instance.task.id,
        instance.start.to_rfc3339(),
        instance.finish.to_rfc3339()
    );
    if explain {
        for line in instance.explanation.lines() {
            println!("    {}", line);
        }
    }
}

fn export(
    file: PathBuf,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    name: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let tasks = YamlLoader::load_tasks(&file)?;
    let scheduler = Scheduler::with_tasks(tasks);
    let schedule = scheduler.build(from, to)?;
    print!("{}", export_ical(&name, &schedule));
    Ok(())
}
