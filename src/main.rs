use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, bail, eyre};
use std::fs;
use std::path::PathBuf;
use taskdeck::config::Config;
use taskdeck::models::{DAY_MS, day_before};
use taskdeck::{
    CategoryPatch, NewAttachment, NewCategory, NewCollaborator, NewTag, NewTask, Outcome, Priority, Store, Task,
    TaskPatch, TaskStatus,
};

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "taskdeck - tasks, categories, tags and collaborators from the terminal")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the config file (default: <config dir>/taskdeck/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the store directory (overrides the config file)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a task
    Add {
        title: String,

        /// Due date: YYYY-MM-DD or "YYYY-MM-DD HH:MM" (local time)
        #[arg(long)]
        due: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: Priority,

        /// Category name or id
        #[arg(long)]
        category: Option<String>,

        /// Tag name or id (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Add a reminder one day before the due date
        #[arg(long)]
        remind: bool,
    },

    /// List tasks, optionally filtered
    List {
        #[arg(long)]
        status: Option<TaskStatus>,

        #[arg(long)]
        priority: Option<Priority>,

        /// Category name or id
        #[arg(long)]
        category: Option<String>,

        /// Tag name or id
        #[arg(long)]
        tag: Option<String>,

        /// Only tasks due on this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show one task in detail
    Show { id: String },

    /// Change fields of a task
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        due: Option<String>,

        #[arg(long)]
        priority: Option<Priority>,

        #[arg(long)]
        status: Option<TaskStatus>,

        #[arg(long)]
        progress: Option<i64>,

        /// Category name or id; empty string clears it
        #[arg(long)]
        category: Option<String>,
    },

    /// Mark a task completed
    Done { id: String },

    /// Delete a task
    Delete { id: String },

    /// Unfinished tasks past their due date
    Overdue,

    /// Unfinished tasks due within the next days
    Upcoming {
        /// Window in days (default from config)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Completion summary
    Progress,

    /// Tasks with collaborators
    Shared,

    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },

    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommand,
    },

    /// Manage collaborators
    Collaborator {
        #[command(subcommand)]
        command: CollaboratorCommand,
    },

    /// Attach a file reference to a task
    Attach {
        task_id: String,
        name: String,
        uri: String,

        /// MIME type
        #[arg(long, default_value = "application/octet-stream")]
        kind: String,
    },

    /// Remove an attachment from a task
    Detach { task_id: String, attachment_id: String },

    /// Write all data as JSON (stdout when no path is given)
    Export { path: Option<PathBuf> },

    /// Replace all data with an exported JSON file
    Import { path: PathBuf },

    /// Delete all tasks, categories, tags, collaborators and settings
    Clear {
        /// Confirm
        #[arg(long)]
        yes: bool,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Subcommand)]
enum CategoryCommand {
    Add {
        name: String,
        #[arg(long, default_value = "#4361EE")]
        color: String,
    },
    List,
    Rename {
        category: String,
        name: String,
    },
    Delete {
        category: String,
    },
}

#[derive(Subcommand)]
enum TagCommand {
    Add { name: String },
    List,
    Delete { tag: String },
}

#[derive(Subcommand)]
enum CollaboratorCommand {
    Add {
        name: String,
        email: String,
        #[arg(long)]
        avatar: Option<String>,
    },
    List,
    /// Put a collaborator on a task
    Assign { task_id: String, collaborator_id: String },
    /// Take a collaborator off a task
    Remove { task_id: String, collaborator_id: String },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    /// e.g. `settings set notifications.daily_summary on`
    Set { name: String, value: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(store_path) = cli.store_path {
        config.store_path = store_path;
    }

    // Open store
    let mut store = Store::open(config.open_storage()?);
    if store.is_fresh() && config.seed_defaults {
        store.seed_defaults();
    }
    if store.is_read_only() {
        eprintln!(
            "{}",
            "Stored data could not be read safely; changes this run will not be saved".yellow()
        );
    }

    run(&mut store, &config, cli.command)
}

fn run(store: &mut Store, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            title,
            due,
            description,
            priority,
            category,
            tags,
            remind,
        } => {
            let due_date = parse_due(&due)?;
            let category_id = match category {
                Some(category) => resolve_category(store, &category)?,
                None => String::new(),
            };
            let tags = tags
                .iter()
                .map(|tag| resolve_tag(store, tag))
                .collect::<Result<Vec<_>>>()?;

            let id = store.add_task(NewTask {
                title,
                description,
                due_date,
                priority,
                category_id,
                tags,
                reminders: if remind {
                    vec![day_before(due_date).unwrap_or(due_date - DAY_MS)]
                } else {
                    Vec::new()
                },
                ..Default::default()
            })?;
            println!("{} {}", "Created".green(), id);
        }
        Commands::List {
            status,
            priority,
            category,
            tag,
            date,
        } => {
            // An explicit --status wins over the hide-completed setting
            let mut tasks = match status {
                Some(_) => store.tasks().to_vec(),
                None => store.visible_tasks(),
            };
            if let Some(status) = status {
                tasks = keep(tasks, &store.get_tasks_by_status(status));
            }
            if let Some(priority) = priority {
                tasks = keep(tasks, &store.get_tasks_by_priority(priority));
            }
            if let Some(category) = category {
                let category_id = resolve_category(store, &category)?;
                tasks = keep(tasks, &store.get_tasks_by_category(&category_id));
            }
            if let Some(tag) = tag {
                let tag_id = resolve_tag(store, &tag)?;
                tasks = keep(tasks, &store.get_tasks_by_tag(&tag_id));
            }
            if let Some(date) = date {
                tasks = keep(tasks, &store.get_tasks_by_date(date));
            }
            print_tasks(store, &tasks);
        }
        Commands::Show { id } => {
            let task = store
                .get_task_by_id(&id)
                .ok_or_else(|| eyre!("Task not found: {}", id))?;
            print_task_detail(store, &task);
        }
        Commands::Update {
            id,
            title,
            description,
            due,
            priority,
            status,
            progress,
            category,
        } => {
            let due_date = due.as_deref().map(parse_due).transpose()?;
            let category_id = match category {
                Some(category) if category.is_empty() => Some(String::new()),
                Some(category) => Some(resolve_category(store, &category)?),
                None => None,
            };
            let patch = TaskPatch {
                title,
                description,
                due_date,
                priority,
                status,
                progress,
                category_id,
                ..Default::default()
            };
            if patch.is_empty() {
                bail!("Nothing to update");
            }
            expect_applied(store.update_task(&id, patch), "Task", &id)?;
            println!("{} {}", "Updated".green(), id);
        }
        Commands::Done { id } => {
            expect_applied(store.update_task(&id, TaskPatch::complete()), "Task", &id)?;
            println!("{} {}", "Completed".green(), id);
        }
        Commands::Delete { id } => {
            expect_applied(store.delete_task(&id), "Task", &id)?;
            println!("{} {}", "Deleted".green(), id);
        }
        Commands::Overdue => print_tasks(store, &store.get_overdue_tasks()),
        Commands::Upcoming { days } => {
            let days = days.unwrap_or(config.upcoming_days);
            print_tasks(store, &store.get_upcoming_tasks(days));
        }
        Commands::Progress => {
            let progress = store.get_task_progress();
            println!(
                "{}/{} tasks completed ({}%)",
                progress.completed, progress.total, progress.percent()
            );
            println!(
                "{} overdue, {} due in the next {} days",
                store.get_overdue_tasks().len(),
                store.get_upcoming_tasks(config.upcoming_days).len(),
                config.upcoming_days
            );
        }
        Commands::Shared => print_tasks(store, &store.get_shared_tasks()),
        Commands::Category { command } => run_category(store, command)?,
        Commands::Tag { command } => run_tag(store, command)?,
        Commands::Collaborator { command } => run_collaborator(store, command)?,
        Commands::Attach {
            task_id,
            name,
            uri,
            kind,
        } => {
            let attachment_id = store
                .add_attachment(&task_id, NewAttachment { name, kind, uri })
                .ok_or_else(|| eyre!("Task not found: {}", task_id))?;
            println!("{} {}", "Attached".green(), attachment_id);
        }
        Commands::Detach {
            task_id,
            attachment_id,
        } => {
            expect_applied(
                store.delete_attachment(&task_id, &attachment_id),
                "Attachment",
                &attachment_id,
            )?;
            println!("{} {}", "Removed".green(), attachment_id);
        }
        Commands::Export { path } => {
            let json = store.export_json()?;
            match path {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
                    println!("{} {}", "Exported to".green(), path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Import { path } => {
            let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
            store.import_json(&text)?;
            println!("{} {} tasks", "Imported".green(), store.tasks().len());
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("This deletes all data; pass --yes to confirm");
            }
            store.clear();
            println!("{}", "All data cleared".yellow());
        }
        Commands::Settings { command } => match command {
            SettingsCommand::Show => {
                let yaml = serde_yaml::to_string(store.settings()).context("Failed to render settings")?;
                print!("{}", yaml);
            }
            SettingsCommand::Set { name, value } => {
                store.update_settings(|settings| settings.set(&name, &value))?;
                println!("{} {} = {}", "Set".green(), name, value);
            }
        },
    }

    Ok(())
}

fn run_category(store: &mut Store, command: CategoryCommand) -> Result<()> {
    match command {
        CategoryCommand::Add { name, color } => {
            let id = store.add_category(NewCategory { name, color });
            println!("{} {}", "Created".green(), id);
        }
        CategoryCommand::List => {
            for category in store.categories() {
                let count = store.get_tasks_by_category(&category.id).len();
                println!("{}  {} ({})  {} tasks", category.id.dimmed(), category.name.bold(), category.color, count);
            }
        }
        CategoryCommand::Rename { category, name } => {
            let id = resolve_category(store, &category)?;
            let patch = CategoryPatch {
                name: Some(name),
                color: None,
            };
            expect_applied(store.update_category(&id, patch), "Category", &id)?;
            println!("{} {}", "Renamed".green(), id);
        }
        CategoryCommand::Delete { category } => {
            let id = resolve_category(store, &category)?;
            expect_applied(store.delete_category(&id), "Category", &id)?;
            println!("{} {}", "Deleted".green(), id);
        }
    }
    Ok(())
}

fn run_tag(store: &mut Store, command: TagCommand) -> Result<()> {
    match command {
        TagCommand::Add { name } => {
            let id = store.add_tag(NewTag { name });
            println!("{} {}", "Created".green(), id);
        }
        TagCommand::List => {
            for tag in store.tags() {
                let count = store.get_tasks_by_tag(&tag.id).len();
                println!("{}  #{}  {} tasks", tag.id.dimmed(), tag.name.bold(), count);
            }
        }
        TagCommand::Delete { tag } => {
            let id = resolve_tag(store, &tag)?;
            expect_applied(store.delete_tag(&id), "Tag", &id)?;
            println!("{} {}", "Deleted".green(), id);
        }
    }
    Ok(())
}

fn run_collaborator(store: &mut Store, command: CollaboratorCommand) -> Result<()> {
    match command {
        CollaboratorCommand::Add { name, email, avatar } => {
            let id = store.add_collaborator(NewCollaborator { name, email, avatar });
            println!("{} {}", "Created".green(), id);
        }
        CollaboratorCommand::List => {
            for collaborator in store.collaborators() {
                println!(
                    "{}  {} <{}>",
                    collaborator.id.dimmed(),
                    collaborator.name.bold(),
                    collaborator.email
                );
            }
        }
        CollaboratorCommand::Assign {
            task_id,
            collaborator_id,
        } => {
            if store.get_collaborator_by_id(&collaborator_id).is_none() {
                bail!("Collaborator not found: {}", collaborator_id);
            }
            expect_applied(store.assign_collaborator(&task_id, &collaborator_id), "Task", &task_id)?;
            println!("{} {}", "Assigned".green(), collaborator_id);
        }
        CollaboratorCommand::Remove {
            task_id,
            collaborator_id,
        } => {
            expect_applied(
                store.remove_collaborator(&task_id, &collaborator_id),
                "Collaborator on task",
                &collaborator_id,
            )?;
            println!("{} {}", "Removed".green(), collaborator_id);
        }
    }
    Ok(())
}

fn expect_applied(outcome: Outcome, what: &str, id: &str) -> Result<()> {
    match outcome {
        Outcome::Applied => Ok(()),
        Outcome::NotFound => Err(eyre!("{} not found: {}", what, id)),
    }
}

/// Keep the tasks of `tasks` that also appear in `matching`, preserving order
fn keep(tasks: Vec<Task>, matching: &[Task]) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| matching.iter().any(|m| m.id == task.id))
        .collect()
}

/// Match a category by id, then by case-insensitive name
fn resolve_category(store: &Store, key: &str) -> Result<String> {
    store
        .categories()
        .iter()
        .find(|c| c.id == key)
        .or_else(|| store.categories().iter().find(|c| c.name.eq_ignore_ascii_case(key)))
        .map(|c| c.id.clone())
        .ok_or_else(|| eyre!("Category not found: {}", key))
}

/// Match a tag by id, then by case-insensitive name
fn resolve_tag(store: &Store, key: &str) -> Result<String> {
    store
        .tags()
        .iter()
        .find(|t| t.id == key)
        .or_else(|| store.tags().iter().find(|t| t.name.eq_ignore_ascii_case(key)))
        .map(|t| t.id.clone())
        .ok_or_else(|| eyre!("Tag not found: {}", key))
}

/// Parse a local due date. A bare date means the end of that day.
fn parse_due(text: &str) -> Result<i64> {
    let naive = match NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M") {
        Ok(dt) => dt,
        Err(_) => {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .with_context(|| format!("Invalid due date: {} (expected YYYY-MM-DD [HH:MM])", text))?;
            let end_of_day = NaiveTime::from_hms_opt(23, 59, 0).ok_or_else(|| eyre!("invalid time"))?;
            date.and_time(end_of_day)
        }
    };

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| eyre!("Due date does not exist in local time: {}", text))
}

fn format_ms(ms: i64) -> String {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn print_tasks(store: &Store, tasks: &[Task]) {
    if tasks.is_empty() {
        println!("{}", "No tasks".dimmed());
        return;
    }

    let now = taskdeck::now_ms();
    for task in tasks {
        let status = match task.status {
            TaskStatus::Completed => "done".green(),
            TaskStatus::InProgress => "doing".yellow(),
            TaskStatus::Pending => "todo".normal(),
        };
        let due = if task.is_overdue(now) {
            format_ms(task.due_date).red()
        } else {
            format_ms(task.due_date).normal()
        };
        let priority = match task.priority {
            Priority::High => "high".red(),
            Priority::Medium => "medium".yellow(),
            Priority::Low => "low".normal(),
        };
        let category = store
            .get_category_by_id(&task.category_id)
            .map(|c| c.name)
            .unwrap_or_default();

        println!(
            "[{:>5}] {}  {}  {:<6}  {:>3}%  {}  {}",
            status,
            task.title.bold(),
            due,
            priority,
            task.progress,
            category.cyan(),
            task.id.dimmed()
        );
    }
}

fn print_task_detail(store: &Store, task: &Task) {
    println!("{}", task.title.bold());
    println!("  id:          {}", task.id);
    if !task.description.is_empty() {
        println!("  description: {}", task.description);
    }
    println!("  due:         {}", format_ms(task.due_date));
    println!("  status:      {}", task.status);
    println!("  priority:    {}", task.priority);
    println!("  progress:    {}%", task.progress);

    if let Some(category) = store.get_category_by_id(&task.category_id) {
        println!("  category:    {}", category.name);
    }

    if !task.tags.is_empty() {
        let names: Vec<String> = task
            .tags
            .iter()
            .map(|id| store.get_tag_by_id(id).map(|t| format!("#{}", t.name)).unwrap_or_else(|| id.clone()))
            .collect();
        println!("  tags:        {}", names.join(" "));
    }

    for id in &task.collaborators {
        match store.get_collaborator_by_id(id) {
            Some(c) => println!("  shared with: {} <{}>", c.name, c.email),
            None => println!("  shared with: {} {}", id, "(unknown)".dimmed()),
        }
    }

    for attachment in &task.attachments {
        println!(
            "  attachment:  {} ({}) {}  {}",
            attachment.name,
            attachment.kind,
            attachment.uri,
            attachment.id.dimmed()
        );
    }

    for reminder in &task.reminders {
        println!("  reminder:    {}", format_ms(*reminder));
    }

    println!("  created:     {}", format_ms(task.created_at));
    println!("  updated:     {}", format_ms(task.updated_at));
}
