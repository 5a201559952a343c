//! Source file commands for CLI.
//!
//! The calendar and reminders live in JSON files in the data directory
//! (or wherever `sync.calendar_file` / `sync.reminders_file` point). These
//! commands edit them the way an outside app would, so `refresh` has
//! something to reconcile.

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Subcommand, ValueEnum};
use dayslot_core::{Anchor, Config, ExternalSource, LinkKind, WriteBack};

use crate::common::{open_planner, runtime, source_for, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceName {
    Calendar,
    Reminders,
}

impl From<SourceName> for LinkKind {
    fn from(name: SourceName) -> Self {
        match name {
            SourceName::Calendar => LinkKind::Calendar,
            SourceName::Reminders => LinkKind::Reminder,
        }
    }
}

#[derive(Subcommand)]
pub enum SourceAction {
    /// List entries
    List {
        source: SourceName,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an entry
    Add {
        source: SourceName,
        /// Entry title
        title: String,
        /// Start or due time, "YYYY-MM-DD HH:MM"
        #[arg(long, value_parser = parse_instant, conflicts_with = "date")]
        at: Option<NaiveDateTime>,
        /// Due date without a time, "YYYY-MM-DD"
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Entry notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Mark a reminder done
    Done { source: SourceName, id: String },
    /// Mark a reminder not done
    Undone { source: SourceName, id: String },
    /// Delete an entry
    Remove { source: SourceName, id: String },
    /// Show the next access refusal again
    ResetPrompt { source: SourceName },
    /// Print the file path
    Path { source: SourceName },
}

fn parse_instant(s: &str) -> Result<NaiveDateTime, String> {
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| format!("expected \"YYYY-MM-DD HH:MM\", got '{s}'"))
}

pub fn run(action: SourceAction) -> CliResult {
    let config = Config::load()?;
    let rt = runtime()?;

    match action {
        SourceAction::List { source, json } => {
            let file = source_for(&config, source.into())?;
            let entities = rt.block_on(file.list())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entities)?);
            } else if entities.is_empty() {
                println!("no entries");
            } else {
                for entity in entities {
                    let when = match entity.anchor {
                        Some(Anchor::At(at)) => at.format("%Y-%m-%d %H:%M").to_string(),
                        Some(Anchor::Date(date)) => date.format("%Y-%m-%d").to_string(),
                        None => "-".to_string(),
                    };
                    let mark = match entity.is_done {
                        Some(true) => "[x] ",
                        Some(false) => "[ ] ",
                        None => "",
                    };
                    println!("{mark}{}  {when}  {}", entity.external_id, entity.title);
                }
            }
        }
        SourceAction::Add {
            source,
            title,
            at,
            date,
            notes,
        } => {
            let file = source_for(&config, source.into())?;
            let payload = WriteBack {
                title,
                notes,
                anchor: at.map(Anchor::At).or(date.map(Anchor::Date)),
                is_done: false,
            };
            let id = rt.block_on(file.create(&payload))?;
            println!("Entry created: {id}");
        }
        SourceAction::Done { source, id } => {
            let file = source_for(&config, source.into())?;
            rt.block_on(file.set_done(&id))?;
            println!("ok");
        }
        SourceAction::Undone { source, id } => {
            let file = source_for(&config, source.into())?;
            rt.block_on(file.set_not_done(&id))?;
            println!("ok");
        }
        SourceAction::Remove { source, id } => {
            let file = source_for(&config, source.into())?;
            rt.block_on(file.delete(&id))?;
            println!("Entry deleted: {id}");
        }
        SourceAction::ResetPrompt { source } => {
            let planner = open_planner()?;
            planner.reset_permission_prompt(source.into())?;
            println!("ok");
        }
        SourceAction::Path { source } => {
            let file = source_for(&config, source.into())?;
            println!("{}", file.path().display());
        }
    }
    Ok(())
}
