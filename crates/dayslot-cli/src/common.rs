//! Planner bootstrap and output helpers shared by the commands.

use std::sync::Arc;

use tokio::runtime::Runtime;

use dayslot_core::storage::data_dir;
use dayslot_core::{
    Config, Database, DayPlanner, Item, JsonFileSource, Kind, LinkKind, RefreshReport, Status,
    SystemClock,
};
use tracing::debug;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Single-threaded runtime for one command.
pub fn runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// The file-backed source for `kind`, at the path the config names.
pub fn source_for(config: &Config, kind: LinkKind) -> CliResult<JsonFileSource> {
    let dir = data_dir()?;
    let path = match kind {
        LinkKind::Calendar => config.sync.calendar_path(&dir),
        LinkKind::Reminder => config.sync.reminders_path(&dir),
    };
    Ok(JsonFileSource::new(kind, path))
}

pub fn open_planner() -> CliResult<DayPlanner> {
    let config = Config::load()?;
    let db = Database::open()?;
    debug!(data_dir = %data_dir()?.display(), "planner opened");
    let calendar = source_for(&config, LinkKind::Calendar)?;
    let reminders = source_for(&config, LinkKind::Reminder)?;
    Ok(DayPlanner::new(
        db,
        config,
        Arc::new(SystemClock),
        Box::new(calendar),
        Box::new(reminders),
    ))
}

/// Refresh the planner, then tell the user once about any source that
/// refused access.
pub fn refresh_and_prompt(planner: &mut DayPlanner, rt: &Runtime) -> RefreshReport {
    let report = rt.block_on(planner.refresh());
    for kind in planner.take_permission_prompts() {
        let name = match kind {
            LinkKind::Calendar => "calendar",
            LinkKind::Reminder => "reminders",
        };
        eprintln!(
            "{kind} access was refused. Check that {} is readable, then run `dayslot source reset-prompt {name}` to be told again.",
            source_path(planner.config(), kind)
        );
    }
    report
}

fn source_path(config: &Config, kind: LinkKind) -> String {
    match source_for(config, kind) {
        Ok(source) => source.path().display().to_string(),
        Err(_) => format!("the {kind} file"),
    }
}

/// Full id for an exact id or a unique prefix of one.
pub fn resolve_id(planner: &DayPlanner, needle: &str) -> CliResult<String> {
    if planner.store().get(needle).is_some() {
        return Ok(needle.to_string());
    }
    let matches: Vec<&Item> = planner
        .store()
        .items()
        .iter()
        .filter(|i| i.id.starts_with(needle))
        .collect();
    match matches.as_slice() {
        [item] => Ok(item.id.clone()),
        [] => Err(format!("no item matches '{needle}'").into()),
        _ => Err(format!("'{needle}' matches {} items", matches.len()).into()),
    }
}

pub fn status_label(status: Status) -> &'static str {
    match status {
        Status::NotStarted => "not started",
        Status::InProgress => "in progress",
        Status::Done => "done",
    }
}

/// One line per item: mark, short id, category, kind, title, extras.
pub fn item_line(item: &Item) -> String {
    let mark = match item.status {
        Status::NotStarted => "[ ]",
        Status::InProgress => "[~]",
        Status::Done => "[x]",
    };
    let kind = match item.kind {
        Kind::MustDo => "must",
        Kind::WantTo => "want",
    };
    let category = item.category.map_or("-", |c| c.as_str());
    let short: String = item.id.chars().take(8).collect();

    let mut line = format!("{mark} {short}  {category:<8} {kind}  {}", item.title);
    if let Some(at) = item.start_time {
        line.push_str(&format!("  @{}", at.format("%m-%d %H:%M")));
    }
    if item.calendar_event_id.is_some() {
        line.push_str("  (calendar)");
    }
    if item.reminder_id.is_some() {
        line.push_str("  (reminder)");
    }
    line
}

pub fn print_items(items: &[Item], json: bool) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else if items.is_empty() {
        println!("no items");
    } else {
        for item in items {
            println!("{}", item_line(item));
        }
    }
    Ok(())
}
