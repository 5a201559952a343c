//! Item commands for CLI.

use clap::Subcommand;
use dayslot_core::{Category, Direction, Item, Kind};

use crate::common::{
    open_planner, print_items, refresh_and_prompt, resolve_id, runtime, status_label, CliResult,
};

#[derive(Subcommand)]
pub enum ItemAction {
    /// Add an item
    Add {
        /// Item title
        title: String,
        /// must_do or want_to (default: must_do)
        #[arg(long, default_value = "must_do")]
        kind: Kind,
        /// morning, daytime, evening or night; backlog when omitted
        #[arg(long)]
        category: Option<Category>,
        /// Free-form note
        #[arg(long)]
        memo: Option<String>,
        /// Also create a linked reminder
        #[arg(long)]
        reminder: bool,
    },
    /// List today's items
    List {
        /// Only this category
        #[arg(long, conflicts_with = "backlog")]
        category: Option<Category>,
        /// Only uncategorized items
        #[arg(long)]
        backlog: bool,
        /// Only this kind
        #[arg(long)]
        kind: Option<Kind>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one item as JSON
    Show {
        /// Item ID or unique prefix
        id: String,
    },
    /// Edit an item
    Update {
        /// Item ID or unique prefix
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New memo; empty clears it
        #[arg(long)]
        memo: Option<String>,
        /// New kind
        #[arg(long)]
        kind: Option<Kind>,
    },
    /// Delete an item and its reminder
    Delete {
        /// Item ID or unique prefix
        id: String,
    },
    /// Advance the status: not started, in progress, done
    Status {
        /// Item ID or unique prefix
        id: String,
    },
    /// Move to a category
    Move {
        /// Item ID or unique prefix
        id: String,
        /// Target category
        category: Category,
    },
    /// Move to the following category
    Next {
        /// Item ID or unique prefix
        id: String,
    },
    /// Move to the preceding category
    Prev {
        /// Item ID or unique prefix
        id: String,
    },
}

pub fn run(action: ItemAction) -> CliResult {
    let mut planner = open_planner()?;
    let rt = runtime()?;

    match action {
        ItemAction::Add {
            title,
            kind,
            category,
            memo,
            reminder,
        } => {
            let draft = Item::new(title, kind, planner.now())
                .with_category(category)
                .with_memo(memo);
            let id = rt.block_on(planner.add_item(draft, reminder))?;
            println!("Item created: {id}");
            if reminder && planner.get(&id)?.reminder_id.is_none() {
                eprintln!("warning: reminder not created");
            }
        }
        ItemAction::List {
            category,
            backlog,
            kind,
            json,
        } => {
            refresh_and_prompt(&mut planner, &rt);
            let items = match (category, backlog) {
                (Some(category), _) => planner.items_for_category(category, kind)?,
                (None, true) => planner.uncategorized(kind),
                (None, false) => planner
                    .today_items()?
                    .into_iter()
                    .filter(|i| kind.map_or(true, |k| i.kind == k))
                    .collect(),
            };
            print_items(&items, json)?;
        }
        ItemAction::Show { id } => {
            let id = resolve_id(&planner, &id)?;
            println!("{}", serde_json::to_string_pretty(planner.get(&id)?)?);
        }
        ItemAction::Update {
            id,
            title,
            memo,
            kind,
        } => {
            let id = resolve_id(&planner, &id)?;
            let mut item = planner.get(&id)?.clone();
            if let Some(title) = title {
                item.title = title;
            }
            if let Some(memo) = memo {
                item.memo = (!memo.is_empty()).then_some(memo);
            }
            if let Some(kind) = kind {
                item.kind = kind;
            }
            rt.block_on(planner.update_item(item))?;
            println!("Item updated: {id}");
        }
        ItemAction::Delete { id } => {
            let id = resolve_id(&planner, &id)?;
            let removed = rt.block_on(planner.delete_item(&id))?;
            println!("Item deleted: {} ({})", removed.id, removed.title);
        }
        ItemAction::Status { id } => {
            let id = resolve_id(&planner, &id)?;
            let status = rt.block_on(planner.set_status(&id))?;
            println!("{}", status_label(status));
        }
        ItemAction::Move { id, category } => {
            let id = resolve_id(&planner, &id)?;
            let item = rt.block_on(planner.move_category(&id, category))?;
            println!("Item moved to {}", category_label(item.category));
        }
        ItemAction::Next { id } => move_adjacent(&mut planner, &rt, &id, Direction::Next)?,
        ItemAction::Prev { id } => move_adjacent(&mut planner, &rt, &id, Direction::Previous)?,
    }
    Ok(())
}

fn move_adjacent(
    planner: &mut dayslot_core::DayPlanner,
    rt: &tokio::runtime::Runtime,
    id: &str,
    direction: Direction,
) -> CliResult {
    let id = resolve_id(planner, id)?;
    match rt.block_on(planner.move_to_adjacent(&id, direction))? {
        Some(item) => println!("Item moved to {}", category_label(item.category)),
        None => println!("Item not moved"),
    }
    Ok(())
}

fn category_label(category: Option<Category>) -> &'static str {
    category.map_or("backlog", |c| c.as_str())
}
