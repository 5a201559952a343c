//! What the widget would show right now.

use crate::common::{item_line, open_planner, refresh_and_prompt, runtime, CliResult};

pub fn run(json: bool) -> CliResult {
    let mut planner = open_planner()?;
    refresh_and_prompt(&mut planner, &runtime()?);
    let snapshot = planner.widget_snapshot()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let range = planner.config().windows.range(snapshot.category);
    println!(
        "{} ({}-{}), {} open",
        snapshot.category, range.start, range.end, snapshot.open_count
    );
    for item in &snapshot.items {
        println!("{}", item_line(item));
    }
    let hidden = snapshot.open_count.saturating_sub(snapshot.items.iter().filter(|i| !i.is_done()).count());
    if hidden > 0 {
        println!("... and {hidden} more");
    }
    Ok(())
}
