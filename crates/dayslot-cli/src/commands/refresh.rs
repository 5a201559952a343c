use crate::common::{open_planner, refresh_and_prompt, runtime, CliResult};

pub fn run(json: bool) -> CliResult {
    let mut planner = open_planner()?;
    let report = refresh_and_prompt(&mut planner, &runtime()?);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in report.lines() {
            println!("{line}");
        }
    }
    Ok(())
}
