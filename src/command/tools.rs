use anyhow::Result;

use crate::runtime::Runtime;

pub async fn run_tools(runtime: &Runtime, json: bool) -> Result<()> {
    let tools = runtime.list_tools();
    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    let width = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for tool in &tools {
        let mut flags = Vec::new();
        if tool.requires_project {
            flags.push("workspace");
        }
        if tool.creates_checkpoint {
            flags.push("checkpoint");
        }
        let first_line = tool.description.lines().next().unwrap_or_default();
        if flags.is_empty() {
            println!("  {:<width$}  {}", tool.name, first_line, width = width);
        } else {
            println!(
                "  {:<width$}  {} [{}]",
                tool.name,
                first_line,
                flags.join(", "),
                width = width
            );
        }
    }
    println!("\n{} tools", tools.len());
    Ok(())
}
