pub mod project;
pub mod region;
pub mod resources;
pub mod stage;
pub mod variables;

use colored::Colorize;
use stackflow_core::Variables;
use stackflow_pipeline::ResourcesDeployData;

pub fn print_variables(variables: &Variables) {
    let width = variables.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in variables.iter() {
        println!("  {:width$}  {}", key.cyan(), value);
    }
}

pub fn print_resources(data: &ResourcesDeployData) {
    match (&data.stack_id, data.change) {
        (Some(stack_id), Some(change)) => {
            println!("  stack:  {} ({})", data.stack_name.cyan(), change);
            println!("  id:     {}", stack_id);
            for (key, value) in &data.outputs {
                println!("  {}: {}", key.cyan(), value);
            }
        }
        _ => println!(
            "  stack:  {} {}",
            data.stack_name.cyan(),
            "(not executed)".dimmed()
        ),
    }
}
