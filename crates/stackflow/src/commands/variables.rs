use super::print_variables;
use crate::VariablesCommands;
use crate::session::Context;
use anyhow::Context as _;
use stackflow_core::ProjectStore;

pub async fn handle(cmd: VariablesCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        VariablesCommands::List {
            stage,
            region,
            json,
        } => {
            let store = ProjectStore::new(ctx.project_root()?);
            let project = store
                .load()
                .await?
                .context("no project here; run `stackflow project init` first")?;

            let variables = match &stage {
                Some(stage) => project
                    .scoped_variables(stage, region.as_deref())?
                    .flatten(),
                None => project.variables().clone(),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&variables)?);
            } else {
                print_variables(&variables);
            }
        }
    }
    Ok(())
}
