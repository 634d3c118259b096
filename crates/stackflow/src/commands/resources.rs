use super::print_resources;
use crate::ResourcesCommands;
use crate::session::{Context, Session};
use colored::Colorize;
use stackflow_pipeline::RegionRequest;

pub async fn handle(cmd: ResourcesCommands, ctx: &Context) -> anyhow::Result<()> {
    let mut session = Session::open(ctx, ctx.project_root()?).await?;

    match cmd {
        ResourcesCommands::Deploy { stage, region } => {
            let request = RegionRequest::new(ctx.stage(stage), ctx.region(region))
                .with_no_exe_cf(ctx.no_exe_cf);
            println!(
                "{}",
                format!("Deploying resources for {}/{}...", request.stage, request.region).blue()
            );
            let result = session.pipeline.resources_deploy(request).await;
            session.close().await?;
            let event = result?;

            println!("{} resources deployed", "✓".green());
            print_resources(&event.data);
            if !event.data.executed() {
                println!();
                println!("{}", event.data.template);
            }
        }
        ResourcesCommands::Remove { stage, region } => {
            let request = RegionRequest::new(ctx.stage(stage), ctx.region(region))
                .with_no_exe_cf(ctx.no_exe_cf);
            let result = session.pipeline.resources_remove(request).await;
            session.close().await?;
            let event = result?;

            if event.data.removed {
                println!("{} stack {} removed", "✓".green(), event.data.stack_name.cyan());
            } else {
                println!("  stack {} was not present", event.data.stack_name.yellow());
            }
        }
    }
    Ok(())
}
