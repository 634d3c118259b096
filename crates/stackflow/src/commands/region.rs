use super::{print_resources, print_variables};
use crate::RegionCommands;
use crate::session::{Context, Session};
use colored::Colorize;
use stackflow_pipeline::{RegionRemoveRequest, RegionRequest};

pub async fn handle(cmd: RegionCommands, ctx: &Context) -> anyhow::Result<()> {
    let mut session = Session::open(ctx, ctx.project_root()?).await?;

    match cmd {
        RegionCommands::Create { region, stage } => {
            let request =
                RegionRequest::new(ctx.stage(stage), region).with_no_exe_cf(ctx.no_exe_cf);
            let result = session.pipeline.region_create(request).await;
            session.close().await?;
            let event = result?;

            println!(
                "{} region {} created in stage {}",
                "✓".green(),
                event.data.region.cyan(),
                event.data.stage.cyan()
            );
            print_resources(&event.data.resources);
            println!();
            print_variables(&event.data.variables);
        }
        RegionCommands::Remove {
            region,
            stage,
            with_resources,
        } => {
            let request = RegionRemoveRequest::new(ctx.stage(stage), region)
                .with_no_exe_cf(ctx.no_exe_cf)
                .with_remove_resources(with_resources);
            let result = session.pipeline.region_remove(request).await;
            session.close().await?;
            let event = result?;

            if let Some(resources) = &event.data.resources {
                println!("{} stack {} removed", "✓".green(), resources.stack_name.cyan());
            }
            println!(
                "{} region {} removed from stage {}",
                "✓".green(),
                event.data.region.cyan(),
                event.data.stage.cyan()
            );
        }
    }
    Ok(())
}
