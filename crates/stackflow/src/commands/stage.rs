use super::{print_resources, print_variables};
use crate::StageCommands;
use crate::session::{Context, Session};
use colored::Colorize;
use stackflow_pipeline::{RegionRequest, StageRemoveRequest};

pub async fn handle(cmd: StageCommands, ctx: &Context) -> anyhow::Result<()> {
    let mut session = Session::open(ctx, ctx.project_root()?).await?;

    match cmd {
        StageCommands::Create { stage, region } => {
            let request =
                RegionRequest::new(stage, ctx.region(region)).with_no_exe_cf(ctx.no_exe_cf);
            let result = session.pipeline.stage_create(request).await;
            session.close().await?;
            let event = result?;

            println!(
                "{} stage {} created with region {}",
                "✓".green(),
                event.data.stage.cyan(),
                event.data.region.cyan()
            );
            print_resources(&event.data.resources);
            println!();
            print_variables(&event.data.variables);
        }
        StageCommands::Remove { stage } => {
            let request = StageRemoveRequest::new(stage).with_no_exe_cf(ctx.no_exe_cf);
            let result = session.pipeline.stage_remove(request).await;
            session.close().await?;
            let event = result?;

            println!("{} stage {} removed", "✓".green(), event.data.stage.cyan());
        }
    }
    Ok(())
}
