use super::{print_resources, print_variables};
use crate::ProjectCommands;
use crate::session::{Context, Session};
use colored::Colorize;
use stackflow_pipeline::{ProjectInitRequest, ProjectRemoveRequest, purge_project_bucket};

pub async fn handle(cmd: ProjectCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        ProjectCommands::Init {
            name,
            bucket,
            stage,
            region,
        } => {
            let stage = ctx.stage(stage);
            let region = ctx.region(region);
            println!("{}", format!("Initializing project '{name}'...").blue().bold());

            let mut request = ProjectInitRequest::new(name, bucket, stage, region)
                .with_no_exe_cf(ctx.no_exe_cf);
            if let Some(profile) = &ctx.profile {
                request = request.with_profile(profile);
            }

            let mut session = Session::open(ctx, ctx.init_root()?).await?;
            let result = session.pipeline.project_init(request).await;
            session.close().await?;
            let event = result?;

            println!(
                "{} project {} (bucket {} in {})",
                "✓".green(),
                event.data.project.cyan(),
                event.data.project_bucket,
                event.data.project_bucket_region
            );
            println!("  stage {} / region {}", event.data.stage, event.data.region);
            print_resources(&event.data.resources);
            println!();
            print_variables(&event.data.variables);
        }
        ProjectCommands::Remove { purge_bucket } => {
            let mut session = Session::open(ctx, ctx.project_root()?).await?;
            let result = session
                .pipeline
                .project_remove(ProjectRemoveRequest::new().with_no_exe_cf(ctx.no_exe_cf))
                .await;

            let purged = match &result {
                Ok(event) if purge_bucket => {
                    println!(
                        "{}",
                        format!("Purging bucket '{}'...", event.data.project.bucket()).blue()
                    );
                    purge_project_bucket(
                        &event.data.project,
                        session.pipeline.buckets(),
                        ctx.no_exe_cf,
                    )
                    .await
                }
                _ => Ok(false),
            };
            session.close().await?;
            let event = result?;

            println!("{} project {} removed", "✓".green(), event.data.project.name().cyan());
            if purged? {
                println!("{} bucket {} deleted", "✓".green(), event.data.project.bucket());
            } else {
                println!(
                    "  bucket {} was kept",
                    event.data.project.bucket().yellow()
                );
            }
        }
    }
    Ok(())
}
