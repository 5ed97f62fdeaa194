//! Build command - assemble contexts and build role images

use super::PipelineArgs;
use rolezel::{DockerCliBackend, RoleImageBuilder};
use std::sync::Arc;
use tracing::info;

/// Run the pipeline over the selected roles
pub async fn execute(args: PipelineArgs, skip_build: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.settings.builder_config()?;
    config.validate()?;

    let roles = args.selected_roles()?;
    info!(
        "Loaded {} roles from {}",
        roles.len(),
        args.settings.roles.display()
    );

    let backend = DockerCliBackend::new(&args.docker).with_args(args.docker_args.iter().cloned());
    let builder = RoleImageBuilder::new(config.clone(), Arc::new(backend));

    let stats = builder
        .build_role_images(
            &roles,
            &config.repository,
            &config.version,
            skip_build,
            args.workers,
        )
        .await?;

    println!("✅ {stats}");
    println!("   Build contexts in {}", config.output_dir.display());
    Ok(())
}
