//! Show command - print one generated artifact

use super::{Artifact, Settings};
use rolezel::ArtifactGenerator;

/// Print the requested artifact of one role to stdout
pub fn execute(settings: Settings, role_name: &str, artifact: Artifact) -> Result<(), Box<dyn std::error::Error>> {
    let config = settings.builder_config()?;
    let roles = settings.roles()?;
    let role = roles
        .iter()
        .find(|role| role.name == role_name)
        .ok_or_else(|| format!("Unknown role: {role_name}"))?;

    let generator = ArtifactGenerator::new(&config);
    let text = match artifact {
        Artifact::Dockerfile => generator.image_descriptor(role)?,
        Artifact::RunScript => generator.run_script(role)?,
        Artifact::StartupScript => generator.startup_script(role)?,
    };

    print!("{text}");
    Ok(())
}
