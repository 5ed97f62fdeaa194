//! Context command - assemble build contexts only

use super::PipelineArgs;

/// Assemble every selected role without calling the image backend
pub async fn execute(args: PipelineArgs) -> Result<(), Box<dyn std::error::Error>> {
    super::build::execute(args, true).await
}
