use iac_lambda::{build_app, DeploymentContext, IacResult};
use std::path::PathBuf;

pub fn synth_command(
    ctx: &DeploymentContext,
    stack: Option<&str>,
    out: Option<PathBuf>,
) -> IacResult<()> {
    let assembly = build_app(ctx)?.synth()?;

    if let Some(dir) = out {
        for path in assembly.write_to(&dir)? {
            println!("{}", path.display());
        }
        return Ok(());
    }

    match stack {
        Some(name) => println!("{}", assembly.template_json(name)?),
        None => println!("{}", assembly.manifest_json()?),
    }
    Ok(())
}

pub fn list_command(ctx: &DeploymentContext) -> IacResult<()> {
    let assembly = build_app(ctx)?.synth()?;

    for artifact in &assembly.manifest().stacks {
        if artifact.dependencies.is_empty() {
            println!("{}", artifact.name);
        } else {
            println!(
                "{} (depends on {})",
                artifact.name,
                artifact.dependencies.join(", ")
            );
        }
    }
    Ok(())
}
