//! forge3d entry point.

use clap::{CommandFactory, Parser};

use forge3d_cli::{Cli, Commands, bootstrap, handlers, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads FORGE3D_* defaults
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.command.is_none() {
        Cli::command().print_help()?;
        return Ok(());
    }

    let ctx = bootstrap(&cli)?;
    let Some(command) = cli.command else {
        return Ok(());
    };

    match command {
        Commands::Check { json } => handlers::check::execute(&ctx, json).await?,
        Commands::Install(args) => handlers::install::execute(&ctx, args, cli.verbose).await?,
        Commands::InstallPackage {
            spec,
            import_name,
            mode,
        } => handlers::install_package::execute(&ctx, &spec, import_name, mode).await?,
        Commands::Diagnose { json } => handlers::diagnose::execute(&ctx, json).await?,
        Commands::Generate(args) => handlers::generate::execute(&ctx, args).await?,
        Commands::RemoveBackground { input, output } => {
            handlers::generate::remove_background(&ctx, input, output).await?
        }
        Commands::Config { command } => handlers::config::execute(&ctx, command)?,
    }

    Ok(())
}
