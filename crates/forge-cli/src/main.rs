use clap::{Parser, Subcommand};
use forge_cli::commands::{
    config::{self, ConfigAction},
    docs, package, publish, run, validate,
};
use forge_cli::{common::init_tracing, GlobalOpts};

#[derive(Parser)]
#[command(name = "plugin-forge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Plugin packaging for CI",
    long_about = "plugin-forge validates, packages, publishes and documents launcher plugins."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate plugin manifests
    Validate(validate::ValidateCommand),
    /// Build archives and checksums
    Package(package::PackageCommand),
    /// Package and publish to GitHub Releases and/or an OCI registry
    Publish(publish::PublishCommand),
    /// Generate versioned HTML documentation from published archives
    Docs(docs::DocsCommand),
    /// Validate, package, publish and document in one step
    Run(run::RunCommand),
    /// Inspect configuration
    #[command(subcommand_required = true, arg_required_else_help = true)]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let verbosity = cli.global.verbosity_level();

    if let Err(e) = forge_logger::init_with_verbosity(verbosity, None) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing(verbosity);

    let result = match cli.command {
        Commands::Validate(cmd) => validate::handle_validate(cmd, &cli.global),
        Commands::Package(cmd) => package::handle_package(cmd, &cli.global),
        Commands::Publish(cmd) => publish::handle_publish(cmd, &cli.global),
        Commands::Docs(cmd) => docs::handle_docs(cmd, &cli.global),
        Commands::Run(cmd) => run::handle_run(cmd, &cli.global),
        Commands::Config { action } => config::handle_config(action, &cli.global),
    };

    if let Err(e) = result {
        forge_logger::error(&format!("{:#}", e));
        if verbosity > 0 {
            forge_logger::show_log_path();
        }
        std::process::exit(1);
    }
}
