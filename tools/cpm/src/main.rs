///
/// cpm CLI - C Package Manager command-line interface
///
/// - cpm init [name]: Initialize a new project
/// - cpm install [package]: Install all packages in cpmfile, or one of them
/// - cpm add <package> <version>: Add a package to cpmfile
/// - cpm remove <package>: Remove a package
/// - cpm update: Update all packages
/// - cpm list: List installed packages
/// - cpm makefile: Generate Makefile
///
/// Every command exits with 0 on success and 1 on failure.
///

use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::ExitCode;
use tracing::Level;

use cpm::context::MAKEFILE;
use cpm::{
    find_project_root, format_list, CpmError, EditOutcome, InstallReport, PackageManager,
    ProjectContext,
};

#[derive(Parser)]
#[command(name = "cpm")]
#[command(author, version, about = "C Package Manager", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Print debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project
    Init {
        /// Project name
        name: Option<String>,
    },

    /// Install all packages in cpmfile, or a single one
    Install {
        /// Package to install
        package: Option<String>,
    },

    /// Add a package to cpmfile
    Add {
        /// Package name
        package: String,

        /// Package version
        version: String,
    },

    /// Remove a package
    Remove {
        /// Package name
        package: String,
    },

    /// Update all packages
    Update,

    /// List installed packages
    List,

    /// Generate Makefile
    Makefile,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_error_status(&e));
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let result = std::env::current_dir()
        .map_err(CpmError::from)
        .and_then(|cwd| run(cli.command, &cwd));
    if let Err(e) = &result {
        eprintln!("Error: {}", e);
    }
    ExitCode::from(exit_status(&result))
}

/// Help and version requests exit 0; every other parse error exits 1.
fn parse_error_status(e: &clap::Error) -> u8 {
    if e.use_stderr() { 1 } else { 0 }
}

fn exit_status(result: &Result<(), CpmError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn run(command: Commands, cwd: &Path) -> Result<(), CpmError> {
    match command {
        Commands::Init { name } => {
            let pm = PackageManager::new(ProjectContext::new(cwd))?;
            let name = pm.init(name.as_deref())?;
            println!("Generated {}", MAKEFILE);
            println!("Initialized C project: {}", name);
            Ok(())
        }
        Commands::Install { package } => {
            let pm = manager_for(cwd)?;
            let installed = pm.install(package.as_deref());
            let generated = pm.generate_makefile();
            print_report(&installed?);
            generated?;
            println!("Generated {}", MAKEFILE);
            Ok(())
        }
        Commands::Add { package, version } => {
            let pm = manager_for(cwd)?;
            let verb = match pm.add(&package, &version)? {
                EditOutcome::Replaced { .. } => "Updated",
                _ => "Added",
            };
            println!("{} package {} version {}", verb, package, version);
            Ok(())
        }
        Commands::Remove { package } => {
            let pm = manager_for(cwd)?;
            let removed = pm.remove(&package);
            let generated = pm.generate_makefile();
            let entry = removed?;
            println!("Removed package {}", entry.name);
            generated?;
            println!("Generated {}", MAKEFILE);
            Ok(())
        }
        Commands::Update => {
            let pm = manager_for(cwd)?;
            let updated = pm.update();
            let generated = pm.generate_makefile();
            print_report(&updated?);
            generated?;
            println!("Generated {}", MAKEFILE);
            Ok(())
        }
        Commands::List => {
            let pm = manager_for(cwd)?;
            print!("{}", format_list(&pm.list()?));
            Ok(())
        }
        Commands::Makefile => {
            let pm = manager_for(cwd)?;
            pm.generate_makefile()?;
            println!("Generated {}", MAKEFILE);
            Ok(())
        }
    }
}

fn manager_for(cwd: &Path) -> Result<PackageManager, CpmError> {
    let root = find_project_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
    PackageManager::new(ProjectContext::new(root))
}

fn print_report(report: &InstallReport) {
    for entry in &report.installed {
        println!("Installed package {} version {}", entry.name, entry.version);
    }
    for (entry, e) in &report.failed {
        eprintln!("Failed to install package {} version {}: {}", entry.name, entry.version, e);
    }
}
