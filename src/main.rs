use clap::Parser;
use precision_sort::cli::{Cli, prompt_for_directory, run_cli};
use precision_sort::classifier::Classifiers;
use precision_sort::config::SorterConfig;
use precision_sort::error::OrganizeResult;
use precision_sort::logging::init_logging;
use precision_sort::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Could not initialize logging: {}", e);
    }

    OutputFormatter::banner();

    match run(&cli) {
        Ok(()) => {
            OutputFormatter::success("File organization completed successfully!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            OutputFormatter::error(&format!("File organization failed: {}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> OrganizeResult<()> {
    let directory = match &cli.directory {
        Some(directory) => directory.clone(),
        None => prompt_for_directory()?,
    };

    let mut config = SorterConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    let command = cli.organize_command();
    let classifiers = if command.needs_classifiers() && config.sorting.classify {
        Some(Classifiers::from_config(&config)?)
    } else {
        None
    };

    run_cli(command, &directory, &config, classifiers, cli.progress)
}
