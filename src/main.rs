use anyhow::{Context, Result};
use clap::Parser;
use testinject::cli::Cli;
use testinject::command::Command;
use testinject::config::Config;
use testinject::inject::{ImportCfgInjector, SdkBuild};
use testinject::processor::TestProcessor;
use testinject::sdk::{SdkLocation, SdkLocator};
use testinject::{exit_code, logging};

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("testinject: {:#}", err);
            tracing::error!(error = %format!("{:#}", err), "internal failure");
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = Config::load().context("failed to load configuration")?;
    logging::init_tracing(&config.logging);

    let temp_dir = std::env::temp_dir();
    let locator = SdkLocator::new(&config.sdk, &temp_dir);

    if cli.command.is_empty() {
        match locator.locate().context("failed to locate the SDK")? {
            SdkLocation::Found(path) => println!("SDK found at: {}", path.display()),
            SdkLocation::Fetched(path) => println!("SDK downloaded to: {}", path.display()),
        }
        return Ok(0);
    }

    let command = Command::classify(cli.command)?;
    let sdk = config.sdk.instrumentation();
    let injector = ImportCfgInjector::new(
        sdk.clone(),
        SdkBuild::new(locator, &config.sdk.import_path),
        &temp_dir,
    );
    let processor = TestProcessor::new(sdk, injector, &temp_dir);

    let outcome = match command {
        Command::Compile(mut cmd) => {
            let rewritten = processor
                .process_compile(&mut cmd)
                .context("failed to instrument compile command")?;
            tracing::info!(files = rewritten.len(), "compile processed");
            cmd.run()
        }
        Command::Link(mut cmd) => {
            processor
                .process_link(&mut cmd)
                .context("failed to instrument link command")?;
            cmd.run()
        }
        other @ Command::Other(_) => other.run(),
    };
    Ok(exit_code(outcome))
}
