//! proxy-templater entry point.
//! Parses the command line, then runs the generation pipeline.

use log::info;

use proxy_templater::{
    cli::{get_args, print_usage, Invocation},
    client::HttpManagementClient,
    config::env_from_process,
    error::{default_error_handler, Result},
    logger::init_logger,
    pipeline::{Outcome, Pipeline},
    renderer::MiniJinjaRenderer,
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);
    info!("API proxy template tool, version: {}", env!("CARGO_PKG_VERSION"));

    let invocation = match args.into_invocation() {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("Error: {}", err);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(err) = run(invocation) {
        default_error_handler(err);
    }
}

/// Runs the pipeline for validated arguments.
///
/// Failed deployments are reported by the pipeline and do not change the exit status.
fn run(invocation: Invocation) -> Result<()> {
    let engine = MiniJinjaRenderer::default();
    let pipeline = Pipeline::new(
        &engine,
        invocation.source,
        invocation.config,
        env_from_process(),
    );

    let outcome = pipeline.run(&invocation.mode, |options| {
        HttpManagementClient::connect(options.clone())
    })?;

    match outcome {
        Outcome::Imported { revision, deployments } => {
            let failed = deployments.iter().filter(|d| d.result.is_err()).count();
            info!(
                "revision {} of {}: {} of {} deployments succeeded",
                revision.revision,
                revision.name,
                deployments.len() - failed,
                deployments.len()
            );
        }
        Outcome::Expanded(rendered) => println!("result:\n{}", rendered),
        Outcome::Archived(_) => {}
    }
    Ok(())
}
