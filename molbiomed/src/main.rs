// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::process::ExitCode;
use std::sync::Arc;

use molbiomed::adapters;
use molbiomed::adapters::cli::format;
use molbiomed::adapters::cli::{Cmd, MdCmd, MmpbsaCmd};
use molbiomed::app::errors::AppError;
use molbiomed::app::usecases::{OrchestratorSettings, UseCases};
use molbiomed::config;
use molbiomed::logging;

fn log_config_report(report: &config::ConfigReport) {
    match (&report.config_path, report.config_path_source) {
        (Some(path), Some(source)) => {
            tracing::info!(
                "config path: {} (source={}, present={})",
                path.display(),
                source.as_str(),
                report.config_file_present
            );
        }
        (Some(path), None) => {
            tracing::info!(
                "config path: {} (present={})",
                path.display(),
                report.config_file_present
            );
        }
        (None, _) => {
            tracing::info!("config path: (none)");
        }
    }
    let dirs = [
        ("workspace_dir", &report.workspace_dir),
        ("state_dir", &report.state_dir),
        ("protocols_dir", &report.protocols_dir),
        ("mmpbsa_workdir", &report.mmpbsa_workdir),
    ];
    for (name, value) in dirs {
        tracing::info!(
            "config {name}: {} (source={})",
            value.value.display(),
            value.source.as_str()
        );
    }
    tracing::info!(
        "config shell: {} (source={})",
        report.shell.value,
        report.shell.source.as_str()
    );
    tracing::info!(
        "config verbose: {} (source={})",
        report.verbose.value,
        report.verbose.source.as_str()
    );
    if report.remotes.is_empty() {
        tracing::info!("config remotes: (none)");
    } else {
        tracing::info!("config remotes: {}", report.remotes.join(", "));
    }
}

fn build_usecases(config: &config::Config) -> UseCases {
    UseCases::new(
        Arc::new(adapters::process::TokioScriptRunner::new()),
        Arc::new(adapters::backends::BackendRegistry::from_config(config)),
        Arc::new(adapters::store::JsonBatchStore::new(&config.state_dir)),
        Arc::new(adapters::time::SystemClock::new()),
        Arc::new(adapters::telemetry::TracingTelemetry::new()),
        OrchestratorSettings {
            workspace_dir: config.workspace_dir.clone(),
            protocols_dir: config.protocols_dir.clone(),
            mmpbsa_workdir: config.mmpbsa_workdir.clone(),
            shell: config.shell.clone(),
        },
    )
}

fn print_json(value: serde_json::Value) -> ExitCode {
    match format::format_json(value) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: failed to render output: {err}");
            ExitCode::FAILURE
        }
    }
}

fn report_error(err: &AppError, json: bool) -> ExitCode {
    tracing::debug!(code = err.code(), "command failed");
    if json {
        let _ = print_json(format::error_to_json(err));
    } else {
        eprint!("{}", format::format_error(err));
    }
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
}

async fn run(usecases: &UseCases, cmd: Cmd) -> ExitCode {
    match cmd {
        Cmd::Md(md) => match md.cmd {
            MdCmd::Submit(args) => {
                let result = match args.to_request() {
                    Ok(request) => usecases.submit_batch(&request).await,
                    Err(err) => Err(err),
                };
                match result {
                    Ok(submission) if args.json => {
                        print_json(format::submission_to_json(&submission))
                    }
                    Ok(submission) => {
                        print!("{}", format::format_submission(&submission));
                        ExitCode::SUCCESS
                    }
                    Err(err) => report_error(&err, args.json),
                }
            }
            MdCmd::Collect(args) => {
                let result = match args.fallback_backend() {
                    Ok(fallback) => {
                        usecases
                            .collect_stored_batch(&args.batch, args.replicas, fallback)
                            .await
                    }
                    Err(err) => Err(err),
                };
                match result {
                    Ok(output) if args.json => print_json(format::aggregated_to_json(&output)),
                    Ok(output) => {
                        print!("{}", format::format_aggregated(&output));
                        ExitCode::SUCCESS
                    }
                    Err(err) => report_error(&err, args.json),
                }
            }
        },
        Cmd::Mmpbsa(mmpbsa) => match mmpbsa.cmd {
            MmpbsaCmd::Setup(args) => match usecases.setup_mmpbsa(&args.to_request()).await {
                Ok(setup) if args.json => print_json(format::mmpbsa_to_json(&setup)),
                Ok(setup) => {
                    print!("{}", format::format_mmpbsa(&setup));
                    ExitCode::SUCCESS
                }
                Err(err) => report_error(&err, args.json),
            },
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let parsed = adapters::cli::parse_opts();
    let opts = parsed.opts;
    let loaded = config::load_with_report(
        opts.config,
        config::Overrides {
            workspace_dir: opts.workspace_dir,
            state_dir: opts.state_dir,
            protocols_dir: opts.protocols_dir,
            verbose: parsed.verbose_override,
        },
    );
    let config::LoadResult { config, report } = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(config.verbose);
    log_config_report(&report);

    let usecases = build_usecases(&config);
    run(&usecases, opts.cmd).await
}
