use clap::{CommandFactory, Parser};
use cms_update::cli::CliArgs;
use cms_update::core::processor;
use cms_update::error::{AppError, AppResult};
use cms_update::logging::{log, setup_logging, LogLevel};
use cms_update::planning;
use std::process::ExitCode;
use tokio::runtime::Builder;

fn main() -> ExitCode {
    setup_logging();

    let cli_args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            log(LogLevel::Error, &format!("CLI Argument Error: {}", e));
            let _ = CliArgs::command().print_help();
            return ExitCode::from(2);
        }
    };

    let runtime = match Builder::new_multi_thread()
        .enable_all()
        .thread_name("cms-worker")
        .worker_threads(num_cpus::get())
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log(
                LogLevel::Error,
                &format!("FATAL: Failed to build Tokio runtime: {}", e),
            );
            return ExitCode::FAILURE;
        }
    };

    let main_result: AppResult<i32> = runtime.block_on(async {
        if let Some((items_path, categories_path)) = cli_args.plan_files() {
            if !items_path.exists() || !categories_path.exists() {
                log(LogLevel::Error, "Plan input file(s) not found.");
                return Err(AppError::Argument("Plan input file(s) not found.".into()));
            }

            let sources = cli_args.source_names();
            let target = cli_args.target_name();
            match planning::plan(&items_path, &categories_path, &sources, &target).await {
                Ok(()) => Ok(0),
                Err(e) => {
                    log(LogLevel::Error, &format!("Plan mode failed: {:?}", e));
                    Ok(1)
                }
            }
        } else {
            let cfg = match cli_args.run_config() {
                Ok(cfg) => cfg,
                Err(e) => {
                    log(LogLevel::Error, &e.to_string());
                    let _ = CliArgs::command().print_help();
                    return Err(e);
                }
            };

            processor::run(cfg).await
        }
    });

    if let Err(e) = &main_result {
        if !matches!(e, AppError::Argument(_)) {
            log(LogLevel::Error, &format!("FATAL UNEXPECTED ERROR: {:?}", e));
        }
    }
    ExitCode::from(exit_status(&main_result))
}

// 0 = completion (per-item failures included), 1 = fatal, 2 = bad arguments.
fn exit_status(result: &AppResult<i32>) -> u8 {
    match result {
        Ok(exit_code) => *exit_code as u8,
        Err(AppError::Argument(_)) => 2,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_exit_two() {
        let result: AppResult<i32> = Err(AppError::Argument("--items-collection".into()));
        assert_eq!(exit_status(&result), 2);
    }

    #[test]
    fn fatal_errors_exit_one() {
        let result: AppResult<i32> = Err(AppError::CategoryLookup("mental wellness".into()));
        assert_eq!(exit_status(&result), 1);
    }

    #[test]
    fn completion_code_passes_through() {
        assert_eq!(exit_status(&Ok(0)), 0);
        assert_eq!(exit_status(&Ok(1)), 1);
    }
}
