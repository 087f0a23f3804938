//! `delve` command line

mod config;
mod fetch;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use config::AppConfig;
use delve_core::{persist, DeepResearcher, FsArtifactStore, ResearchOutcome, ToolRegistry};
use delve_heal::{HealingReport, ProcessExecutor, SelfHealer};
use delve_llm::{Message, Thread};
use fetch::FetchUrlTool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Artifact key for the healing history
const HEAL_HISTORY_KEY: &str = "healer/history.md";

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .global(true)
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");
    let json_arg = Arg::new("json")
        .long("json")
        .global(true)
        .action(ArgAction::SetTrue)
        .help("Emit logs as JSON");
    let output_arg = Arg::new("output")
        .long("output")
        .value_parser(value_parser!(PathBuf))
        .help("Write the result to this file");
    let file_arg = Arg::new("file")
        .long("file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Source file to heal");
    let docs_arg = Arg::new("docs")
        .long("docs")
        .value_parser(value_parser!(PathBuf))
        .help("File with related documentation for the patch prompt");

    Command::new("delve")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Deep research and self-healing code agents")
        .subcommand_required(true)
        .arg(config_arg)
        .arg(json_arg)
        .subcommand(
            Command::new("research")
                .about("Research a question and write a cited report")
                .arg(
                    Arg::new("query")
                        .required(true)
                        .help("Research question"),
                )
                .arg(
                    Arg::new("no-clarify")
                        .long("no-clarify")
                        .action(ArgAction::SetTrue)
                        .help("Skip the clarifying-question step"),
                )
                .arg(output_arg.clone()),
        )
        .subcommand(
            Command::new("heal")
                .about("Execute a file and patch it until it passes")
                .arg(file_arg.clone())
                .arg(
                    Arg::new("test-command")
                        .long("test-command")
                        .help("Command to run instead of the compile check ({file} is substituted)"),
                )
                .arg(docs_arg.clone())
                .arg(output_arg.clone().help("Write the JSON healing report to this file")),
        )
        .subcommand(
            Command::new("refactor")
                .about("Heal a file, then generate and run unit tests for it")
                .arg(file_arg)
                .arg(docs_arg)
                .arg(output_arg.help("Write the JSON refactor report to this file")),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));

    let result = match AppConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
    {
        Ok(config) => match matches.subcommand() {
            Some(("research", args)) => research(&config, args).await,
            Some(("heal", args)) => heal(&config, args).await,
            Some(("refactor", args)) => refactor(&config, args).await,
            _ => Ok(false),
        },
        Err(err) => Err(err),
    };

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn research(config: &AppConfig, args: &ArgMatches) -> Result<bool> {
    let query = args
        .get_one::<String>("query")
        .context("missing query")?;
    let mut research = config.research.clone();
    if args.get_flag("no-clarify") {
        research = research.with_clarification(false);
    }

    let fetch = FetchUrlTool::new(Duration::from_secs(config.llm.timeout_secs))
        .context("failed to build fetch_url tool")?;
    let tools = ToolRegistry::new().with_tool(Arc::new(fetch));
    let researcher = DeepResearcher::new(config.client()?, research, tools);

    let outcome = researcher
        .run(Thread::from(vec![Message::user(query.as_str())]))
        .await?;
    println!("{}", outcome.display_text());

    if let Some(path) = args.get_one::<PathBuf>("output") {
        tokio::fs::write(path, outcome.display_text())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(match outcome {
        ResearchOutcome::NeedsClarification { .. } => false,
        ResearchOutcome::Completed(report) => report.report.succeeded,
    })
}

async fn heal(config: &AppConfig, args: &ArgMatches) -> Result<bool> {
    let file = args.get_one::<PathBuf>("file").context("missing --file")?;
    let code = read(file).await?;
    let file = &source_path(file).await?;
    let docs = read_docs(args).await?;
    let test_command = args.get_one::<String>("test-command").map(String::as_str);

    let llm = config.client()?;
    let executor = ProcessExecutor::from_config(&config.heal);
    let report = SelfHealer::new(&llm, &executor, &config.heal)
        .heal(&code, file, test_command, docs.as_deref())
        .await;

    let keep = if report.success {
        &report.final_code
    } else {
        &code
    };
    write(file, keep).await?;
    record_history(config, &report).await;

    println!("{}", report.message);
    if let Some(path) = args.get_one::<PathBuf>("output") {
        write_json(path, &report).await?;
    }
    Ok(report.success)
}

async fn refactor(config: &AppConfig, args: &ArgMatches) -> Result<bool> {
    let file = args.get_one::<PathBuf>("file").context("missing --file")?;
    let code = read(file).await?;
    let file = &source_path(file).await?;
    let docs = read_docs(args).await?;

    let llm = config.client()?;
    let executor = ProcessExecutor::from_config(&config.heal);
    let report = SelfHealer::new(&llm, &executor, &config.heal)
        .refactor_with_tests(&code, file, docs.as_deref())
        .await;

    let keep = if report.success { &report.code } else { &code };
    write(file, keep).await?;
    record_history(config, &report.healing).await;

    println!("{}", report.healing.message);
    if let Some(test_file) = &report.test_file {
        println!(
            "Tests written to {test_file} ({})",
            if report.test_passed { "passed" } else { "failed" }
        );
    }
    if let Some(path) = args.get_one::<PathBuf>("output") {
        write_json(path, &report).await?;
    }
    Ok(report.success && report.test_passed)
}

/// Absolute form of `--file`, so the executor's `work_dir` cannot redirect it
async fn source_path(file: &Path) -> Result<PathBuf> {
    tokio::fs::canonicalize(file)
        .await
        .with_context(|| format!("failed to resolve {}", file.display()))
}

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn write(path: &Path, text: &str) -> Result<()> {
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

async fn read_docs(args: &ArgMatches) -> Result<Option<String>> {
    match args.get_one::<PathBuf>("docs") {
        Some(path) => Ok(Some(read(path).await?)),
        None => Ok(None),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode report")?;
    write(path, &text).await
}

async fn record_history(config: &AppConfig, report: &HealingReport) {
    if let Some(root) = &config.research.workspace_root {
        let store = FsArtifactStore::new(root);
        persist(&store, HEAL_HISTORY_KEY, &history_markdown(report)).await;
    }
}

fn history_markdown(report: &HealingReport) -> String {
    let mut out = format!("# Healing history\n\n{}\n", report.message);
    for record in &report.history {
        out.push_str(&format!(
            "\n## Attempt {} ({})\n\n```\n{}\n```\n\nPatch {}.\n",
            record.attempt,
            record.category,
            record.error.trim(),
            if record.outcome.success {
                "passed"
            } else {
                "failed"
            },
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_heal::{CodeExecutor, ErrorCategory, ExecutionOutcome, HealingRecord};

    #[test]
    fn cli_parses_subcommands() {
        let matches = cli()
            .try_get_matches_from(["delve", "research", "what is io_uring", "--no-clarify"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "research");
        assert!(args.get_flag("no-clarify"));

        let matches = cli()
            .try_get_matches_from(["delve", "heal", "--file", "app.py", "--test-command", "pytest"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(
            args.get_one::<PathBuf>("file"),
            Some(&PathBuf::from("app.py"))
        );
    }

    #[test]
    fn heal_requires_file() {
        assert!(cli().try_get_matches_from(["delve", "heal"]).is_err());
    }

    #[test]
    fn history_lists_attempts() {
        let report = HealingReport {
            success: true,
            final_code: "x = 1".into(),
            attempts: 1,
            history: vec![HealingRecord {
                attempt: 1,
                error: "SyntaxError: invalid syntax".into(),
                category: ErrorCategory::Syntax,
                patch: "x = 1".into(),
                outcome: ExecutionOutcome::passed(""),
            }],
            message: "Code healed successfully after 1 attempt(s)".into(),
            last_error: None,
        };
        let text = history_markdown(&report);
        assert!(text.contains("## Attempt 1 (syntax_error)"));
        assert!(text.contains("Patch passed."));
    }

    #[tokio::test]
    async fn relative_file_resolves_against_current_dir() {
        let resolved = source_path(Path::new("Cargo.toml")).await.unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(
            resolved,
            std::fs::canonicalize(Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"))
                .unwrap()
        );
    }

    /// The executor patches the same file the command reads and restores.
    #[tokio::test]
    async fn executor_work_dir_does_not_redirect_source() {
        let source = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("app.py"), "x = (").unwrap();

        let file = source_path(&source.path().join("app.py")).await.unwrap();
        let executor = ProcessExecutor::new(work.path(), "true");
        let outcome = executor
            .run("x = 1", &file, None, Duration::from_secs(5))
            .await;

        assert!(outcome.success);
        assert_eq!(read(&file).await.unwrap(), "x = 1");
        assert!(!work.path().join("app.py").exists());
    }
}
