use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use sherpa_agent::tools::ToolRegistry;
use sherpa_agent::Context;
use sherpa_common::observability::init_logging;
use sherpa_config::{default_config_path, SherpaConfig, SherpaConfigLoader};
use std::path::{Path, PathBuf};
use tracing::{error, info};

mod wiring;

#[derive(Parser, Debug)]
#[command(name = "sherpa", version, about = "Autonomous browser task executor")]
struct Cli {
    /// YAML configuration; without it `sherpa.yaml` in the config dir and
    /// the working directory are read when present.
    #[arg(long, short, env = "SHERPA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Print the structured result as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive a browser until the task is answered.
    Run {
        #[arg(required = true, num_args = 1..)]
        task: Vec<String>,
    },
    /// Search the web, extract every hit and compile a markdown report.
    Research {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
}

fn load_config(explicit: Option<&Path>) -> Result<SherpaConfig> {
    let loader = SherpaConfigLoader::new();
    let loader = match explicit {
        Some(path) => loader.with_file(path),
        None => {
            let loader = match default_config_path() {
                Some(path) => loader.with_optional_file(path),
                None => loader,
            };
            loader.with_optional_file("sherpa.yaml")
        }
    };
    loader.load().context("loading configuration")
}

async fn run_task(cfg: &SherpaConfig, task: &str, json: bool) -> Result<()> {
    let llm = wiring::build_llm_client(&cfg.llm).await?;
    let factory = wiring::page_factory(&cfg.browser);
    let page = wiring::open_page(&factory, cfg.browser.target_url.as_deref()).await?;

    let workflow = wiring::workflow(cfg, llm);
    let ctx = workflow
        .execute(Context::new(task, page, ToolRegistry::with_defaults()))
        .await;
    wiring::close_page(ctx.page.as_ref()).await;
    let output = ctx
        .output
        .clone()
        .context("workflow ended without an output record")?;

    if json {
        println!("{}", output.to_json_pretty()?);
    } else {
        if let Some(plan) = ctx.plan.as_deref().filter(|p| !p.is_empty()) {
            println!("Plan:\n{plan}\n");
        }
        println!("{}", output.result);
    }
    Ok(())
}

async fn research(cfg: &SherpaConfig, query: &str, json: bool) -> Result<()> {
    let llm = wiring::build_llm_client(&cfg.llm).await?;
    let pipeline = wiring::pipeline(cfg, llm, wiring::page_factory(&cfg.browser))?;
    let research = pipeline.run(query).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&research)?);
    } else {
        println!("{}", research.report);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().map_err(|e| anyhow::anyhow!("installing error hooks: {e}"))?;
    let cli = Cli::parse();

    let cfg = load_config(cli.config.as_deref())?;
    let log_file = init_logging(cfg.logging.to_log_config())?;
    info!(log_file = %log_file.display(), "sherpa.start");

    let outcome = match &cli.command {
        Command::Run { task } => run_task(&cfg, &task.join(" "), cli.json).await,
        Command::Research { query } => research(&cfg, &query.join(" "), cli.json).await,
    };
    if let Err(e) = outcome {
        error!(error = %format!("{e:#}"), "sherpa.failed");
        eprintln!("Error: {e:#}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn free_text_task_is_collected() {
        let cli = Cli::parse_from(["sherpa", "--json", "run", "find", "the", "rust", "release"]);
        assert!(cli.json);
        match cli.command {
            Command::Run { task } => assert_eq!(task.join(" "), "find the rust release"),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
