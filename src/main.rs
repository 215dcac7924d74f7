use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use homedir::my_home;
use inquire::error::InquireResult;
use serde_json::json;

mod cleaning;
mod cli;
mod config;
mod corpus;
mod engine;
mod errors;
mod lock;
mod service;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use config::Config;
use corpus::Corpus;
use engine::{ArtifactStore, Model};
use lock::BuildLock;
use service::RecommendationService;

fn base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("SIMREC_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = my_home()
        .context("could not determine home directory")?
        .context("home directory path is empty")?;
    Ok(home.join(".local/share/simrec"))
}

fn build(config: &Config, dataset: &Path, yes: bool) -> anyhow::Result<()> {
    let _lock = BuildLock::try_acquire(config.base_path())
        .with_context(|| format!("cannot lock {}", config.base_path().display()))?;

    let store = ArtifactStore::new(config.artifact_path());

    if store.exists() && !yes && std::io::stdin().is_terminal() {
        match inquire::prompt_confirmation(format!(
            "Replace the existing model at {}?",
            store.path().display()
        )) {
            InquireResult::Ok(true) => {}
            InquireResult::Ok(false) => return Ok(()),
            InquireResult::Err(err) => bail!("An error occurred: {}", err),
        }
    }

    log::info!("reading dataset {}", dataset.display());
    let corpus = Corpus::from_csv(dataset, &config.dataset)?;
    let fingerprint = corpus::dataset_fingerprint(dataset)?;

    let model = Model::build(corpus, config.build.threads(), Some(fingerprint))?;
    store.save(&model)?;

    println!(
        "{} items, {} terms -> {}",
        model.meta().rows,
        model.meta().vocabulary_size,
        store.path().display()
    );
    Ok(())
}

fn recommend(
    config: &Config,
    title: &str,
    top_n: Option<usize>,
    scores: bool,
) -> anyhow::Result<()> {
    let model = ArtifactStore::new(config.artifact_path()).load()?;
    let service = RecommendationService::new(Arc::new(model), config.dataset.display.clone())
        .with_max_top_n(config.max_top_n);

    let title = title.trim();
    let top_n = top_n.unwrap_or(config.top_n);

    if scores {
        let ranked = service.rank(title, top_n)?;
        let rows: Vec<_> = ranked
            .iter()
            .map(|candidate| {
                json!({
                    "row": candidate.row,
                    "title": service.model().corpus().get(candidate.row).map(|item| item.title.as_str()),
                    "score": candidate.score,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let records = service.recommend(title, top_n)?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn inspect(config: &Config) -> anyhow::Result<()> {
    let store = ArtifactStore::new(config.artifact_path());
    let model = store.load()?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "path": store.path(),
            "meta": model.meta(),
            "columns": model.corpus().columns(),
            "distinct_titles": model.title_index().len(),
        }))?
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    let config = Config::load_with(&base_path()?)?;

    match args.command {
        cli::Command::Build { dataset, yes } => build(&config, &dataset, yes),

        cli::Command::Recommend {
            title,
            top_n,
            scores,
        } => recommend(&config, &title, top_n, scores),

        cli::Command::Inspect {} => inspect(&config),

        cli::Command::Serve { listen } => {
            let model = ArtifactStore::new(config.artifact_path())
                .load()
                .context("cannot start without a valid model artifact")?;
            web::start_server(config, model, listen)
        }
    }
}
