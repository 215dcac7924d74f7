use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a model from a dataset CSV and publish it as the active artifact
    Build {
        /// Dataset with a header row
        dataset: PathBuf,

        /// Replace an existing artifact without asking
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },

    /// Print items similar to a title
    Recommend {
        /// Exact title as it appears in the dataset
        title: String,

        /// Number of recommendations (defaults to `top_n` in config.yaml)
        #[clap(short = 'n', long)]
        top_n: Option<usize>,

        /// Print row indices and similarity scores instead of display records
        #[clap(long, default_value = "false")]
        scores: bool,
    },

    /// Print metadata of the current artifact
    Inspect {},

    /// Serve recommendations over HTTP
    Serve {
        /// Address to bind, overrides `serve.listen`
        #[clap(long)]
        listen: Option<String>,
    },
}
