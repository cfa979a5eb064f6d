use crate::script::covid19::DEFAULT_ENDPOINT;
use crate::script::ScriptKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "scriptpipe", version, about = "Script input plugin: setup, run and finish lifecycle")]
pub struct Cli {
    /// Which bundled script answers the lifecycle verbs
    #[arg(long, value_enum, default_value = "hello", global = true)]
    pub script: ScriptKind,

    /// Timeline URL fetched by the covid19 script
    #[arg(long, env = "SCRIPTPIPE_COVID19_ENDPOINT", default_value = DEFAULT_ENDPOINT, global = true)]
    pub endpoint: String,

    #[command(subcommand)]
    pub verb: Verb,
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum Verb {
    /// Read the configuration and write the setup descriptor
    Setup {
        config_path: PathBuf,
        setup_path: PathBuf,
    },
    /// Write the rows of one task
    Run {
        setup_path: PathBuf,
        task_index: u32,
        output_path: PathBuf,
    },
    /// Close out after every task has run
    Finish {
        setup_path: PathBuf,
    },
    /// Act as the host: drive a script command through all three verbs
    Drive {
        driver_path: PathBuf,
        /// NDJSON destination for the validated records (stdout when absent)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

pub fn get_opts() -> Cli {
    Cli::parse()
}
