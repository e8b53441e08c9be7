mod actions;
mod arguments;

use clap::Parser;

/// Process exit code on clean shutdown.
const SUCCESS: i32 = 0;
/// Process exit code on command line errors.
const INVALID_ARGS: i32 = 1;
/// Process exit code on runtime errors.
const RUNTIME_ERROR: i32 = 2;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub enum Cli {
    /// Run the minigame server, see `run --help` for more information
    Run(arguments::Run),
}

impl Cli {
    pub fn exec(self) -> eyre::Result<()> {
        match self {
            Self::Run(args) => actions::run(args),
        }
    }
}

pub fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            err.print().ok();
            return INVALID_ARGS;
        }
    };

    match cli.exec() {
        Ok(()) => SUCCESS,
        Err(err) if err.downcast_ref::<actions::OptionsError>().is_some() => {
            eprintln!("Command line error: {}", err);
            INVALID_ARGS
        }
        Err(err) => {
            eprintln!("Runtime error: {:?}", err);
            RUNTIME_ERROR
        }
    }
}
