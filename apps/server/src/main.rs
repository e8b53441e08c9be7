mod cli;
pub(crate) mod config;

fn main() {
    std::process::exit(cli::run());
}
