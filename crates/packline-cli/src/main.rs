use clap::Parser;

mod args;
mod cmd;
mod output;

fn main() {
    let cli = args::Cli::parse();
    let code = match cmd::dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            output::eprintln_line(&format!("packline: {e:#}"));
            1
        }
    };
    std::process::exit(code);
}
