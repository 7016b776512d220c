/// generate-matterbridge-config: render Matterbridge gateways from a channel CSV.
use clap::Parser;
use std::{path::PathBuf, process::ExitCode};

#[derive(Parser)]
#[command(about = "Render Matterbridge gateways from channels.csv")]
struct Cli {
    #[arg(
        long = "csv",
        default_value = "channels.csv",
        help = "Path to channels CSV (default: channels.csv)."
    )]
    csv: PathBuf,

    #[arg(
        long = "template",
        default_value = "matterbridge.toml",
        help = "Template TOML containing the gateway placeholder."
    )]
    template: PathBuf,

    #[arg(
        long = "output",
        default_value = "matterbridge.generated.toml",
        help = "Output TOML path, overwritten on success."
    )]
    output: PathBuf,
}

fn main() -> ExitCode {
    chanbridge::init_tracing();
    let args = Cli::parse();
    match chanbridge::generate(&args.csv, &args.template, &args.output) {
        Ok(count) => {
            println!(
                "Wrote {} gateway definitions to {}",
                count,
                args.output.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("ERROR: {}", err);
            ExitCode::FAILURE
        }
    }
}
