mod cli;
mod subscriber;

use std::{io::Write, process};

use anyhow::Result;
use clap::Parser;
use miette::Report;

use crate::cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    subscriber::init(args.verbosity.into(), atty::is(atty::Stream::Stderr));

    let graph = match cli::run(&args) {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("{:?}", Report::new(err));
            process::exit(1);
        }
    };

    let mut stdout = std::io::stdout().lock();
    if args.pretty {
        serde_json::to_writer_pretty(&mut stdout, &graph)?;
    } else {
        serde_json::to_writer(&mut stdout, &graph)?;
    }
    writeln!(stdout)?;
    Ok(())
}
