#![forbid(unsafe_code)]

//! bsctl — local operator CLI for the bot-shield decision engine.

use clap::Parser;

fn main() {
    let cli = botshield_core::cli::Cli::parse();
    if let Err(e) = botshield_core::cli::run(&cli) {
        eprintln!("bsctl: {e}");
        std::process::exit(1);
    }
}
