//! gok CLI entry point.
//!
//! Parses arguments, initializes logging (with secret redaction), installs
//! the Ctrl-C cancellation handler and executes the selected command. Any
//! failure is rendered as a user-friendly error and exits with code 1.

use clap::Parser;

use gok::cli::Cli;
use gok::core::{user_friendly_error, Cancellation};
use gok::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_options());

    let cancel = Cancellation::new();
    cancel.install_ctrl_c_handler();

    if let Err(e) = cli.execute(&cancel).await {
        user_friendly_error(e).display();
        std::process::exit(1);
    }
}
