// Scaffold CLI entry point

use scaffold_cli::{output, router::CommandRouter};

fn main() {
    if let Err(e) = CommandRouter::route() {
        output::print_error(&e.user_message());
        tracing::debug!(details = %e.technical_details(), "Command failed");
        std::process::exit(e.exit_code());
    }
}
