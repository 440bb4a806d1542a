use eyre::Result;
use spinner::app;
use spinner::cli::Commands;

fn main() -> Result<()> {
    app::standalone(Commands::Process)
}
