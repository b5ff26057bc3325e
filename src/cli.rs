use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "metabolic-center")]
#[command(author, version, about = "Telegram bot for metabolic health analysis and coaching", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot with long polling
    Run {
        /// Do not start the hourly reminder loop
        #[arg(long)]
        no_reminders: bool,
    },

    /// Print usage statistics from the database and exit
    Stats,

    /// Apply pending database migrations and exit
    Migrate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["metabolic-center", "run", "--no-reminders"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Run { no_reminders: true }));

        let cli = Cli::try_parse_from(["metabolic-center", "stats"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Stats));

        let cli = Cli::try_parse_from(["metabolic-center"]).unwrap();
        assert_eq!(cli.command, None);
    }
}
