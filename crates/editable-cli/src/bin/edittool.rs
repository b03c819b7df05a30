use clap::{Parser, Subcommand};

use editable_cli::commands::{config_ops, replay_ops};

#[derive(Parser)]
#[command(name = "edittool", about = "Editable bridge diagnostics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON edit script against the loopback engine
    Replay {
        /// Path to the script file
        script_file: String,
        /// Path to a settings TOML file (optional)
        #[arg(long)]
        settings: Option<String>,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Export default settings TOML to stdout
    SettingsExport,

    /// Validate a settings TOML file
    SettingsValidate {
        /// Path to the settings TOML file
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            script_file,
            settings,
            json,
        } => replay_ops::replay(&script_file, settings.as_deref(), json),
        Command::SettingsExport => config_ops::settings_export(),
        Command::SettingsValidate { file } => config_ops::settings_validate(&file),
    }
}
