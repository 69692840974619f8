use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::fetch::InfoSelector;

#[derive(Parser, Debug)]
#[command(name = "marketdata")]
#[command(
    about = "Provides market values for securities, crypto and exchange rates listed in a configuration file"
)]
#[command(version)]
pub struct Cli {
    /// Path to the INI configuration file with the [Market] section
    pub config_file: PathBuf,

    /// Market information to report
    #[arg(short, long = "info-type", value_enum, default_value_t = InfoType::All)]
    pub info_type: InfoType,

    /// Environment file merged before reading API keys (defaults to ./.env when present)
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Increase output verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InfoType {
    Market,
    Fx,
    All,
}

impl From<InfoType> for InfoSelector {
    fn from(info_type: InfoType) -> Self {
        match info_type {
            InfoType::Market => InfoSelector::MARKET,
            InfoType::Fx => InfoSelector::FX,
            InfoType::All => InfoSelector::MARKET | InfoSelector::FX,
        }
    }
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_all_information() {
        let cli = Cli::try_parse_from(["marketdata", "market.ini"]).unwrap();
        assert_eq!(cli.info_type, InfoType::All);
        assert_eq!(InfoSelector::from(cli.info_type), InfoSelector::ALL);
        assert_eq!(cli.log_level(), log::LevelFilter::Warn);
    }

    #[test]
    fn parses_selector_and_verbosity() {
        let cli = Cli::try_parse_from(["marketdata", "market.ini", "-i", "fx", "-vv"]).unwrap();
        assert_eq!(InfoSelector::from(cli.info_type), InfoSelector::FX);
        assert_eq!(cli.log_level(), log::LevelFilter::Debug);
    }

    #[test]
    fn rejects_unknown_selector() {
        assert!(Cli::try_parse_from(["marketdata", "market.ini", "-i", "bonds"]).is_err());
    }
}
