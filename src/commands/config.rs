use anyhow::Result;
use colored::Colorize;

use crate::cli::ConfigCmd;
use crate::storage::{self, Config};
use crate::types::WeightUnit;

pub async fn handle(cmd: ConfigCmd) -> Result<()> {
    let config_path = storage::config_path()?;
    let mut cfg = Config::load(&config_path)?;

    match cmd {
        ConfigCmd::List => {
            if cfg.map.is_empty() {
                println!("{}", "(no config set)".dimmed());
            } else {
                println!("{}", "Config:".cyan().bold());
                for (k, v) in &cfg.map {
                    println!("  {} = {}", k.green(), v);
                }
            }
        }

        ConfigCmd::Get { key } => match cfg.map.get(&key) {
            Some(val) => println!("{val}"),
            None => println!("{} key `{}` not found", "warning:".yellow().bold(), key),
        },

        ConfigCmd::Set { key, val } => {
            match key.as_str() {
                "default_rest_seconds" => {
                    if val.parse::<u32>().map(|n| n > 0) != Ok(true) {
                        println!(
                            "{} `default_rest_seconds` must be a positive number of seconds",
                            "error:".red().bold()
                        );
                        return Ok(());
                    }
                }
                "weight_unit" => {
                    if val.parse::<WeightUnit>().is_err() {
                        println!(
                            "{} `weight_unit` must be `kg` or `lb`",
                            "error:".red().bold()
                        );
                        return Ok(());
                    }
                }
                _ => {}
            }

            cfg.map.insert(key.clone(), val.clone());
            cfg.save(&config_path)?;
            println!("{} set `{}` = `{}`", "info:".blue().bold(), key.green(), val);
        }

        ConfigCmd::Unset { key } => {
            if cfg.map.remove(&key).is_some() {
                cfg.save(&config_path)?;
                println!("{} removed `{}`", "info:".blue().bold(), key.green());
            } else {
                println!("{} key `{}` not found", "warning:".yellow().bold(), key);
            }
        }
    }

    Ok(())
}
