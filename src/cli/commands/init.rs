//! `init` and `config` commands.

use crate::config::Settings;

pub fn run_init(force: bool) {
    match Settings::init_config_file(force) {
        Ok(path) => {
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

pub fn run_config(config: &Settings) {
    println!("Current configuration:");
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("Error displaying config: {e}"),
    }
}
