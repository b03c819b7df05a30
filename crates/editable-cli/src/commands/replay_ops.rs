use std::fs;
use std::process;

use editable_core::settings::{parse_settings_toml, Settings};

use crate::script::{self, Report};

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            process::exit(1);
        })
    };
}

fn load_settings(path: Option<&str>) -> Settings {
    match path {
        Some(file) => {
            let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
            die!(parse_settings_toml(&content), "Error: {}")
        }
        None => Settings::default(),
    }
}

pub fn replay(script_file: &str, settings_file: Option<&str>, json: bool) {
    let content = die!(
        fs::read_to_string(script_file),
        "Error reading {script_file}: {}"
    );
    let parsed = die!(script::parse_script(&content), "Error: {}");
    let report: Report = die!(
        script::replay(&parsed, load_settings(settings_file)),
        "Error: {}"
    );

    if json {
        println!(
            "{}",
            die!(serde_json::to_string_pretty(&report), "Error: {}")
        );
    } else {
        print!("{}", script::format_text(&report));
    }

    if !report.converged {
        process::exit(2);
    }
}
