use std::fs;
use std::process;

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            process::exit(1);
        })
    };
}

pub fn settings_export() {
    print!("{}", editable_core::settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(
        editable_core::settings::parse_settings_toml(&content),
        "Error: {}"
    );
    println!(
        "OK: composition.dotted_max_thickness={}, composition.bold_min_thickness={}, \
         sync.check_consistency={}, keys.synthesize_from_text={}",
        s.composition.dotted_max_thickness,
        s.composition.bold_min_thickness,
        s.sync.check_consistency,
        s.keys.synthesize_from_text
    );
}
