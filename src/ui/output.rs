use crate::ui::{DecisionKind, Icons, theme};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().header.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn file_new(path: &str) {
    println!("{} {}", Icons::NEW.style(theme().success.clone()), path);
}

/// Heading naming a backend
pub fn backend_section(name: &str) {
    println!();
    println!("━ {} ━", name.style(theme().backend.clone()));
}

/// One suppressed, worked-around or disambiguated declaration
pub fn decision(kind: DecisionKind, label: &str, path: &str, reason: &str) {
    println!(
        "  {} {} {}",
        label.style(theme().decision(kind)),
        path.style(theme().path.clone()),
        dim(reason)
    );
}
