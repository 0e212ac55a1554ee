use owo_colors::OwoColorize;
use std::sync::OnceLock;
use supports_color::Stream;
use tracing_subscriber::EnvFilter;

static ANSI_ENABLED: OnceLock<bool> = OnceLock::new();

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let ansi = detect_ansi();
    let _ = ANSI_ENABLED.set(ansi);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Derive,
    Visibility,
    Override,
    Value,
    Validation,
}

impl Category {
    fn name(self) -> &'static str {
        match self {
            Category::Derive => "DERIVE",
            Category::Visibility => "VISIBILITY",
            Category::Override => "OVERRIDE",
            Category::Value => "VALUE",
            Category::Validation => "VALIDATION",
        }
    }
}

pub fn category(category: Category) -> String {
    let name = category.name();
    if !ansi_enabled() {
        return name.to_string();
    }

    match category {
        Category::Derive => format!("{}", name.bright_green().bold()),
        Category::Visibility => format!("{}", name.bright_cyan().bold()),
        Category::Override => format!("{}", name.bright_magenta().bold()),
        Category::Value => format!("{}", name.bright_blue().bold()),
        Category::Validation => format!("{}", name.bright_yellow().bold()),
    }
}

fn ansi_enabled() -> bool {
    *ANSI_ENABLED.get_or_init(detect_ansi)
}

// Logs are written to stderr.
fn detect_ansi() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    supports_color::on_cached(Stream::Stderr).is_some()
}
