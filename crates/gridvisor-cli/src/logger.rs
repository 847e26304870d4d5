use colored::{Color, Colorize};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::{self, Stdout, Write};

/// Prefixes every line with the coloured name of the service it came from.
pub struct Logger<W: Write = Stdout> {
    output: W,
}

impl<W: Write> Logger<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    fn string_to_color(s: &str) -> Color {
        let colors = [
            Color::Green,
            Color::Blue,
            Color::Magenta,
            Color::Cyan,
            Color::BrightGreen,
            Color::BrightBlue,
            Color::BrightMagenta,
            Color::BrightCyan,
        ];

        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        let hash = hasher.finish();

        let idx = usize::try_from(hash).unwrap_or_default() % colors.len();
        colors[idx]
    }

    fn write_prefixed(&mut self, prefix: &colored::ColoredString, message: &str) {
        for line in message.lines() {
            let _ = writeln!(self.output, "{prefix} {line}");
        }
    }

    pub fn log(&mut self, service_name: &str, message: &str) {
        let prefix = format!("[{service_name}]").color(Self::string_to_color(service_name));
        self.write_prefixed(&prefix, message);
    }

    pub fn system(&mut self, message: &str) {
        let prefix = "[gridvisor]".color(Color::Yellow);
        self.write_prefixed(&prefix, message);
    }

    pub fn error(&mut self, message: &str) {
        let prefix = "[error]".color(Color::Red).bold();
        self.write_prefixed(&prefix, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(io::stdout())
    }
}

impl Logger<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}
