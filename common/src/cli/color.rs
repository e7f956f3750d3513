//! `--color` flag shared by the sender and receiver.
//!
//! Log output goes to stderr, so `Auto` decides by looking at stderr.
//! `NO_COLOR` and `EMACS` both turn `Auto` off; an explicit choice always
//! wins over the environment.

use std::env;
use std::fmt;
use std::str::FromStr;

/// When to emit ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorWhen {
    /// Color only when stderr is a TTY.
    Auto,

    /// Always color.
    Always,

    /// Never color.
    Never,
}

impl ColorWhen {
    // ---
    /// Whether log lines written to stderr should carry ANSI colors.
    pub fn should_color_logs(self) -> bool {
        // ---
        let plain_requested =
            env::var_os("NO_COLOR").is_some() || env::var_os("EMACS").is_some();
        self.resolve(plain_requested, atty::is(atty::Stream::Stderr))
    }

    fn resolve(self, plain_requested: bool, is_tty: bool) -> bool {
        match self {
            ColorWhen::Always => true,
            ColorWhen::Never => false,
            ColorWhen::Auto => !plain_requested && is_tty,
        }
    }
}

impl FromStr for ColorWhen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorWhen::Auto),
            "always" => Ok(ColorWhen::Always),
            "never" => Ok(ColorWhen::Never),
            other => Err(format!(
                "invalid color choice '{other}' (expected auto, always or never)"
            )),
        }
    }
}

impl fmt::Display for ColorWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.write_str(match self {
            ColorWhen::Auto => "auto",
            ColorWhen::Always => "always",
            ColorWhen::Never => "never",
        })
    }
}
