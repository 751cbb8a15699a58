use serde::Deserialize;

// -------------------------------------------------------------------------------------------------
// ---- LogLevel -----------------------------------------------------------------------------------

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// ---- CollisionPolicy ----------------------------------------------------------------------------

/// What the sink does when a frame's derived file name already exists.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the previous artifact. Matches the original capture tool.
    #[default]
    Overwrite,
    /// Keep both: append `-1`, `-2`, ... before the extension.
    Rename,
}

// -------------------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------
