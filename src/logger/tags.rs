use colored::Colorize;

/// Log tags identify the subsystem a line originates from.
///
/// Every module logs through one of these so output can be scanned
/// (or grepped) per subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Llm,
    Stream,
    Analysis,
    Risk,
    Store,
    Market,
    Pipeline,
    Shutdown,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Llm => "LLM",
            LogTag::Stream => "STREAM",
            LogTag::Analysis => "ANALYSIS",
            LogTag::Risk => "RISK",
            LogTag::Store => "STORE",
            LogTag::Market => "MARKET",
            LogTag::Pipeline => "PIPELINE",
            LogTag::Shutdown => "SHUTDOWN",
        }
    }

    /// Colored bracket label used in console output
    pub fn colored_label(&self) -> String {
        let label = format!("[{}]", self.as_str());
        match self {
            LogTag::System | LogTag::Config => label.cyan().to_string(),
            LogTag::Llm | LogTag::Stream => label.magenta().to_string(),
            LogTag::Analysis | LogTag::Risk => label.blue().to_string(),
            LogTag::Store => label.green().to_string(),
            LogTag::Market | LogTag::Pipeline => label.yellow().to_string(),
            LogTag::Shutdown => label.red().to_string(),
        }
    }
}
