use thiserror::Error;

/// Errors raised by the runtime core.
///
/// Fatal kinds terminate the instance and surface from [`call`]. Recoverable
/// host failures never appear here; they travel the operand stack as
/// [`ErrorValue`]s instead.
///
/// [`call`]: crate::ScriptInstance::call
/// [`ErrorValue`]: crate::ErrorValue
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed source text. Produced by front-ends; the runtime itself
    /// never raises this.
    #[error("parse error: {0}")]
    Parse(String),

    /// A fault during dispatch: unresolved label, bad iterator, missing
    /// entry point, or a non-recoverable host function failure.
    #[error("script execution error: {0}")]
    ScriptExecution(String),

    /// A pop or peek reached below the bottom of the operand stack, or a
    /// frame pop was attempted with no frame active.
    #[error("stack underflow: {0}")]
    StackUnderflow(String),

    /// An operand push exceeded the value depth, or a frame push exceeded
    /// the activation depth.
    #[error("stack overflow: {0}")]
    StackOverflow(String),

    /// Instance builder misconfiguration.
    #[error("build error: {0}")]
    Build(String),

    /// The per-call operation counter crossed the configured runaway limit.
    #[error("runaway script: exceeded {0} operations")]
    RunawayScript(u64),
}

impl Error {
    /// Short kind tag for this error, as carried by [`ErrorValue`]s built
    /// from host function failures.
    ///
    /// [`ErrorValue`]: crate::ErrorValue
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Parse(_) => "Parse",
            Error::ScriptExecution(_) => "ScriptExecution",
            Error::StackUnderflow(_) => "StackUnderflow",
            Error::StackOverflow(_) => "StackOverflow",
            Error::Build(_) => "Build",
            Error::RunawayScript(_) => "RunawayScript",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
