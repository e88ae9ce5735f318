//! The cancellation signals handed to read tasks.
//!
//! None of them is ever triggered by a benchmark run. They differ only in how
//! they are constructed, which is what the token modes measure.

use tokio_util::sync::CancellationToken;

use crate::ExecutionMode;

/// What a read task checks before each row fetch.
#[derive(Debug, Clone, Default)]
pub enum CancelSignal {
    /// Never cancelled and backed by nothing.
    #[default]
    Never,
    Token(CancellationToken),
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        match self {
            CancelSignal::Never => false,
            CancelSignal::Token(token) => token.is_cancelled(),
        }
    }
}

/// Owns a root token and hands out child tokens.
///
/// Cancelling the source cancels every token it handed out.
#[derive(Debug, Default)]
pub struct TokenSource {
    root: CancellationToken,
}

impl TokenSource {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn cancel(&self) {
        self.root.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.root.is_cancelled()
    }
}

/// The signal for one invocation in `mode`, plus the source that must outlive
/// every task using the signal.
pub(crate) fn signal_for(mode: ExecutionMode) -> (CancelSignal, Option<TokenSource>) {
    match mode {
        ExecutionMode::Sync | ExecutionMode::Async => (CancelSignal::Never, None),
        ExecutionMode::AsyncWithToken => (CancelSignal::Token(CancellationToken::new()), None),
        ExecutionMode::AsyncWithTokenSource => {
            let source = TokenSource::new();
            (CancelSignal::Token(source.token()), Some(source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_signals_are_not_cancelled() {
        for mode in ExecutionMode::ALL {
            let (signal, source) = signal_for(mode);
            assert!(!signal.is_cancelled(), "{mode}");
            assert_eq!(
                source.is_some(),
                mode == ExecutionMode::AsyncWithTokenSource
            );
        }
    }

    #[test]
    fn token_modes_carry_a_token() {
        let (signal, _) = signal_for(ExecutionMode::AsyncWithToken);
        assert!(matches!(signal, CancelSignal::Token(_)));
        let (signal, _) = signal_for(ExecutionMode::Async);
        assert!(matches!(signal, CancelSignal::Never));
    }

    #[test]
    fn source_cancels_handed_out_tokens() {
        let source = TokenSource::new();
        let signal = CancelSignal::Token(source.token());
        assert!(!signal.is_cancelled());
        source.cancel();
        assert!(source.is_cancelled());
        assert!(signal.is_cancelled());
    }
}
