//! Time-bounded wrapper around any quote provider.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::warn;

use crate::domain::error::PapertraderError;
use crate::domain::quote::Quote;
use crate::ports::quote_port::QuotePort;

/// Runs each provider call on a worker thread and gives up after
/// `timeout`. A late answer is discarded; the worker finishes on its own.
pub struct BoundedQuoteAdapter<P> {
    inner: Arc<P>,
    timeout: Duration,
}

impl<P> BoundedQuoteAdapter<P>
where
    P: QuotePort + Send + Sync + 'static,
{
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }

    fn bounded<T, F>(&self, context: &str, call: F) -> Result<T, PapertraderError>
    where
        T: Send + 'static,
        F: FnOnce(&P) -> Result<T, PapertraderError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            // the receiver may already have timed out
            let _ = tx.send(call(inner.as_ref()));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!("quote provider timed out after {:?} for {context}", self.timeout);
                Err(PapertraderError::QuoteUnavailable {
                    symbol: context.to_string(),
                    reason: format!("no answer within {} ms", self.timeout.as_millis()),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(PapertraderError::QuoteUnavailable {
                symbol: context.to_string(),
                reason: "quote provider failed".into(),
            }),
        }
    }
}

impl<P> QuotePort for BoundedQuoteAdapter<P>
where
    P: QuotePort + Send + Sync + 'static,
{
    fn lookup_quote(&self, symbol: &str) -> Result<Option<Quote>, PapertraderError> {
        let owned = symbol.to_string();
        self.bounded(symbol, move |p| p.lookup_quote(&owned))
    }

    fn search(&self, term: &str) -> Result<Vec<Quote>, PapertraderError> {
        let owned = term.to_string();
        self.bounded(term, move |p| p.search(&owned))
    }
}
