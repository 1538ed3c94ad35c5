use crate::service::LedgerService;

/// Shared gateway state
pub struct AppState<S> {
    pub ledger: LedgerService<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
        }
    }
}

impl<S> AppState<S> {
    pub fn new(ledger: LedgerService<S>) -> Self {
        Self { ledger }
    }
}
