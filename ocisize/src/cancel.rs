use crate::error::*;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative cancellation of a running query
///
/// Checked before every registry request. A request already in flight is
/// bounded by the transport timeout.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Cancel when the returned guard is dropped, unless [CancelOnDrop::disarm] is called
    pub fn guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            cancellation: Some(self.clone()),
        }
    }
}

/// See [Cancellation::guard]
#[derive(Debug)]
pub struct CancelOnDrop {
    cancellation: Option<Cancellation>,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.cancellation = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(cancellation) = self.cancellation.take() {
            log::debug!("Cancel query");
            cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard() {
        let cancellation = Cancellation::new();
        cancellation.guard().disarm();
        assert!(cancellation.check().is_ok());

        drop(cancellation.guard());
        assert!(cancellation.is_cancelled());
        assert!(matches!(cancellation.check(), Err(Error::Cancelled)));
    }
}
