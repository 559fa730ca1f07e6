//! Fan-in of per-cluster completion signals
//!
//! A [`CompletionSet`] is sized up front to the number of clusters. Each
//! cluster task owns one [`CompletionSignal`] for its slot and reports exactly
//! once; a signal dropped without reporting (task panicked or was cancelled)
//! reports a failure for its slot. [`CompletionSet::wait`] returns once every
//! slot has reported, so it cannot return early and cannot wait on a slot
//! that will never report.

use tokio::sync::mpsc;

/// Outcome of one cluster task: success or a failure description
pub type Completion = std::result::Result<(), String>;

/// Message reported by a signal dropped without an explicit outcome
pub const ABANDONED: &str = "cluster task ended without reporting completion";

/// Pre-sized collector of completion signals
#[derive(Debug)]
pub struct CompletionSet {
    slots: Vec<Option<Completion>>,
    issued: Vec<bool>,
    tx: Option<mpsc::UnboundedSender<(usize, Completion)>>,
    rx: mpsc::UnboundedReceiver<(usize, Completion)>,
}

impl CompletionSet {
    /// A set with `size` slots
    pub fn new(size: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            slots: vec![None; size],
            issued: vec![false; size],
            tx: Some(tx),
            rx,
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the set has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The signal for `index`. Each slot hands out at most one signal.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or its signal was already taken.
    pub fn signal(&mut self, index: usize) -> CompletionSignal {
        assert!(
            !std::mem::replace(&mut self.issued[index], true),
            "completion signal {} taken twice",
            index
        );
        CompletionSignal {
            index,
            tx: self.tx.clone(),
        }
    }

    /// Wait for every slot to report, calling `on_completion` as each
    /// outcome arrives. Outcomes are returned in slot order.
    pub async fn wait<F>(mut self, mut on_completion: F) -> Vec<Completion>
    where
        F: FnMut(usize, &Completion),
    {
        // Only issued signals may hold senders from here on.
        self.tx = None;

        for index in 0..self.slots.len() {
            if !self.issued[index] {
                let outcome = Err(ABANDONED.to_string());
                on_completion(index, &outcome);
                self.slots[index] = Some(outcome);
            }
        }

        let mut remaining = self.slots.iter().filter(|s| s.is_none()).count();
        while remaining > 0 {
            let Some((index, outcome)) = self.rx.recv().await else {
                break;
            };
            let slot = &mut self.slots[index];
            if slot.is_none() {
                on_completion(index, &outcome);
                *slot = Some(outcome);
                remaining -= 1;
            }
        }

        self.slots
            .into_iter()
            .map(|s| s.unwrap_or_else(|| Err(ABANDONED.to_string())))
            .collect()
    }
}

/// One-shot completion handle for a single slot
#[derive(Debug)]
pub struct CompletionSignal {
    index: usize,
    tx: Option<mpsc::UnboundedSender<(usize, Completion)>>,
}

impl CompletionSignal {
    /// Slot this signal reports for
    pub fn index(&self) -> usize {
        self.index
    }

    /// Report the outcome for this slot
    pub fn complete(mut self, outcome: Completion) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: Completion) {
        if let Some(tx) = self.tx.take() {
            // The set may have been dropped; nobody is waiting then.
            let _ = tx.send((self.index, outcome));
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        self.send(Err(ABANDONED.to_string()));
    }
}
