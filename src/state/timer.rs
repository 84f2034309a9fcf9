use tokio::task::JoinHandle;

/// Owns at most one background task (a phase timer or an in-flight judging
/// call) on behalf of a room. Arming replaces and aborts the previous task;
/// dropping the slot aborts whatever is still pending.
#[derive(Debug, Default)]
pub struct TaskSlot {
    handle: Option<JoinHandle<()>>,
}

impl TaskSlot {
    pub fn arm(&mut self, handle: JoinHandle<()>) {
        self.cancel();
        self.handle = Some(handle);
    }

    /// Abort the pending task, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Forget the handle without aborting. Used by the task itself when it
    /// fires, so it does not cancel its own remaining work.
    pub fn clear(&mut self) {
        self.handle = None;
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn flag_after(delay: Duration, flag: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            flag.store(true, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_aborts_previous_task() {
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        let mut slot = TaskSlot::default();
        slot.arm(flag_after(Duration::from_secs(1), first.clone()));
        slot.arm(flag_after(Duration::from_secs(2), second.clone()));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!first.load(Ordering::SeqCst), "replaced task must not fire");
        assert!(second.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_task() {
        let fired = Arc::new(AtomicBool::new(false));
        {
            let mut slot = TaskSlot::default();
            slot.arm(flag_after(Duration::from_secs(1), fired.clone()));
            assert!(slot.is_armed());
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_detaches_without_abort() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut slot = TaskSlot::default();
        slot.arm(flag_after(Duration::from_secs(1), fired.clone()));
        slot.clear();
        assert!(!slot.is_armed());
        drop(slot);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
