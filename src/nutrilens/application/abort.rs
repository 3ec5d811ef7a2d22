use tokio::sync::watch;

/// Caller side of an in-flight upload. `abort` may be called from anywhere.
#[derive(Debug)]
pub struct UploadAbortHandle {
    tx: watch::Sender<bool>,
}

/// Upload side; resolves once the caller aborts.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

pub fn abort_pair() -> (UploadAbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (UploadAbortHandle { tx }, AbortSignal { rx })
}

impl UploadAbortHandle {
    pub fn abort(&self) {
        // 受信側がもういなければ何もしない
        let _ = self.tx.send(true);
    }
}

impl AbortSignal {
    /// A signal nobody can trigger.
    pub fn never() -> Self {
        let (_, signal) = abort_pair();
        signal
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn aborted(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // ハンドルが破棄された: もう中断されることはない
                std::future::pending::<()>().await;
            }
        }
    }
}
