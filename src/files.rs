//! Contract for the file-storage collaborator.
//!
//! The engine never touches physical storage itself: it hands upload batches
//! to the collaborator on create/update (fatal on failure) and fires
//! best-effort deletion requests during reconciliation (logged, never fatal).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Error;

/// Workers draining one deletion/upload batch in parallel.
pub(crate) const FILE_WORKERS: usize = 5;

#[derive(Debug, Clone)]
pub struct FileReq {
    pub file: Vec<u8>,
    pub destination: String,
    pub file_name: String,
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRes {
    pub file_name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFileReq {
    pub destination: String,
}

#[async_trait]
pub trait FileStore: Send + Sync + 'static {
    async fn upload_files(&self, req: Vec<FileReq>) -> Result<Vec<FileRes>, Error>;
    async fn delete_files(&self, req: Vec<DeleteFileReq>) -> Result<(), Error>;
}

/// Runs `job` over every item with a fixed pool of workers draining a shared
/// queue, never one task per item.
pub async fn for_each_bounded<T, F, Fut>(items: Vec<T>, workers: usize, job: F)
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let queue = Arc::new(Mutex::new(items.into_iter()));
    let mut handles = Vec::with_capacity(workers.max(1));
    for _ in 0..workers.max(1) {
        let queue = Arc::clone(&queue);
        let job = job.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let next = queue.lock().await.next();
                let Some(item) = next else { break };
                job(item).await;
            }
        }));
    }
    for handle in handles {
        handle.await.ok();
    }
}

/// Best-effort physical deletion for rows leaving a child collection.
/// Failures are logged and swallowed; they never fail the surrounding
/// transaction.
pub async fn delete_stored_files(store: &Arc<dyn FileStore>, requests: Vec<DeleteFileReq>) {
    if requests.is_empty() {
        return;
    }
    let store = Arc::clone(store);
    for_each_bounded(requests, FILE_WORKERS, move |req: DeleteFileReq| {
        let store = Arc::clone(&store);
        async move {
            let destination = req.destination.clone();
            if let Err(err) = store.delete_files(vec![req]).await {
                tracing::warn!("delete stored file {} failed: {}", destination, err);
            }
        }
    })
    .await;
}
