// Backlog prefetch - fetches raw blocks ahead of the parser

use crate::error::{ParseError, Result};
use crate::source::{ChainDataSource, FetchedBlock, fetch_block};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fetch blocks `from..=to` in height order on the blocking pool.
///
/// At most `depth` fetched blocks wait in the channel. Fetching stops after
/// the first error, which is delivered like a block, or once the receiver
/// is dropped.
pub fn spawn_prefetch(
    source: Arc<dyn ChainDataSource>,
    from: u32,
    to: u32,
    depth: usize,
) -> mpsc::Receiver<Result<FetchedBlock>> {
    let (sender, receiver) = mpsc::channel(depth.max(1));

    tokio::spawn(async move {
        for height in from..=to {
            let source = Arc::clone(&source);
            let fetched = tokio::task::spawn_blocking(move || fetch_block(source.as_ref(), height))
                .await
                .unwrap_or_else(|e| Err(ParseError::Source(format!("Prefetch of block {} failed: {}", height, e))));

            let failed = fetched.is_err();
            if sender.send(fetched).await.is_err() {
                log::debug!("Prefetch receiver dropped at height {}", height);
                return;
            }
            if failed {
                return;
            }
        }
    });

    receiver
}
