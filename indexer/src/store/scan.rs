use std::collections::VecDeque;

use futures::StreamExt;
use futures::stream::{self, BoxStream};

use crate::error::{IndexError, IndexResult};
use crate::store::base::{BatchOp, KeyRange, KvEntry, KvStore};

struct ScanState<S> {
    store: S,
    range: KeyRange,
    remaining: Option<usize>,
    page_size: usize,
    buffer: VecDeque<KvEntry>,
    exhausted: bool,
}

/// Streams `range` from `store`, fetching `page_size` entries per round trip.
///
/// Pages are fetched only when the buffered entries run out, so an unpolled or dropped
/// stream does no further reads. At most `limit` entries are produced. A read error is
/// yielded once and ends the stream.
pub fn scan<S: KvStore>(
    store: S,
    range: KeyRange,
    limit: Option<usize>,
    page_size: usize,
) -> BoxStream<'static, IndexResult<KvEntry>> {
    let state = ScanState {
        store,
        range,
        remaining: limit,
        page_size: page_size.max(1),
        buffer: VecDeque::new(),
        exhausted: false,
    };

    stream::try_unfold(state, |mut state| async move {
        if state.remaining == Some(0) {
            return Ok(None);
        }

        if state.buffer.is_empty() && !state.exhausted {
            let requested = match state.remaining {
                Some(remaining) => remaining.min(state.page_size),
                None => state.page_size,
            };

            let page = state.store.scan_page(&state.range, requested).await?;
            if page.len() < requested {
                state.exhausted = true;
            }
            if let Some(last) = page.last() {
                state.range.resume_after(&last.key);
            }
            state.buffer.extend(page);
        }

        let Some(entry) = state.buffer.pop_front() else {
            return Ok(None);
        };
        if let Some(remaining) = state.remaining.as_mut() {
            *remaining -= 1;
        }

        Ok::<_, IndexError>(Some((entry, state)))
    })
    .boxed()
}

/// Deletes every key in `range`, one page per batch, and returns how many were removed.
pub async fn delete_range<S: KvStore>(
    store: &S,
    range: KeyRange,
    page_size: usize,
) -> IndexResult<usize> {
    let page_size = page_size.max(1);
    let mut removed = 0;

    loop {
        // Deleted keys drop out of the range, so every pass restarts from the front.
        let page = store.scan_page(&range, page_size).await?;
        let fetched = page.len();
        if fetched == 0 {
            break;
        }

        let ops = page
            .into_iter()
            .map(|entry| BatchOp::Delete { key: entry.key })
            .collect();
        store.batch(ops).await?;
        removed += fetched;

        if fetched < page_size {
            break;
        }
    }

    Ok(removed)
}
