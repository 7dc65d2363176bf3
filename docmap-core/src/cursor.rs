//! Typed, lazily decoded views over raw query results.

use std::{
    fmt::{self, Debug},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt, TryStreamExt};

use crate::{
    backend::RawCursor,
    binding::Binding,
    entity::Entity,
    error::OdmResult,
};

/// A forward-only stream of entities decoded from a raw backend cursor.
///
/// Each item is pulled from the backend only when the stream is polled. The raw cursor is
/// owned by this value and released when it is exhausted or dropped. Iterating again
/// requires issuing the query again.
///
/// ```ignore
/// let mut cursor = users.find(doc! { "name": "Alice" }).await?;
///
/// while let Some(user) = cursor.next_entity().await? {
///     println!("{user:?}");
/// }
/// ```
pub struct TypedCursor<E: Entity> {
    raw: Option<RawCursor>,
    binding: Arc<Binding<E>>,
}

impl<E: Entity> TypedCursor<E> {
    /// Wraps a raw cursor, decoding its documents with `binding`.
    pub fn new(raw: RawCursor, binding: Arc<Binding<E>>) -> Self {
        Self { raw: Some(raw), binding }
    }

    /// Pulls the next entity, or `None` once the results are exhausted.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or [`OdmError::Decode`](crate::error::OdmError::Decode)
    /// if the document does not fit `E`.
    pub async fn next_entity(&mut self) -> OdmResult<Option<E>> {
        self.next().await.transpose()
    }

    /// Drains the cursor into a vector, stopping at the first error.
    pub async fn to_vec(self) -> OdmResult<Vec<E>> {
        self.try_collect().await
    }

    /// Whether the underlying cursor has been exhausted or failed.
    pub fn is_exhausted(&self) -> bool {
        self.raw.is_none()
    }
}

impl<E: Entity> Stream for TypedCursor<E> {
    type Item = OdmResult<E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let Some(raw) = this.raw.as_mut() else {
            return Poll::Ready(None);
        };

        match raw.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(document))) => {
                let decoded = this.binding.decode_document(document);

                if decoded.is_err() {
                    this.raw = None;
                }

                Poll::Ready(Some(decoded))
            }
            Poll::Ready(Some(Err(err))) => {
                this.raw = None;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.raw = None;
                Poll::Ready(None)
            }
        }
    }
}

impl<E: Entity> Debug for TypedCursor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCursor")
            .field("collection", &self.binding.collection())
            .field("exhausted", &self.is_exhausted())
            .finish()
    }
}
