//! Per-tile enrichment: reviews and image fetched in parallel, then joined.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tile_search::{EnrichedTile, ImageProvider, ProviderError, ReviewsProvider, Tile};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::events::{EventHub, EventKind};
use crate::pool::{PoolTask, WorkerPool};

/// An enriched tile plus how long its join took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedTile {
    /// The joined record.
    pub enriched: EnrichedTile,
    /// Milliseconds from tile arrival to join completion.
    pub join_ms: u64,
}

/// Everything one join needs besides the tile itself.
pub(crate) struct JoinContext<'a, R, I> {
    pub query_id: Uuid,
    pub reviews: &'a Arc<R>,
    pub images: &'a Arc<I>,
    pub pool: &'a WorkerPool,
    pub events: &'a EventHub,
    pub timeout: Option<Duration>,
}

/// Submit both sub-fetches for `tile` to the pool right away and return
/// the join over their results.
///
/// The returned future resolves once both fetches resolved, or with the
/// first error. Dropping it aborts whichever fetch is still running.
pub(crate) fn start_join<R, I>(
    tile: Tile,
    ctx: &JoinContext<'_, R, I>,
) -> impl Future<Output = Result<JoinedTile>> + Send + use<R, I>
where
    R: ReviewsProvider + 'static,
    I: ImageProvider + 'static,
{
    let started = Instant::now();
    let query_id = ctx.query_id;

    let reviews_task = {
        let provider = Arc::clone(ctx.reviews);
        let events = ctx.events.clone();
        ctx.pool.spawn(async move {
            let reviews = provider.fetch_reviews(tile.seller_id()).await;
            if reviews.is_ok() {
                events.emit(query_id, EventKind::ReviewsCompleted { tile_id: tile.id });
            }
            reviews
        })
    };

    let image_task = {
        let provider = Arc::clone(ctx.images);
        let events = ctx.events.clone();
        ctx.pool.spawn(async move {
            let image = provider.fetch_image(tile.product_id()).await;
            if image.is_ok() {
                events.emit(query_id, EventKind::ImageCompleted { tile_id: tile.id });
            }
            image
        })
    };

    let events = ctx.events.clone();
    let timeout = ctx.timeout;
    async move {
        let join = async {
            let (reviews, image) = tokio::try_join!(settle(reviews_task), settle(image_task))?;
            Ok::<_, PipelineError>(EnrichedTile::new(tile, reviews, image))
        };
        let enriched = match timeout {
            Some(limit) => tokio::time::timeout(limit, join).await.map_err(|_| {
                PipelineError::Timeout(format!(
                    "join for tile {} exceeded {}ms",
                    tile.id,
                    limit.as_millis()
                ))
            })??,
            None => join.await?,
        };
        events.emit(query_id, EventKind::JoinCompleted { tile_id: tile.id });
        Ok(JoinedTile {
            enriched,
            join_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

/// Flatten a pool task's provider result into one pipeline result.
async fn settle<T>(task: PoolTask<std::result::Result<T, ProviderError>>) -> Result<T> {
    Ok(task.await??)
}
