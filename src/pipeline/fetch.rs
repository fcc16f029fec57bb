use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    pipeline::{Step, decode_items, pause},
    spotify::{Category, SpotifyApi, SpotifyError},
    types::{Identified, TimeRange},
    utils::remove_duplicates_by_id,
};

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Page size of a single request.
    pub limit: u32,
    /// Offsets at or above this bound are never requested.
    pub total_limit: u32,
    pub delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            total_limit: 10_000,
            delay: Duration::from_secs(5),
        }
    }
}

/// Position of an interrupted fetch.
///
/// `time_ranges_left` starts with the range that was being paged when the
/// fault happened and `offset` is the page that failed inside it. Playlists
/// are not segmented by time range, so for them the list stays empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchCheckpoint<T> {
    pub collected: Vec<T>,
    pub offset: u32,
    pub time_ranges_left: Vec<TimeRange>,
}

impl<T> FetchCheckpoint<T> {
    /// Cursor of a fetch that has not requested anything yet.
    pub fn start(category: Category) -> Self {
        Self::at(category, 0, TimeRange::ALL.to_vec())
    }

    pub fn at(category: Category, offset: u32, time_ranges: Vec<TimeRange>) -> Self {
        Self {
            collected: Vec::new(),
            offset,
            time_ranges_left: if category.has_time_ranges() {
                time_ranges
            } else {
                Vec::new()
            },
        }
    }
}

/// Pages through one category of items.
///
/// Each time range is paged from offset 0 in steps of `limit` until a short
/// page comes back or `total_limit` is reached; only the first remaining range
/// starts at the resumed offset. Items are deduplicated by id across all
/// ranges, including those already in the resumed checkpoint.
///
/// An interruptible fault returns a checkpoint holding everything collected so
/// far, the failed offset and the ranges not finished yet. Every other fault is
/// returned as an error.
pub async fn fetch_items<A, T>(
    api: &A,
    category: Category,
    options: &FetchOptions,
    resume: Option<FetchCheckpoint<T>>,
) -> Result<Step<Vec<T>, FetchCheckpoint<T>>, SpotifyError>
where
    A: SpotifyApi + ?Sized,
    T: Identified + DeserializeOwned,
{
    let cursor = resume.unwrap_or_else(|| FetchCheckpoint::start(category));
    let limit = options.limit.max(1);

    let segments: Vec<Option<TimeRange>> = if category.has_time_ranges() {
        cursor.time_ranges_left.iter().copied().map(Some).collect()
    } else {
        vec![None]
    };

    let mut collected = cursor.collected;

    for (position, time_range) in segments.iter().enumerate() {
        let mut offset = if position == 0 { cursor.offset } else { 0 };

        while offset < options.total_limit {
            pause(options.delay).await;

            let page = match api.items_page(category, limit, offset, *time_range).await {
                Ok(page) => page,
                Err(e) if e.is_interruptible() => {
                    let time_ranges_left = segments[position..]
                        .iter()
                        .filter_map(|range| *range)
                        .collect();
                    remove_duplicates_by_id(&mut collected);
                    return Ok(Step::Interrupted {
                        checkpoint: FetchCheckpoint {
                            collected,
                            offset,
                            time_ranges_left,
                        },
                        cause: e,
                    });
                }
                Err(e) => return Err(e),
            };

            let page_len = page.len();
            collected.extend(decode_items::<T>(page, category.as_str()));

            if page_len < limit as usize {
                break;
            }
            offset += limit;
        }
    }

    remove_duplicates_by_id(&mut collected);
    Ok(Step::Complete(collected))
}
