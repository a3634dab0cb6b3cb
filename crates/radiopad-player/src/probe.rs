//! Out-of-band duration recovery.
//!
//! Downloads a source and decodes it completely to measure its length. Results
//! are cached per source URL, and concurrent requests for the same URL share a
//! single fetch and decode.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use radiopad_core::{usable_duration, Error, Result, SourceFetcher};
use tokio::sync::OnceCell;
use tracing::debug;

/// Number of measured sources kept in memory.
pub const DEFAULT_PROBE_CACHE_SIZE: usize = 256;

/// Measures the length of encoded audio.
pub trait DurationDecoder: Send + Sync + 'static {
    fn decode_duration(&self, data: Bytes, url: &str) -> Result<f64>;
}

/// Decodes with symphonia.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl DurationDecoder for SymphoniaDecoder {
    fn decode_duration(&self, data: Bytes, url: &str) -> Result<f64> {
        radiopad_audio::decode_duration(data, Some(url))
    }
}

/// Anything that can recover a source's duration on demand.
pub trait DurationSource: Send + Sync + 'static {
    fn probe_duration(&self, url: &str) -> impl Future<Output = Result<f64>> + Send;
}

type Inflight = Arc<OnceCell<std::result::Result<f64, String>>>;

/// Cached, de-duplicating decode probe.
pub struct DurationProbe<F, D = SymphoniaDecoder> {
    fetcher: F,
    decoder: Arc<D>,
    cache: Mutex<LruCache<String, f64>>,
    inflight: Mutex<HashMap<String, Inflight>>,
}

impl<F: SourceFetcher> DurationProbe<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_decoder(fetcher, SymphoniaDecoder)
    }
}

impl<F: SourceFetcher, D: DurationDecoder> DurationProbe<F, D> {
    pub fn with_decoder(fetcher: F, decoder: D) -> Self {
        let capacity =
            NonZeroUsize::new(DEFAULT_PROBE_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);

        Self {
            fetcher,
            decoder: Arc::new(decoder),
            cache: Mutex::new(LruCache::new(capacity)),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// A previously measured duration.
    pub fn cached(&self, url: &str) -> Option<f64> {
        self.cache.lock().get(url.trim()).copied()
    }

    /// Measure `url`, reusing a cached result or joining an in-flight probe.
    ///
    /// Failures are not cached; the next request tries again.
    pub async fn duration_for(&self, url: &str) -> Result<f64> {
        let key = url.trim();
        if key.is_empty() {
            return Err(Error::InvalidArgument("empty source url".to_string()));
        }

        let cached = self.cache.lock().get(key).copied();
        if let Some(seconds) = cached {
            return Ok(seconds);
        }

        let cell = Arc::clone(self.inflight.lock().entry(key.to_string()).or_default());
        let outcome = cell.get_or_init(|| self.measure(key)).await.clone();

        {
            let mut inflight = self.inflight.lock();
            if inflight.get(key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                inflight.remove(key);
            }
        }

        outcome.map_err(Error::AudioDecode)
    }

    async fn measure(&self, url: &str) -> std::result::Result<f64, String> {
        debug!("Probing duration of {url}");
        let data = self.fetcher.fetch(url).await.map_err(|e| e.to_string())?;

        let decoder = Arc::clone(&self.decoder);
        let locator = url.to_string();
        let seconds = tokio::task::spawn_blocking(move || decoder.decode_duration(data, &locator))
            .await
            .map_err(|e| format!("decode task failed: {e}"))?
            .map_err(|e| e.to_string())?;

        let seconds =
            usable_duration(seconds).ok_or_else(|| format!("unusable duration {seconds}"))?;
        self.cache.lock().put(url.to_string(), seconds);
        debug!("Probed {url}: {seconds:.3}s");
        Ok(seconds)
    }
}

impl<F: SourceFetcher, D: DurationDecoder> DurationSource for DurationProbe<F, D> {
    async fn probe_duration(&self, url: &str) -> Result<f64> {
        self.duration_for(url).await
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SourceFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                return Err(Error::Network(format!("{url} unreachable")));
            }
            Ok(Bytes::from_static(b"audio"))
        }
    }

    struct FixedDecoder(f64);

    impl DurationDecoder for FixedDecoder {
        fn decode_duration(&self, _data: Bytes, _url: &str) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_fetch() {
        let probe = DurationProbe::with_decoder(CountingFetcher::default(), FixedDecoder(42.0));

        let (a, b) = tokio::join!(
            probe.duration_for("https://cdn.test/a.mp3"),
            probe.duration_for(" https://cdn.test/a.mp3 ")
        );

        assert_eq!(a.unwrap(), 42.0);
        assert_eq!(b.unwrap(), 42.0);
        assert_eq!(probe.fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(probe.inflight.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_is_cached() {
        let probe = DurationProbe::with_decoder(CountingFetcher::default(), FixedDecoder(7.5));

        probe.duration_for("https://cdn.test/a.mp3").await.unwrap();
        let again = probe.probe_duration("https://cdn.test/a.mp3").await.unwrap();

        assert_eq!(again, 7.5);
        assert_eq!(probe.cached("https://cdn.test/a.mp3"), Some(7.5));
        assert_eq!(probe.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_retried() {
        let fetcher = CountingFetcher {
            fail: true,
            ..CountingFetcher::default()
        };
        let probe = DurationProbe::with_decoder(fetcher, FixedDecoder(1.0));

        assert!(probe.duration_for("https://cdn.test/a.mp3").await.is_err());
        assert!(probe.duration_for("https://cdn.test/a.mp3").await.is_err());

        assert_eq!(probe.fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(probe.cached("https://cdn.test/a.mp3"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unusable_duration_rejected() {
        let probe =
            DurationProbe::with_decoder(CountingFetcher::default(), FixedDecoder(f64::INFINITY));

        let err = probe.duration_for("https://cdn.test/live").await.unwrap_err();

        assert!(matches!(err, Error::AudioDecode(_)));
        assert_eq!(probe.cached("https://cdn.test/live"), None);
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let probe = DurationProbe::with_decoder(CountingFetcher::default(), FixedDecoder(1.0));
        assert!(matches!(
            probe.duration_for("  ").await,
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(probe.fetcher.calls.load(Ordering::SeqCst), 0);
    }
}
