//! Map/reduce over one crawl: pages are processed on a bounded rayon pool, results
//! come back over a tokio channel, and the reduce phase runs on the caller's task.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::aggregate;
use crate::audit::{build_record, AuditTarget};
use crate::config::{EngineConfig, Heuristics, Settings};
use crate::error::{ConfigError, ExtractError};
use crate::parser::{process_page, ProcessedPage};
use crate::types::{AuditRecord, PageSignals, RawPage, SignalBundle};

type PageResult = Result<ProcessedPage, ExtractError>;
type PageFn = dyn Fn(&RawPage, &Heuristics) -> PageResult + Send + Sync;

pub struct Engine {
    config: EngineConfig,
    heuristics: Arc<Heuristics>,
    process: Arc<PageFn>,
}

impl Engine {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        settings.engine.validate()?;
        let heuristics = settings.heuristics.compile()?;
        Ok(Self::from_parts(settings.engine.clone(), heuristics))
    }

    pub fn from_parts(config: EngineConfig, heuristics: Heuristics) -> Self {
        Engine {
            config,
            heuristics: Arc::new(heuristics),
            process: Arc::new(process_page),
        }
    }

    #[cfg(test)]
    fn with_page_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&RawPage, &Heuristics) -> PageResult + Send + Sync + 'static,
    {
        self.process = Arc::new(f);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn heuristics(&self) -> &Heuristics {
        &self.heuristics
    }

    /// Audit a crawl whose site is identified by its first page.
    pub async fn extract(&self, pages: Vec<RawPage>) -> AuditRecord {
        let target = pages
            .first()
            .map(|p| AuditTarget::from_url(&p.url))
            .unwrap_or_default();
        self.extract_for(&target, pages).await
    }

    /// Audit a crawl of `target`. Identical input gives an identical record
    /// apart from `created_at`.
    pub async fn extract_for(&self, target: &AuditTarget, pages: Vec<RawPage>) -> AuditRecord {
        let t0 = Instant::now();
        let total = pages.len();
        let urls: Vec<String> = pages.iter().map(|p| p.url.clone()).collect();
        info!("Extracting {} pages for {}", total, target.site_id);

        let slots = self.process_all(pages).await;

        let mut issues = Vec::new();
        let mut signals: Vec<PageSignals> = Vec::new();
        let mut texts: Vec<String> = Vec::new();
        let mut failed = 0usize;

        for (url, slot) in urls.iter().zip(slots) {
            match slot {
                Some(Ok(page)) => {
                    for e in &page.issues {
                        warn!("{}", e);
                        issues.push(e.to_string());
                    }
                    signals.push(page.signals);
                    texts.push(page.text);
                }
                Some(Err(e)) => {
                    warn!("Skipping page: {}", e);
                    issues.push(e.to_string());
                    failed += 1;
                }
                None => {
                    issues.push(format!(
                        "timeout: {} was not processed within {}s",
                        url, self.config.timeout_secs
                    ));
                    failed += 1;
                }
            }
        }

        let bundle = if signals.is_empty() {
            SignalBundle::default()
        } else {
            aggregate::aggregate(&signals, texts.iter().map(String::as_str), &self.heuristics)
        };
        let record = build_record(target, bundle, signals.len(), failed, issues);

        info!(
            "Audit of {}: {} pages ok, {} failed, brand {:?} ({:.1}s)",
            record.site_id,
            record.pages_crawled,
            record.pages_failed,
            record.signal_bundle.brand_name,
            t0.elapsed().as_secs_f64()
        );
        record
    }

    /// One slot per input page, in input order; `None` if the deadline passed first.
    async fn process_all(&self, pages: Vec<RawPage>) -> Vec<Option<PageResult>> {
        let n = pages.len();
        let mut slots: Vec<Option<PageResult>> = (0..n).map(|_| None).collect();
        if n == 0 {
            return slots;
        }

        let threads = n.min(self.config.max_pages).max(1);
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("aeo-page-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Failed to build page pool ({}), processing inline", e);
                for (slot, page) in slots.iter_mut().zip(pages) {
                    *slot = Some(guarded(&*self.process, &page, &self.heuristics));
                }
                return slots;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, PageResult)>();
        for (idx, page) in pages.into_iter().enumerate() {
            let tx = tx.clone();
            let h = Arc::clone(&self.heuristics);
            let process = Arc::clone(&self.process);
            pool.spawn(move || {
                let result = guarded(&*process, &page, &h);
                // receiver is gone once the deadline has passed
                let _ = tx.send((idx, result));
            });
        }
        // rx closes once every worker has sent
        drop(tx);

        // a timeout too large to represent means no deadline
        let deadline = tokio::time::Instant::now().checked_add(self.config.timeout());
        let mut received = 0usize;
        while received < n {
            let next = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, rx.recv()).await,
                None => Ok(rx.recv().await),
            };
            match next {
                Ok(Some((idx, result))) => {
                    slots[idx] = Some(result);
                    received += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Deadline of {}s reached with {} of {} pages unfinished",
                        self.config.timeout_secs,
                        n - received,
                        n
                    );
                    break;
                }
            }
        }

        slots
    }
}

/// Run one page, turning a panic into a failed page.
fn guarded(process: &PageFn, page: &RawPage, h: &Heuristics) -> PageResult {
    panic::catch_unwind(AssertUnwindSafe(|| process(page, h))).unwrap_or_else(|_| {
        warn!("Page worker panicked on {}", page.url);
        Err(ExtractError::parse(&page.url, "page worker panicked"))
    })
}

// ── Tests ──
