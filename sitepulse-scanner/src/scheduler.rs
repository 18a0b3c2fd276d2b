use crate::error::ScanError;
use crate::measure::PageMeasurer;
use crate::result::{Device, MeasurementJob, MeasurementResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Called with (job index, url) each time a job finishes, successfully or not.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Runs measurement jobs on a bounded pool of tokio tasks.
///
/// Every job yields one result per device. A measurer error, a timeout or a
/// panicking worker turns into results with no metric values, so the batch
/// always completes.
pub struct MeasurementScheduler {
    concurrency: usize,
    chunk_size: Option<usize>,
    chunk_delay: Duration,
    device_delay: Duration,
    timeout: Option<Duration>,
    progress_callback: Option<ProgressCallback>,
}

impl MeasurementScheduler {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            chunk_size: None,
            chunk_delay: Duration::from_secs(5),
            device_delay: Duration::from_secs(1),
            timeout: None,
            progress_callback: None,
        }
    }

    /// Submit jobs in chunks of `size`, pausing `chunk_delay` between chunks.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Pause between the per-device requests of one URL.
    pub fn with_device_delay(mut self, delay: Duration) -> Self {
        self.device_delay = delay;
        self
    }

    /// Wall-clock limit for each individual measurement.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run(
        &self,
        jobs: Vec<MeasurementJob>,
        measurer: Arc<dyn PageMeasurer>,
    ) -> Vec<MeasurementResult> {
        let chunk_size = self.chunk_size.unwrap_or(jobs.len()).max(1);
        let total_chunks = jobs.len().div_ceil(chunk_size);
        info!(
            "Measuring {} URLs with {} workers in {} chunk(s)",
            jobs.len(),
            self.concurrency,
            total_chunks
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut results = Vec::with_capacity(jobs.len());

        for (chunk_idx, chunk) in jobs.chunks(chunk_size).enumerate() {
            if total_chunks > 1 {
                info!(
                    "Processing chunk {}/{} ({} URLs)",
                    chunk_idx + 1,
                    total_chunks,
                    chunk.len()
                );
            }

            let mut handles = Vec::with_capacity(chunk.len());
            for (offset, job) in chunk.iter().enumerate() {
                let job_index = chunk_idx * chunk_size + offset;
                let task_job = job.clone();
                let measurer = measurer.clone();
                let semaphore = semaphore.clone();
                let progress_cb = self.progress_callback.clone();
                let device_delay = self.device_delay;
                let timeout = self.timeout;

                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.ok();
                    debug!("Worker picked up {}", task_job.url);
                    let job_results =
                        measure_job(&task_job, measurer.as_ref(), device_delay, timeout).await;
                    if let Some(ref callback) = progress_cb {
                        callback(job_index, task_job.url.clone());
                    }
                    job_results
                });
                handles.push((job_index, job, handle));
            }

            for (job_index, job, handle) in handles {
                match handle.await {
                    Ok(job_results) => results.extend(job_results),
                    Err(e) => {
                        let error = ScanError::JoinError(e);
                        warn!("Worker task for {} failed: {}", job.url, error);
                        // The worker died before reporting its own progress.
                        if let Some(ref callback) = self.progress_callback {
                            callback(job_index, job.url.clone());
                        }
                        results.extend(
                            devices_for(job)
                                .into_iter()
                                .map(|device| {
                                    MeasurementResult::with_error(
                                        job.url.clone(),
                                        device,
                                        error.to_string(),
                                    )
                                }),
                        );
                    }
                }
            }

            if chunk_idx + 1 < total_chunks && !self.chunk_delay.is_zero() {
                info!(
                    "Waiting {} seconds before next chunk...",
                    self.chunk_delay.as_secs_f64()
                );
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        let failures = results.iter().filter(|r| r.is_failure()).count();
        info!(
            "Measurement complete: {} results, {} without metrics",
            results.len(),
            failures
        );
        results
    }
}

/// A job without devices is measured once as desktop.
fn devices_for(job: &MeasurementJob) -> Vec<Device> {
    if job.devices.is_empty() {
        vec![Device::Desktop]
    } else {
        job.devices.clone()
    }
}

async fn measure_job(
    job: &MeasurementJob,
    measurer: &dyn PageMeasurer,
    device_delay: Duration,
    timeout: Option<Duration>,
) -> Vec<MeasurementResult> {
    let devices = devices_for(job);
    let mut results = Vec::with_capacity(devices.len());

    for (idx, device) in devices.into_iter().enumerate() {
        if idx > 0 && !device_delay.is_zero() {
            tokio::time::sleep(device_delay).await;
        }

        let outcome = match timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, measurer.measure(&job.url, device)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ScanError::Timeout(limit)),
                }
            }
            None => measurer.measure(&job.url, device).await,
        };

        match outcome {
            Ok(mut result) => {
                result.url = job.url.clone();
                result.device = device;
                results.push(result);
            }
            Err(e) => {
                warn!("Error measuring {} ({}): {}", job.url, device, e);
                results.push(MeasurementResult::with_error(
                    job.url.clone(),
                    device,
                    e.to_string(),
                ));
            }
        }
    }

    results
}

impl Default for MeasurementScheduler {
    fn default() -> Self {
        Self::new(5)
    }
}
