//! Command outbox with retry scheduling.
//!
//! Holds commands that could not be delivered, in their opaque form, until
//! a sender picks them up again.
//!
//! ## Retry Logic
//!
//! Failed sends use exponential backoff:
//! - First retry: 30 seconds
//! - Subsequent: 60s, 120s, 240s, 480s (capped at 8 minutes)
//! - Max 5 attempts before permanent failure
//!
//! Jobs older than the TTL (7 days by default) are no longer handed out and
//! are removed by [`CommandOutbox::cleanup_expired`].

use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use ufsrv_protocol::{Command, CommandKind};

use crate::{Result, StoreError};

/// Initial retry delay in seconds.
const INITIAL_RETRY_DELAY_SECS: i64 = 30;

/// Maximum retry delay in seconds (8 minutes).
const MAX_RETRY_DELAY_SECS: i64 = 480;

/// Maximum number of failed attempts before permanent failure.
const MAX_RETRIES: u32 = 5;

/// Time after which an undelivered job expires (7 days).
const JOB_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Tree name for queued commands.
const OUTBOX_TREE: &str = "command_outbox";

/// Destination for commands whose delivery has to be retried later.
pub trait JobSink: Send + Sync {
    /// Queue `command` for delivery to `destination`.
    ///
    /// A command whose sub-command is still staged is finalized first.
    fn enqueue(&self, command: &Command, destination: &str) -> Result<JobId>;
}

/// Unique identifier for a queued job.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub [u8; 32]);

impl JobId {
    /// Generate a new random job ID using OS randomness.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create a JobId from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            StoreError::Serialization(format!(
                "Invalid JobId length: expected 32, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parse a JobId from its hex form.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| StoreError::Serialization(format!("Invalid JobId hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Get the raw bytes of this ID.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Format as hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JobId({}...)", &self.to_hex()[..8])
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Delivery status of a queued job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting to be sent.
    Pending,
    /// Handed to a sender (in-flight).
    Sending,
    /// Delivered to the server.
    Sent,
    /// Gave up after all retries.
    Failed,
}

impl JobStatus {
    /// Check if this status represents a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

/// Backoff and expiry settings of an outbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry, in seconds.
    pub initial_delay_secs: i64,
    /// Upper bound for the delay, in seconds.
    pub max_delay_secs: i64,
    /// Failed attempts after which a job is marked `Failed`.
    pub max_retries: u32,
    /// Age after which a job expires, in seconds.
    pub ttl_secs: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_secs: INITIAL_RETRY_DELAY_SECS,
            max_delay_secs: MAX_RETRY_DELAY_SECS,
            max_retries: MAX_RETRIES,
            ttl_secs: JOB_TTL_SECS,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `retry_count` failures.
    pub fn delay_for(&self, retry_count: u32) -> i64 {
        let exponent = retry_count.saturating_sub(1).min(30);
        self.initial_delay_secs
            .saturating_mul(1i64 << exponent)
            .min(self.max_delay_secs)
    }
}

/// A command queued for later delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Unique job identifier.
    pub id: JobId,
    /// Recipient the command is addressed to.
    pub destination: String,
    /// Kind of the queued command.
    pub kind: CommandKind,
    /// Opaque form of the command.
    pub opaque: Vec<u8>,
    /// Current delivery status.
    pub status: JobStatus,
    /// Unix timestamp when the job was created.
    pub created_at: i64,
    /// Unix timestamp when the job was last updated.
    pub updated_at: i64,
    /// Number of failed attempts.
    pub retry_count: u32,
    /// Unix timestamp for the next attempt, if one is scheduled.
    pub next_retry_at: Option<i64>,
    /// Reason given for the last failure.
    pub last_error: Option<String>,
}

impl QueuedJob {
    fn new(destination: &str, kind: CommandKind, opaque: Vec<u8>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: JobId::generate(),
            destination: destination.to_string(),
            kind,
            opaque,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            retry_count: 0,
            next_retry_at: None,
            last_error: None,
        }
    }

    /// Pending with no retry scheduled, or with the retry time reached.
    fn is_due(&self, now: i64) -> bool {
        matches!(self.status, JobStatus::Pending) && self.next_retry_at.is_none_or(|t| now >= t)
    }

    fn is_expired(&self, now: i64, ttl_secs: i64) -> bool {
        now - self.created_at > ttl_secs
    }
}

/// Counts of jobs by status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutboxStats {
    /// Jobs waiting to be sent.
    pub pending: usize,
    /// Jobs in flight.
    pub sending: usize,
    /// Delivered jobs.
    pub sent: usize,
    /// Permanently failed jobs.
    pub failed: usize,
}

impl OutboxStats {
    /// Total number of jobs.
    pub fn total(&self) -> usize {
        self.pending + self.sending + self.sent + self.failed
    }
}

/// `sled`-backed [`JobSink`].
pub struct CommandOutbox {
    jobs: sled::Tree,
    policy: RetryPolicy,
}

impl CommandOutbox {
    /// Create an outbox using the given database.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbox tree cannot be opened.
    pub fn new(db: &sled::Db) -> Result<Self> {
        let jobs = db
            .open_tree(OUTBOX_TREE)
            .map_err(|e| StoreError::Database(format!("Failed to open outbox tree: {}", e)))?;

        Ok(Self {
            jobs,
            policy: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The retry policy in use.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Get a job by ID.
    pub fn get(&self, id: &JobId) -> Result<Option<QueuedJob>> {
        match self.jobs.get(id.as_bytes()) {
            Ok(Some(value)) => Ok(Some(decode_job(&value)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Database(format!("Failed to get job: {}", e))),
        }
    }

    /// Jobs ready to be attempted at `now`, soonest first.
    ///
    /// Expired jobs are skipped.
    pub fn due(&self, now: i64) -> Result<Vec<QueuedJob>> {
        let ttl = self.policy.ttl_secs;
        let mut jobs: Vec<QueuedJob> = self
            .all_jobs()?
            .into_iter()
            .filter(|job| job.is_due(now) && !job.is_expired(now, ttl))
            .collect();

        jobs.sort_by_key(|job| (job.next_retry_at.unwrap_or(job.created_at), job.created_at));
        Ok(jobs)
    }

    /// Rebuild the queued command.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyNotFound`] for an unknown job and
    /// [`StoreError::Protocol`] if the stored blob no longer decodes.
    pub fn restore(&self, id: &JobId) -> Result<Command> {
        let job = self.load(id)?;
        Ok(Command::deserialize_opaque(&job.opaque)?)
    }

    /// Mark a job as handed to a sender.
    pub fn mark_sending(&self, id: &JobId) -> Result<()> {
        self.update(id, |job, _| job.status = JobStatus::Sending)
    }

    /// Mark a job as delivered.
    pub fn mark_sent(&self, id: &JobId) -> Result<()> {
        self.update(id, |job, _| {
            job.status = JobStatus::Sent;
            job.next_retry_at = None;
        })
    }

    /// Record a failed attempt and schedule the next one.
    ///
    /// Returns the resulting status: `Pending` with a new retry time, or
    /// `Failed` once the retry limit is reached.
    pub fn mark_failed(&self, id: &JobId, reason: &str) -> Result<JobStatus> {
        let policy = self.policy;
        let mut status = JobStatus::Pending;

        self.update(id, |job, now| {
            job.retry_count += 1;
            job.last_error = Some(reason.to_string());

            if job.retry_count >= policy.max_retries {
                job.status = JobStatus::Failed;
                job.next_retry_at = None;
                warn!(job = %job.id, retries = job.retry_count, reason, "Job failed permanently");
            } else {
                let delay = policy.delay_for(job.retry_count);
                job.status = JobStatus::Pending;
                job.next_retry_at = Some(now + delay);
                info!(job = %job.id, retries = job.retry_count, delay, reason, "Job rescheduled");
            }
            status = job.status;
        })?;

        Ok(status)
    }

    /// Remove a job.
    ///
    /// Returns whether the job existed.
    pub fn remove(&self, id: &JobId) -> Result<bool> {
        let removed = self
            .jobs
            .remove(id.as_bytes())
            .map_err(|e| StoreError::Database(format!("Failed to remove job: {}", e)))?;
        Ok(removed.is_some())
    }

    /// Remove jobs older than the TTL.
    ///
    /// Returns the number of removed jobs.
    pub fn cleanup_expired(&self, now: i64) -> Result<usize> {
        let ttl = self.policy.ttl_secs;
        let mut removed = 0;

        for job in self.all_jobs()? {
            if job.is_expired(now, ttl) && self.remove(&job.id)? {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "Removed expired jobs");
        }
        Ok(removed)
    }

    /// Count jobs by status.
    pub fn stats(&self) -> Result<OutboxStats> {
        let mut stats = OutboxStats::default();
        for job in self.all_jobs()? {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Sending => stats.sending += 1,
                JobStatus::Sent => stats.sent += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the outbox is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn all_jobs(&self) -> Result<Vec<QueuedJob>> {
        let mut jobs = Vec::new();
        for result in self.jobs.iter() {
            let (_, value) = result
                .map_err(|e| StoreError::Database(format!("Failed to iterate outbox: {}", e)))?;
            jobs.push(decode_job(&value)?);
        }
        Ok(jobs)
    }

    fn load(&self, id: &JobId) -> Result<QueuedJob> {
        self.get(id)?
            .ok_or_else(|| StoreError::KeyNotFound(format!("Job not found: {}", id)))
    }

    fn store(&self, job: &QueuedJob) -> Result<()> {
        let serialized = bincode::serialize(job)
            .map_err(|e| StoreError::Serialization(format!("Failed to serialize job: {}", e)))?;

        self.jobs
            .insert(job.id.as_bytes(), serialized)
            .map_err(|e| StoreError::Database(format!("Failed to store job: {}", e)))?;
        Ok(())
    }

    fn update<F>(&self, id: &JobId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut QueuedJob, i64),
    {
        let mut job = self.load(id)?;
        let now = Utc::now().timestamp();
        apply(&mut job, now);
        job.updated_at = now;
        self.store(&job)
    }
}

impl JobSink for CommandOutbox {
    fn enqueue(&self, command: &Command, destination: &str) -> Result<JobId> {
        let opaque = if command.is_sub_built() {
            command.serialize_opaque()?
        } else {
            let mut finalized = command.clone();
            finalized.finalize();
            finalized.serialize_opaque()?
        };

        let job = QueuedJob::new(destination, command.kind(), opaque);
        self.store(&job)?;

        debug!(job = %job.id, kind = %job.kind, destination, "Queued command");
        Ok(job.id)
    }
}

fn decode_job(value: &[u8]) -> Result<QueuedJob> {
    bincode::deserialize(value)
        .map_err(|e| StoreError::Serialization(format!("Failed to deserialize job: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use ufsrv_protocol::wire::{MessageCommand, ReceiptCommand};

    fn create_test_db() -> (sled::Db, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = sled::open(temp_dir.path()).unwrap();
        (db, temp_dir)
    }

    fn create_test_outbox() -> (CommandOutbox, sled::Db, TempDir) {
        let (db, temp_dir) = create_test_db();
        let outbox = CommandOutbox::new(&db).unwrap();
        (outbox, db, temp_dir)
    }

    fn receipt_command() -> Command {
        Command::from_built(ReceiptCommand {
            fid: 7,
            ..Default::default()
        })
    }

    // ========================================================================
    // JobId Tests
    // ========================================================================

    #[test]
    fn test_job_id_generate_unique() {
        assert_ne!(JobId::generate(), JobId::generate());
    }

    #[test]
    fn test_job_id_hex() {
        let id = JobId::generate();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(JobId::from_hex(&hex).unwrap(), id);
        assert_eq!(format!("{}", id), hex);
        assert!(format!("{:?}", id).starts_with("JobId("));
    }

    #[test]
    fn test_job_id_invalid_length() {
        assert!(matches!(
            JobId::from_bytes(&[0u8; 16]),
            Err(StoreError::Serialization(_))
        ));
        assert!(JobId::from_hex("zz").is_err());
    }

    // ========================================================================
    // Retry Policy Tests
    // ========================================================================

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), 30);
        assert_eq!(policy.delay_for(2), 60);
        assert_eq!(policy.delay_for(3), 120);
        assert_eq!(policy.delay_for(4), 240);
        assert_eq!(policy.delay_for(5), 480);
        assert_eq!(policy.delay_for(9), 480);
        assert_eq!(policy.delay_for(200), 480);
    }

    #[test]
    fn test_status_terminal() {
        assert!(JobStatus::Sent.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Sending.is_terminal());
    }

    // ========================================================================
    // Enqueue / Restore Tests
    // ========================================================================

    #[test]
    fn test_enqueue_and_get() {
        let (outbox, _db, _dir) = create_test_outbox();

        let id = outbox.enqueue(&receipt_command(), "uid-ada").unwrap();
        let job = outbox.get(&id).unwrap().unwrap();

        assert_eq!(job.destination, "uid-ada");
        assert_eq!(job.kind, CommandKind::Receipt);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 0);
        assert!(job.next_retry_at.is_none());
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn test_restore_keeps_flags() {
        let (outbox, _db, _dir) = create_test_outbox();
        let command = receipt_command()
            .with_e2ee(false)
            .with_integrity_sensitive(true);

        let id = outbox.enqueue(&command, "uid-ada").unwrap();
        let restored = outbox.restore(&id).unwrap();

        assert_eq!(restored, command);
        assert!(!restored.is_e2ee());
        assert!(restored.is_integrity_sensitive());
    }

    #[test]
    fn test_enqueue_staged_finalizes() {
        let (outbox, _db, _dir) = create_test_outbox();
        let command = Command::from_builder(MessageCommand::default());

        let id = outbox.enqueue(&command, "uid-ada").unwrap();
        let restored = outbox.restore(&id).unwrap();

        assert!(restored.is_wire_built());
        assert_eq!(restored.kind(), CommandKind::Message);
    }

    #[test]
    fn test_restore_unknown_job() {
        let (outbox, _db, _dir) = create_test_outbox();
        assert!(matches!(
            outbox.restore(&JobId::generate()),
            Err(StoreError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_restore_corrupt_blob() {
        let (outbox, _db, _dir) = create_test_outbox();
        let job = QueuedJob::new("uid-ada", CommandKind::Receipt, vec![0xff, 0x00]);
        outbox.store(&job).unwrap();

        assert!(matches!(
            outbox.restore(&job.id),
            Err(StoreError::Protocol(_))
        ));
    }

    // ========================================================================
    // Scheduling Tests
    // ========================================================================

    #[test]
    fn test_new_job_is_due() {
        let (outbox, _db, _dir) = create_test_outbox();
        let id = outbox.enqueue(&receipt_command(), "uid-ada").unwrap();

        let due = outbox.due(Utc::now().timestamp()).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id);
    }

    #[test]
    fn test_mark_failed_schedules_retry() {
        let (outbox, _db, _dir) = create_test_outbox();
        let id = outbox.enqueue(&receipt_command(), "uid-ada").unwrap();

        let status = outbox.mark_failed(&id, "no session").unwrap();
        assert_eq!(status, JobStatus::Pending);

        let job = outbox.get(&id).unwrap().unwrap();
        let next = job.next_retry_at.unwrap();
        assert_eq!(job.retry_count, 1);
        assert_eq!(next, job.updated_at + 30);
        assert_eq!(job.last_error.as_deref(), Some("no session"));

        assert!(outbox.due(job.updated_at).unwrap().is_empty());
        assert_eq!(outbox.due(next).unwrap().len(), 1);
    }

    #[test]
    fn test_mark_failed_until_permanent() {
        let (outbox, _db, _dir) = create_test_outbox();
        let id = outbox.enqueue(&receipt_command(), "uid-ada").unwrap();

        for _ in 0..MAX_RETRIES - 1 {
            assert_eq!(outbox.mark_failed(&id, "timeout").unwrap(), JobStatus::Pending);
        }
        assert_eq!(outbox.mark_failed(&id, "timeout").unwrap(), JobStatus::Failed);

        let job = outbox.get(&id).unwrap().unwrap();
        assert_eq!(job.retry_count, MAX_RETRIES);
        assert!(job.next_retry_at.is_none());
        assert!(outbox.due(i64::MAX / 2).unwrap().is_empty());
    }

    #[test]
    fn test_custom_policy() {
        let (db, _dir) = create_test_db();
        let outbox = CommandOutbox::new(&db).unwrap().with_policy(RetryPolicy {
            initial_delay_secs: 5,
            max_delay_secs: 10,
            max_retries: 2,
            ttl_secs: 60,
        });
        let id = outbox.enqueue(&receipt_command(), "uid-ada").unwrap();

        outbox.mark_failed(&id, "x").unwrap();
        let job = outbox.get(&id).unwrap().unwrap();
        assert_eq!(job.next_retry_at, Some(job.updated_at + 5));

        assert_eq!(outbox.mark_failed(&id, "x").unwrap(), JobStatus::Failed);
    }

    #[test]
    fn test_sending_and_sent_not_due() {
        let (outbox, _db, _dir) = create_test_outbox();
        let first = outbox.enqueue(&receipt_command(), "uid-ada").unwrap();
        let second = outbox.enqueue(&receipt_command(), "uid-bob").unwrap();

        outbox.mark_sending(&first).unwrap();
        outbox.mark_sent(&second).unwrap();

        assert!(outbox.due(Utc::now().timestamp()).unwrap().is_empty());
        assert_eq!(
            outbox.get(&second).unwrap().unwrap().status,
            JobStatus::Sent
        );
    }

    #[test]
    fn test_mark_unknown_job() {
        let (outbox, _db, _dir) = create_test_outbox();
        assert!(matches!(
            outbox.mark_sent(&JobId::generate()),
            Err(StoreError::KeyNotFound(_))
        ));
    }

    // ========================================================================
    // Expiry / Stats Tests
    // ========================================================================

    #[test]
    fn test_expired_jobs() {
        let (outbox, _db, _dir) = create_test_outbox();
        let id = outbox.enqueue(&receipt_command(), "uid-ada").unwrap();
        let created = outbox.get(&id).unwrap().unwrap().created_at;
        let later = created + JOB_TTL_SECS + 1;

        assert!(outbox.due(later).unwrap().is_empty());
        assert_eq!(outbox.cleanup_expired(created).unwrap(), 0);
        assert_eq!(outbox.cleanup_expired(later).unwrap(), 1);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_stats() {
        let (outbox, _db, _dir) = create_test_outbox();
        let a = outbox.enqueue(&receipt_command(), "a").unwrap();
        let b = outbox.enqueue(&receipt_command(), "b").unwrap();
        let _c = outbox.enqueue(&receipt_command(), "c").unwrap();

        outbox.mark_sent(&a).unwrap();
        outbox.mark_sending(&b).unwrap();

        let stats = outbox.stats().unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.sending, 1);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_remove() {
        let (outbox, _db, _dir) = create_test_outbox();
        let id = outbox.enqueue(&receipt_command(), "uid-ada").unwrap();

        assert!(outbox.remove(&id).unwrap());
        assert!(!outbox.remove(&id).unwrap());
        assert!(outbox.get(&id).unwrap().is_none());
    }

    #[test]
    fn test_job_sink_object() {
        let (outbox, _db, _dir) = create_test_outbox();
        let sink: &dyn JobSink = &outbox;
        let id = sink.enqueue(&receipt_command(), "uid-ada").unwrap();
        assert!(outbox.get(&id).unwrap().is_some());
    }
}
