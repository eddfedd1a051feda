//! ID resolver module
//!
//! Resolves job ID prefixes against the tracked jobs so users can type a
//! short, unambiguous prefix instead of a full UUID.

use anyhow::{Result, anyhow};
use coursetrack_core::dto::job::TrackedJob;
use uuid::Uuid;

/// Job reference typed by the user: a full UUID or a prefix of one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRef {
    Full(Uuid),
    Prefix(String),
}

impl JobRef {
    pub fn parse(input: &str) -> Self {
        match Uuid::parse_str(input) {
            Ok(uuid) => JobRef::Full(uuid),
            Err(_) => JobRef::Prefix(input.trim().to_lowercase()),
        }
    }
}

/// Resolve a job reference to a full UUID
///
/// A full UUID is returned as is, even if the job is not tracked; the
/// tracker reports unknown jobs itself.
///
/// # Errors
/// Returns an error if:
/// - The prefix is empty
/// - No job matches the prefix
/// - Multiple jobs match the prefix (ambiguous)
pub fn resolve_job_id(jobs: &[TrackedJob], job_ref: &JobRef) -> Result<Uuid> {
    let prefix = match job_ref {
        JobRef::Full(uuid) => return Ok(*uuid),
        JobRef::Prefix(prefix) if prefix.is_empty() => {
            return Err(anyhow!("Job ID cannot be empty"));
        }
        JobRef::Prefix(prefix) => prefix,
    };

    let matches: Vec<Uuid> = jobs
        .iter()
        .map(|tracked| tracked.job.id)
        .filter(|id| id.to_string().starts_with(prefix.as_str()))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coursetrack_core::domain::job::Job;

    fn tracked(id: &str) -> TrackedJob {
        let job = Job::new(Uuid::parse_str(id).unwrap(), Uuid::nil(), Utc::now());
        TrackedJob {
            effective_status: job.status,
            job,
            health_status: None,
            effectively_complete: false,
            success_rate: None,
            recommended_action: None,
            display_progress: 0,
        }
    }

    fn jobs() -> Vec<TrackedJob> {
        vec![
            tracked("a1b2c3d4-0000-4000-8000-000000000001"),
            tracked("a1b2ffff-0000-4000-8000-000000000002"),
            tracked("bbbbbbbb-0000-4000-8000-000000000003"),
        ]
    }

    #[test]
    fn test_unique_prefix() {
        let id = resolve_job_id(&jobs(), &JobRef::parse("A1B2C")).unwrap();
        assert_eq!(id.to_string(), "a1b2c3d4-0000-4000-8000-000000000001");
    }

    #[test]
    fn test_ambiguous_prefix() {
        let err = resolve_job_id(&jobs(), &JobRef::parse("a1b2")).unwrap_err();
        assert!(err.to_string().starts_with("Ambiguous prefix 'a1b2'"));
    }

    #[test]
    fn test_no_match() {
        let err = resolve_job_id(&jobs(), &JobRef::parse("ffff")).unwrap_err();
        assert!(err.to_string().contains("No job found"));
    }

    #[test]
    fn test_full_uuid_bypasses_lookup() {
        let id = Uuid::new_v4();
        assert_eq!(resolve_job_id(&[], &JobRef::Full(id)).unwrap(), id);
        assert_eq!(JobRef::parse(&id.to_string()), JobRef::Full(id));
        assert_eq!(JobRef::parse("  "), JobRef::Prefix(String::new()));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        assert!(resolve_job_id(&jobs(), &JobRef::Prefix(String::new())).is_err());
    }
}
