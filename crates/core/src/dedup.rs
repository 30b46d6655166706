use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::public_quote::{PublicQuote, PublicQuoteId, PublicQuoteStatus};

/// Contact block of an inbound public submission. When a recent lead is
/// promoted these values overwrite the stored ones (latest write wins).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionContact {
    pub requester_name: String,
    pub requester_email: String,
    pub requester_phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub distance_km: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DedupDecision {
    /// A recent anonymous lead from the same address exists: flip it to a
    /// contact request in place rather than minting a second row.
    PromoteExisting(PublicQuoteId),
    CreateNew,
}

/// Decides whether a contact request merges into a recent lead. Candidates
/// are caller-fetched rows sharing the submission's normalized email; only
/// pending, not-yet-contact-requested rows inside the window qualify, and
/// the freshest one wins. Two racing submissions may both see `CreateNew`
/// under weak isolation — that duplicate is tolerated by design.
pub fn decide(
    candidates: &[PublicQuote],
    now: DateTime<Utc>,
    window: Duration,
) -> DedupDecision {
    candidates
        .iter()
        .filter(|candidate| {
            !candidate.requested_contact
                && candidate.status == PublicQuoteStatus::Pending
                && now - candidate.created_at <= window
        })
        .max_by_key(|candidate| candidate.created_at)
        .map(|candidate| DedupDecision::PromoteExisting(candidate.id))
        .unwrap_or(DedupDecision::CreateNew)
}

/// Applies an in-place promotion: the row becomes a web quote and its
/// mutable contact/address fields take the new submission's values.
pub fn promote(record: &mut PublicQuote, submission: &SubmissionContact, now: DateTime<Utc>) {
    record.requested_contact = true;
    record.requester_name = submission.requester_name.clone();
    record.requester_email = submission.requester_email.clone();
    record.requester_phone = submission.requester_phone.clone();
    record.address = submission.address.clone();
    record.city = submission.city.clone();
    record.province = submission.province.clone();
    record.distance_km = submission.distance_km;
    record.updated_at = now;
}
