//! Competitor rankings and scraped contacts.
//!
//! The service does the windowed aggregation; this module ranks, splits and joins
//! what it returns for display.

use crate::api::{CompetitionApi, ContactApi};
use crate::error::Result;
use crate::metrics;
use crate::model::{CompetitorDetails, CompetitorId, CompetitorRanking, Contact};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_TOP_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionTier {
    Strong,
    Contested,
    Weak,
}

impl PositionTier {
    /// Average slot 2 or better is strong, up to 3 contested, anything lower weak.
    pub fn for_average(average_position: f64) -> Self {
        if average_position <= 2.0 {
            PositionTier::Strong
        } else if average_position <= 3.0 {
            PositionTier::Contested
        } else {
            PositionTier::Weak
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PositionTier::Strong => "strong",
            PositionTier::Contested => "contested",
            PositionTier::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorShare {
    pub id: CompetitorId,
    pub domain: String,
    pub appearances: u64,
    /// Percent of all appearances in the ranking.
    pub share: f64,
    pub average_position: f64,
    pub tier: PositionTier,
}

/// Share of appearances per competitor, in the service's ranking order.
pub fn appearance_shares(rankings: &[CompetitorRanking]) -> Vec<CompetitorShare> {
    let total: u64 = rankings.iter().map(|r| r.appearances).sum();
    rankings
        .iter()
        .map(|r| CompetitorShare {
            id: r.competitor.id,
            domain: r.competitor.domain.clone(),
            appearances: r.appearances,
            share: metrics::rate(r.appearances, total),
            average_position: r.average_position,
            tier: PositionTier::for_average(r.average_position),
        })
        .collect()
}

/// Sort the per-keyword analysis: most appearances first, then better position, then text.
pub fn rank_keywords(details: &mut CompetitorDetails) {
    details.keyword_analysis.sort_by(|a, b| {
        b.appearances
            .cmp(&a.appearances)
            .then(a.average_position.total_cmp(&b.average_position))
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactKindCount {
    pub kind: String,
    pub contacts: usize,
    pub times_found: u64,
}

/// Contacts grouped by normalized type, most contacts first.
pub fn contact_kinds(contacts: &[Contact]) -> Vec<ContactKindCount> {
    let mut groups: BTreeMap<String, (usize, u64)> = BTreeMap::new();
    for contact in contacts {
        let entry = groups
            .entry(contact.kind.trim().to_lowercase())
            .or_default();
        entry.0 += 1;
        entry.1 += contact.times_found;
    }
    let mut kinds: Vec<ContactKindCount> = groups
        .into_iter()
        .map(|(kind, (contacts, times_found))| ContactKindCount {
            kind,
            contacts,
            times_found,
        })
        .collect();
    // Stable sort keeps the alphabetical order among equal counts.
    kinds.sort_by(|a, b| b.contacts.cmp(&a.contacts));
    kinds
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetitorProfile {
    pub details: CompetitorDetails,
    /// `None` when the contact lookup failed; the details are still shown.
    pub contacts: Option<Vec<Contact>>,
}

/// Details and contacts of one competitor, fetched concurrently.
pub async fn load_profile<A: CompetitionApi + ContactApi>(
    api: &A,
    id: CompetitorId,
    days: u32,
) -> Result<CompetitorProfile> {
    let (details, contacts) =
        futures::join!(api.competitor_details(id, days), api.competitor_contacts(id));
    let mut details = details?;
    rank_keywords(&mut details);

    let contacts = match contacts {
        Ok(list) => Some(list),
        Err(e) => {
            warn!(competitor_id = %id, error = %e, "contact lookup failed");
            None
        }
    };
    Ok(CompetitorProfile { details, contacts })
}
