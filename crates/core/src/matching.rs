//! Pairing compatibility rules.
//!
//! The Pairing Transaction in the `db` crate does the locking and writes;
//! these functions decide which of the locked rows may be paired. Selection
//! is first-passing, not best-scoring: the pool is walked in FIFO order and
//! the first candidate that clears every filter wins.

use std::collections::HashSet;

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Wanted-gender value meaning "no preference".
pub const WANT_ANY: &str = "any";

/// How many compatible waiting entries a single pairing attempt reads.
///
/// A small bound keeps the transaction's read set (and lock footprint)
/// small. A pool with no eligible partner yields "no match yet", never a
/// relaxed match.
pub const DEFAULT_CANDIDATE_POOL_SIZE: i64 = 5;

/// Maximum length of a gender / wanted-gender value.
const MAX_PREFERENCE_LEN: usize = 32;

/// Maximum number of identities a single queue entry may exclude.
pub const MAX_EXCLUSIONS: usize = 500;

// ---------------------------------------------------------------------------
// Candidate view
// ---------------------------------------------------------------------------

/// A waiting participant as seen by the pairing rules.
///
/// Only built from queue entries whose preferences are fully populated;
/// malformed entries are rejected before they get here.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub participant_id: DbId,
    pub gender: &'a str,
    pub want_gender: &'a str,
    pub exclusions: &'a [DbId],
}

impl<'a> Candidate<'a> {
    /// Build a candidate from optional preference columns.
    ///
    /// Returns `None` when either preference is missing or blank; such an
    /// entry must be flagged as errored instead of paired.
    pub fn from_parts(
        participant_id: DbId,
        gender: Option<&'a str>,
        want_gender: Option<&'a str>,
        exclusions: &'a [DbId],
    ) -> Option<Self> {
        let gender = gender.filter(|g| !g.trim().is_empty())?;
        let want_gender = want_gender.filter(|w| !w.trim().is_empty())?;
        Some(Self {
            participant_id,
            gender,
            want_gender,
            exclusions,
        })
    }

    fn wants(&self, gender: &str) -> bool {
        self.want_gender == WANT_ANY || self.want_gender == gender
    }

    fn excludes(&self, other: DbId) -> bool {
        self.exclusions.contains(&other)
    }
}

// ---------------------------------------------------------------------------
// Block set
// ---------------------------------------------------------------------------

/// Active block relationships relevant to one pairing attempt.
///
/// Records are directional in storage, but a block in either direction
/// forbids the pairing, so pairs are stored unordered.
#[derive(Debug, Default, Clone)]
pub struct BlockSet {
    pairs: HashSet<(DbId, DbId)>,
}

impl BlockSet {
    /// Build from `(blocker, blocked)` records.
    pub fn from_directed<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (DbId, DbId)>,
    {
        let pairs = records.into_iter().map(|(a, b)| unordered(a, b)).collect();
        Self { pairs }
    }

    /// True if either identity blocks the other.
    pub fn blocks_either(&self, a: DbId, b: DbId) -> bool {
        self.pairs.contains(&unordered(a, b))
    }
}

fn unordered(a: DbId, b: DbId) -> (DbId, DbId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Gender compatibility of `candidate` with the seeker.
///
/// When the seeker wants anyone, only the candidate's preference matters.
/// Otherwise the candidate must be of the wanted gender *and* want the
/// seeker's gender (or anyone).
pub fn is_compatible(seeker: &Candidate<'_>, candidate: &Candidate<'_>) -> bool {
    if seeker.want_gender == WANT_ANY {
        candidate.wants(seeker.gender)
    } else {
        candidate.gender == seeker.want_gender && candidate.wants(seeker.gender)
    }
}

/// True if the two participants must never be placed in the same room.
pub fn is_excluded(a: &Candidate<'_>, b: &Candidate<'_>, blocks: &BlockSet) -> bool {
    a.participant_id == b.participant_id
        || a.excludes(b.participant_id)
        || b.excludes(a.participant_id)
        || blocks.blocks_either(a.participant_id, b.participant_id)
}

/// Walk `pool` in order and return the first candidate the seeker may be
/// paired with.
pub fn first_eligible<'p, 'a>(
    seeker: &Candidate<'_>,
    pool: &'p [Candidate<'a>],
    blocks: &BlockSet,
) -> Option<&'p Candidate<'a>> {
    pool.iter()
        .find(|c| is_compatible(seeker, c) && !is_excluded(seeker, c, blocks))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the preferences supplied on enqueue.
///
/// Rules:
/// - Both values must be non-empty and at most `MAX_PREFERENCE_LEN` chars.
/// - `gender` is the participant's own and may not be `"any"`.
pub fn validate_preferences(gender: &str, want_gender: &str) -> Result<(), CoreError> {
    for (field, value) in [("gender", gender), ("want_gender", want_gender)] {
        if value.trim().is_empty() {
            return Err(CoreError::Validation(format!("{field} must not be empty")));
        }
        if value.len() > MAX_PREFERENCE_LEN {
            return Err(CoreError::Validation(format!(
                "{field} must not exceed {MAX_PREFERENCE_LEN} characters"
            )));
        }
    }
    if gender == WANT_ANY {
        return Err(CoreError::Validation(format!(
            "gender must be a concrete value, not \"{WANT_ANY}\""
        )));
    }
    Ok(())
}

/// Deduplicate an exclusion list and drop the participant's own id.
///
/// Order of first appearance is preserved.
pub fn normalize_exclusions(
    participant_id: DbId,
    exclusions: &[DbId],
) -> Result<Vec<DbId>, CoreError> {
    let mut seen = HashSet::with_capacity(exclusions.len());
    let normalized: Vec<DbId> = exclusions
        .iter()
        .copied()
        .filter(|id| *id != participant_id && seen.insert(*id))
        .collect();

    if normalized.len() > MAX_EXCLUSIONS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_EXCLUSIONS} exclusions are allowed"
        )));
    }
    Ok(normalized)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
