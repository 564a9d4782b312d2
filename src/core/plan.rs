//! Purpose: Plan equimolar sub-pools from measured samples without performing any I/O.
//! Exports: `plan_pools`, `PoolParams`, `PoolType`, `Advisory`, `PoolCandidate`,
//! `SampleAssignment`, `PoolSummary`, `PoolingPlan`.
//! Role: Pure planning layer used by the CLI to turn library molarities into a pipetting plan.
//! Invariants: No side effects; output depends only on the candidate list and params.
//! Invariants: Every candidate lands in exactly one pool; pools are final once closed.
//! Invariants: All stored volumes and running sums are rounded to two decimals.
use crate::core::error::{Error, ErrorKind};
use crate::core::sample::round2;

/// Library molarity above which a sample needs the concentrated bound table.
pub const STRONG_THRESHOLD_NMOL: f64 = 5.0;
pub const STRONG_MIN_UL: f64 = 3.0;
pub const STRONG_MAX_UL: f64 = 7.0;
pub const WEAK_MIN_UL: f64 = 10.0;
pub const WEAK_MAX_UL: f64 = 20.0;
/// Smallest volume a pool is seeded with, regardless of type.
pub const SEED_FLOOR_UL: f64 = 3.0;
/// Absolute pipetting window checked for seed volumes.
pub const PIPETTE_FLOOR_UL: f64 = 1.0;
/// Advisory envelope for required member volumes; violations are flagged,
/// not fatal.
pub const ADVISORY_MIN_UL: f64 = 3.0;
pub const ADVISORY_MAX_UL: f64 = 20.0;
pub const POOL_MAX_UL: f64 = 150.0;
pub const POOL_MIN_UL: f64 = 100.0;
pub const DEFAULT_MAX_SAMPLES_PER_POOL: usize = 48;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolType {
    Strong,
    Weak,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeBounds {
    pub min: f64,
    pub max: f64,
}

impl PoolType {
    pub fn from_molarity(molarity: f64) -> Self {
        if molarity > STRONG_THRESHOLD_NMOL {
            PoolType::Strong
        } else {
            PoolType::Weak
        }
    }

    pub fn bounds(self) -> VolumeBounds {
        match self {
            PoolType::Strong => VolumeBounds {
                min: STRONG_MIN_UL,
                max: STRONG_MAX_UL,
            },
            PoolType::Weak => VolumeBounds {
                min: WEAK_MIN_UL,
                max: WEAK_MAX_UL,
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PoolType::Strong => "strong",
            PoolType::Weak => "weak",
        }
    }
}

/// Non-fatal annotation attached to an assignment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Advisory {
    TooStrong,
    TooWeak,
    PoolBelowMinimum,
}

impl Advisory {
    pub fn as_str(self) -> &'static str {
        match self {
            Advisory::TooStrong => "Too strong - requires <3μl",
            Advisory::TooWeak => "Too weak - requires >20μl",
            Advisory::PoolBelowMinimum => "Pool below 100μl minimum",
        }
    }
}

/// One poolable sample: the caller guarantees a finite, positive molarity in
/// nmol/l. `id` is the caller's key back into its own sample list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoolCandidate {
    pub id: usize,
    pub molarity: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolParams {
    pub max_samples_per_pool: usize,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            max_samples_per_pool: DEFAULT_MAX_SAMPLES_PER_POOL,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampleAssignment {
    pub id: usize,
    pub pool: u32,
    /// Volume this sample contributes, µl, two decimals.
    pub volume: f64,
    /// Molar target of the pool (seed molarity times seed volume), two decimals.
    pub target: f64,
    pub pool_volume: f64,
    pub pool_samples: usize,
    pub advisories: Vec<Advisory>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoolSummary {
    pub number: u32,
    pub pool_type: PoolType,
    pub volume: f64,
    pub samples: usize,
}

/// Complete plan: assignments grouped by pool (strongest member first inside
/// each pool), plus one summary per pool in creation order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoolingPlan {
    pub assignments: Vec<SampleAssignment>,
    pub pools: Vec<PoolSummary>,
}

impl PoolingPlan {
    pub fn assignment_for(&self, id: usize) -> Option<&SampleAssignment> {
        self.assignments
            .iter()
            .find(|assignment| assignment.id == id)
    }
}

#[derive(Debug, Default)]
struct Draft {
    pool: u32,
    volume: f64,
    target: f64,
    bound_note: Option<Advisory>,
    below_minimum: bool,
    pool_volume: f64,
    pool_samples: usize,
}

/// Greedy equimolar allocation.
///
/// Candidates are taken strongest-first; each pool is seeded by the strongest
/// unassigned sample and filled in a single scan over the rest. A candidate
/// joins when its required volume (pool target divided by its molarity) fits
/// its own type bounds, the pool stays within capacity, and the member cap is
/// not reached. Required volumes outside the advisory envelope leave a bound
/// note on the candidate; the latest scan wins, and the note survives into
/// the candidate's eventual assignment even when it later seeds its own pool.
pub fn plan_pools(candidates: &[PoolCandidate], params: &PoolParams) -> Result<PoolingPlan, Error> {
    if params.max_samples_per_pool == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("max samples per pool must be at least 1"));
    }
    for candidate in candidates {
        if !candidate.molarity.is_finite() || candidate.molarity <= 0.0 {
            return Err(Error::new(ErrorKind::Data).with_message(format!(
                "candidate {} has unusable library molarity {}",
                candidate.id, candidate.molarity
            )));
        }
    }

    // Stable descending sort: equal molarities keep their input order.
    let mut unassigned: Vec<usize> = (0..candidates.len()).collect();
    unassigned.sort_by(|&a, &b| candidates[b].molarity.total_cmp(&candidates[a].molarity));

    let mut drafts: Vec<Draft> = candidates.iter().map(|_| Draft::default()).collect();
    let mut pools: Vec<PoolSummary> = Vec::new();
    let mut pool_members: Vec<Vec<usize>> = Vec::new();

    while !unassigned.is_empty() {
        let seed = unassigned.remove(0);
        let seed_molarity = candidates[seed].molarity;
        let pool_type = PoolType::from_molarity(seed_molarity);
        let bounds = pool_type.bounds();
        let number = pools.len() as u32 + 1;

        let seed_volume = round2(SEED_FLOOR_UL.max(bounds.min));
        let target = seed_molarity * seed_volume;

        drafts[seed].pool = number;
        drafts[seed].volume = seed_volume;
        drafts[seed].target = round2(target);
        if seed_volume < PIPETTE_FLOOR_UL {
            drafts[seed].bound_note = Some(Advisory::TooStrong);
        } else if seed_volume > ADVISORY_MAX_UL {
            drafts[seed].bound_note = Some(Advisory::TooWeak);
        }

        let mut members = vec![seed];
        let mut volume = seed_volume;
        let mut still_unassigned = Vec::with_capacity(unassigned.len());
        for idx in unassigned {
            let molarity = candidates[idx].molarity;
            let required = round2(target / molarity);
            let member_type = PoolType::from_molarity(molarity);
            let member_bounds = member_type.bounds();
            let fits = member_type == pool_type
                && required >= member_bounds.min
                && required <= member_bounds.max
                && round2(volume + required) <= POOL_MAX_UL
                && members.len() < params.max_samples_per_pool;
            if fits {
                volume = round2(volume + required);
                drafts[idx].pool = number;
                drafts[idx].volume = required;
                drafts[idx].target = round2(target);
                members.push(idx);
            } else {
                if required < ADVISORY_MIN_UL {
                    drafts[idx].bound_note = Some(Advisory::TooStrong);
                } else if required > ADVISORY_MAX_UL {
                    drafts[idx].bound_note = Some(Advisory::TooWeak);
                }
                still_unassigned.push(idx);
            }
        }
        unassigned = still_unassigned;

        let below_minimum = volume < POOL_MIN_UL;
        for &idx in &members {
            drafts[idx].pool_volume = volume;
            drafts[idx].pool_samples = members.len();
            drafts[idx].below_minimum = below_minimum;
        }
        pools.push(PoolSummary {
            number,
            pool_type,
            volume,
            samples: members.len(),
        });
        pool_members.push(members);
    }

    let mut assignments = Vec::with_capacity(candidates.len());
    for members in pool_members {
        for idx in members {
            let draft = &drafts[idx];
            let mut advisories = Vec::new();
            if let Some(note) = draft.bound_note {
                advisories.push(note);
            }
            if draft.below_minimum {
                advisories.push(Advisory::PoolBelowMinimum);
            }
            assignments.push(SampleAssignment {
                id: candidates[idx].id,
                pool: draft.pool,
                volume: draft.volume,
                target: draft.target,
                pool_volume: draft.pool_volume,
                pool_samples: draft.pool_samples,
                advisories,
            });
        }
    }

    Ok(PoolingPlan { assignments, pools })
}

#[cfg(test)]
mod tests {
    use super::{
        Advisory, POOL_MAX_UL, PoolCandidate, PoolParams, PoolType, plan_pools,
    };
    use crate::core::sample::round2;

    struct XorShift64 {
        state: u64,
    }

    impl XorShift64 {
        fn new(seed: u64) -> Self {
            Self { state: seed }
        }

        fn next_u64(&mut self) -> u64 {
            let mut x = self.state;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.state = x;
            x
        }

        fn next_range(&mut self, max: usize) -> usize {
            if max == 0 {
                return 0;
            }
            (self.next_u64() % max as u64) as usize
        }
    }

    fn candidates_from(molarities: &[f64]) -> Vec<PoolCandidate> {
        molarities
            .iter()
            .enumerate()
            .map(|(id, &molarity)| PoolCandidate { id, molarity })
            .collect()
    }

    #[test]
    fn strong_pair_pools_together_and_weak_pair_separates() {
        let candidates = candidates_from(&[20.0, 18.0, 0.4, 0.3]);
        let plan = plan_pools(&candidates, &PoolParams::default()).expect("plan");

        assert_eq!(plan.pools.len(), 2);
        assert_eq!(plan.pools[0].pool_type, PoolType::Strong);
        assert_eq!(plan.pools[0].samples, 2);
        assert_eq!(plan.pools[0].volume, 6.33);
        assert_eq!(plan.pools[1].pool_type, PoolType::Weak);
        assert_eq!(plan.pools[1].samples, 2);
        assert_eq!(plan.pools[1].volume, 23.33);

        let seed = plan.assignment_for(0).expect("seed");
        assert_eq!(seed.pool, 1);
        assert_eq!(seed.volume, 3.0);
        assert_eq!(seed.target, 60.0);

        let second = plan.assignment_for(1).expect("second");
        assert_eq!(second.pool, 1);
        assert_eq!(second.volume, 3.33);

        let weak_seed = plan.assignment_for(2).expect("weak seed");
        assert_eq!(weak_seed.pool, 2);
        assert_eq!(weak_seed.volume, 10.0);
        assert_eq!(weak_seed.target, 4.0);

        let weak_member = plan.assignment_for(3).expect("weak member");
        assert_eq!(weak_member.pool, 2);
        assert_eq!(weak_member.volume, 13.33);

        // Both weak samples were scanned for pool 1 first, where required
        // volumes of 150 and 200 left a bound note each. The notes survive
        // their later assignment to pool 2.
        assert_eq!(seed.advisories, vec![Advisory::PoolBelowMinimum]);
        assert_eq!(
            weak_seed.advisories,
            vec![Advisory::TooWeak, Advisory::PoolBelowMinimum]
        );
        assert_eq!(
            weak_member.advisories,
            vec![Advisory::TooWeak, Advisory::PoolBelowMinimum]
        );
    }

    #[test]
    fn small_pools_carry_the_below_minimum_note() {
        let candidates = candidates_from(&[20.0, 18.0]);
        let plan = plan_pools(&candidates, &PoolParams::default()).expect("plan");
        for assignment in &plan.assignments {
            assert!(assignment.advisories.contains(&Advisory::PoolBelowMinimum));
        }
    }

    #[test]
    fn flagged_weak_candidate_keeps_its_note_as_a_singleton() {
        let candidates = candidates_from(&[20.0, 0.001]);
        let plan = plan_pools(&candidates, &PoolParams::default()).expect("plan");

        assert_eq!(plan.pools.len(), 2);
        let weak = plan.assignment_for(1).expect("weak");
        assert_eq!(weak.pool, 2);
        assert_eq!(weak.pool_samples, 1);
        assert_eq!(weak.volume, 10.0);
        assert_eq!(
            weak.advisories,
            vec![Advisory::TooWeak, Advisory::PoolBelowMinimum]
        );
    }

    #[test]
    fn member_cap_splits_equal_candidates() {
        let candidates = candidates_from(&[6.0; 6]);
        let params = PoolParams {
            max_samples_per_pool: 4,
        };
        let plan = plan_pools(&candidates, &params).expect("plan");
        assert_eq!(plan.pools.len(), 2);
        assert_eq!(plan.pools[0].samples, 4);
        assert_eq!(plan.pools[1].samples, 2);
    }

    #[test]
    fn equal_molarities_keep_input_order() {
        let candidates = candidates_from(&[6.0, 6.0, 6.0]);
        let plan = plan_pools(&candidates, &PoolParams::default()).expect("plan");
        let ids: Vec<usize> = plan.assignments.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn pool_capacity_closes_a_pool_before_overflow() {
        let candidates = candidates_from(&[1.0; 16]);
        let plan = plan_pools(&candidates, &PoolParams::default()).expect("plan");

        assert_eq!(plan.pools.len(), 2);
        assert_eq!(plan.pools[0].samples, 15);
        assert_eq!(plan.pools[0].volume, 150.0);
        assert_eq!(plan.pools[1].samples, 1);

        // The overflow candidate was rejected on capacity, not on its
        // required volume, so it carries no bound note.
        let spilled = plan.assignment_for(15).expect("spilled");
        assert_eq!(spilled.advisories, vec![Advisory::PoolBelowMinimum]);
    }

    #[test]
    fn empty_candidate_list_yields_empty_plan() {
        let plan = plan_pools(&[], &PoolParams::default()).expect("plan");
        assert!(plan.assignments.is_empty());
        assert!(plan.pools.is_empty());
    }

    #[test]
    fn zero_molarity_is_rejected() {
        let candidates = candidates_from(&[5.0, 0.0]);
        let err = plan_pools(&candidates, &PoolParams::default()).unwrap_err();
        assert!(err.message().unwrap().contains("unusable library molarity"));
    }

    #[test]
    fn nan_molarity_is_rejected() {
        let candidates = candidates_from(&[5.0, f64::NAN]);
        assert!(plan_pools(&candidates, &PoolParams::default()).is_err());
    }

    #[test]
    fn zero_member_cap_is_a_usage_error() {
        let candidates = candidates_from(&[5.0]);
        let params = PoolParams {
            max_samples_per_pool: 0,
        };
        let err = plan_pools(&candidates, &params).unwrap_err();
        assert!(err.message().unwrap().contains("at least 1"));
    }

    #[test]
    fn prop_plan_pools_invariants() {
        let seeds = [1u64, 7, 42, 99];
        for seed in seeds {
            let mut rng = XorShift64::new(seed);
            let count = 20 + rng.next_range(60);
            let mut candidates = Vec::with_capacity(count);
            for id in 0..count {
                let molarity = (1 + rng.next_range(2500)) as f64 / 100.0;
                candidates.push(PoolCandidate { id, molarity });
            }
            let params = PoolParams {
                max_samples_per_pool: 1 + rng.next_range(10),
            };

            let plan = plan_pools(&candidates, &params).expect("plan");
            let replay = plan_pools(&candidates, &params).expect("plan");
            assert_eq!(plan, replay);

            assert_eq!(plan.assignments.len(), candidates.len());
            let mut seen = vec![false; candidates.len()];
            for assignment in &plan.assignments {
                assert!(!seen[assignment.id], "assigned twice: {}", assignment.id);
                seen[assignment.id] = true;
                assert!(assignment.volume > 0.0);

                let pool = plan.pools[(assignment.pool - 1) as usize];
                assert_eq!(pool.number, assignment.pool);
                assert_eq!(pool.samples, assignment.pool_samples);
                assert!(pool.samples <= params.max_samples_per_pool);
                assert!(pool.volume <= POOL_MAX_UL);

                let molarity = candidates[assignment.id].molarity;
                assert_eq!(PoolType::from_molarity(molarity), pool.pool_type);
                let bounds = pool.pool_type.bounds();
                assert!(assignment.volume >= bounds.min);
                assert!(assignment.volume <= bounds.max);
            }

            for pool in &plan.pools {
                let mut sum = 0.0;
                for assignment in plan.assignments.iter().filter(|a| a.pool == pool.number) {
                    sum = round2(sum + assignment.volume);
                }
                assert!((sum - pool.volume).abs() < 1e-9);
            }
        }
    }
}
