// SPDX-License-Identifier: MIT

//! Per-payload-type drop policies.
//!
//! Two families exist at runtime: toSim (downlink toward TPN) and toSv
//! (uplink control plane toward VMW). Each maps the eight payload types to
//! an algorithm and an interval; deterministic variants keep a counter that
//! resets whenever the entry is reconfigured.

use crate::config::DropRule;
use mia_wire::itm::PayloadType;
use rand::Rng;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropAlgorithm {
    /// Never drop.
    #[default]
    None,
    /// Drop every Nth packet of the payload type.
    EveryN,
    /// Pass N, drop 1, repeat.
    SkipN,
    /// Drop with probability 1/N.
    RandomOneInN,
}

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    algorithm: DropAlgorithm,
    interval: u32,
    counter: u32,
}

impl Entry {
    fn apply(&mut self) -> bool {
        if self.interval == 0 {
            return false;
        }
        match self.algorithm {
            DropAlgorithm::None => false,
            DropAlgorithm::EveryN => {
                self.counter += 1;
                if self.counter >= self.interval {
                    self.counter = 0;
                    true
                } else {
                    false
                }
            }
            DropAlgorithm::SkipN => {
                self.counter += 1;
                if self.counter > self.interval {
                    self.counter = 0;
                    true
                } else {
                    false
                }
            }
            DropAlgorithm::RandomOneInN => rand::thread_rng().gen_range(0..self.interval) == 0,
        }
    }
}

/// One policy family: payload type → algorithm entry.
#[derive(Debug)]
pub struct DropPolicySet {
    entries: [Entry; 8],
    boot: [Entry; 8],
}

impl DropPolicySet {
    pub fn new(rules: &[DropRule]) -> DropPolicySet {
        let mut entries = [Entry::default(); 8];
        for rule in rules {
            entries[(rule.payload_type & 0x07) as usize] = Entry {
                algorithm: rule.algorithm,
                interval: rule.interval,
                counter: 0,
            };
        }
        DropPolicySet {
            boot: entries,
            entries,
        }
    }

    /// Replaces one entry; its counter restarts from zero.
    pub fn configure(&mut self, rule: DropRule) {
        self.entries[(rule.payload_type & 0x07) as usize] = Entry {
            algorithm: rule.algorithm,
            interval: rule.interval,
            counter: 0,
        };
    }

    pub fn reset_to_defaults(&mut self) {
        self.entries = self.boot;
    }

    /// True means drop.
    pub fn apply(&mut self, payload_type: PayloadType) -> bool {
        self.entries[payload_type.bits() as usize].apply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(ty: u8, algorithm: DropAlgorithm, interval: u32) -> DropRule {
        DropRule {
            payload_type: ty,
            algorithm,
            interval,
        }
    }

    #[test]
    fn every_n_drops_the_nth() {
        let mut set = DropPolicySet::new(&[rule(2, DropAlgorithm::EveryN, 3)]);
        let ty = PayloadType::Control2;
        let pattern: Vec<bool> = (0..9).map(|_| set.apply(ty)).collect();
        assert_eq!(
            pattern,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn skip_n_passes_n_then_drops_one() {
        let mut set = DropPolicySet::new(&[rule(4, DropAlgorithm::SkipN, 2)]);
        let ty = PayloadType::Control4;
        let pattern: Vec<bool> = (0..6).map(|_| set.apply(ty)).collect();
        assert_eq!(pattern, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn random_one_in_one_always_drops() {
        let mut set = DropPolicySet::new(&[rule(5, DropAlgorithm::RandomOneInN, 1)]);
        for _ in 0..32 {
            assert!(set.apply(PayloadType::Control5));
        }
    }

    #[test]
    fn unconfigured_types_never_drop() {
        let mut set = DropPolicySet::new(&[rule(2, DropAlgorithm::EveryN, 1)]);
        for _ in 0..8 {
            assert!(!set.apply(PayloadType::Control4));
            assert!(set.apply(PayloadType::Control2));
        }
    }

    #[test]
    fn zero_interval_never_drops() {
        let mut set = DropPolicySet::new(&[rule(2, DropAlgorithm::EveryN, 0)]);
        for _ in 0..8 {
            assert!(!set.apply(PayloadType::Control2));
        }
    }

    #[test]
    fn configure_resets_the_counter() {
        let mut set = DropPolicySet::new(&[rule(2, DropAlgorithm::EveryN, 3)]);
        let ty = PayloadType::Control2;
        assert!(!set.apply(ty));
        assert!(!set.apply(ty));
        // One packet short of the drop; reconfiguring restarts the cycle.
        set.configure(rule(2, DropAlgorithm::EveryN, 3));
        assert!(!set.apply(ty));
        assert!(!set.apply(ty));
        assert!(set.apply(ty));
    }

    #[test]
    fn reset_restores_boot_table() {
        let mut set = DropPolicySet::new(&[rule(2, DropAlgorithm::EveryN, 1)]);
        set.configure(rule(2, DropAlgorithm::None, 0));
        assert!(!set.apply(PayloadType::Control2));
        set.reset_to_defaults();
        assert!(set.apply(PayloadType::Control2));
    }
}
