//! CRUSH map dump parsing and rule-set derivation.
//!
//! # Responsibilities
//! - Deserialize the JSON produced by `ceph osd crush dump`
//! - Count the devices reachable from each rule's `take` steps
//! - Group rules into rule sets
//!
//! # Design Decisions
//! - Bucket ids are negative, device ids are non-negative
//! - Hierarchy walks visit each bucket once, so malformed maps with
//!   cycles still terminate
//! - Tunables are not interpreted

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;

use crate::crush::types::{CrushError, CrushResult, Rule, RuleSet, RuleType, Step};

/// A leaf device (OSD).
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
}

/// A hierarchy level name, e.g. `host` or `root`.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketType {
    pub type_id: i64,
    pub name: String,
}

/// A child reference inside a bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketItem {
    pub id: i64,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub pos: i64,
}

/// An interior node of the hierarchy.
#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub type_id: i64,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub alg: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub items: Vec<BucketItem>,
}

/// A rule as stored in the dump.
#[derive(Debug, Clone, Deserialize)]
pub struct CrushRule {
    pub rule_id: i64,
    pub rule_name: String,
    pub ruleset: i64,
    #[serde(rename = "type")]
    pub type_code: u32,
    pub min_size: i64,
    pub max_size: i64,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct CrushDump {
    #[serde(default)]
    devices: Vec<Device>,
    #[serde(default)]
    types: Vec<BucketType>,
    #[serde(default)]
    buckets: Vec<Bucket>,
    rules: Vec<CrushRule>,
}

/// A parsed CRUSH map.
#[derive(Debug, Clone)]
pub struct CrushMap {
    devices: Vec<Device>,
    types: Vec<BucketType>,
    buckets: HashMap<i64, Bucket>,
    rules: Vec<CrushRule>,
}

impl CrushMap {
    /// Parse a `ceph osd crush dump -f json` document.
    pub fn from_json(text: &str) -> CrushResult<Self> {
        let dump: CrushDump = serde_json::from_str(text)?;

        let mut seen = HashSet::new();
        for rule in &dump.rules {
            if !seen.insert(rule.rule_id) {
                return Err(CrushError::DuplicateRule(rule.rule_id));
            }
        }

        let mut rules = dump.rules;
        rules.sort_by_key(|r| r.rule_id);

        Ok(Self {
            devices: dump.devices,
            types: dump.types,
            buckets: dump.buckets.into_iter().map(|b| (b.id, b)).collect(),
            rules,
        })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn types(&self) -> &[BucketType] {
        &self.types
    }

    pub fn bucket(&self, id: i64) -> Option<&Bucket> {
        self.buckets.get(&id)
    }

    /// Number of distinct devices reachable from the rule's `take` steps.
    pub fn osd_count(&self, rule: &CrushRule) -> usize {
        let mut osds = HashSet::new();
        let mut visited = HashSet::new();
        let mut pending: Vec<i64> = rule.steps.iter().filter_map(Step::take_item).collect();

        while let Some(item) = pending.pop() {
            if item >= 0 {
                osds.insert(item);
                continue;
            }
            if !visited.insert(item) {
                continue;
            }
            match self.buckets.get(&item) {
                Some(bucket) => pending.extend(bucket.items.iter().map(|child| child.id)),
                None => tracing::debug!(bucket = item, "Rule takes unknown bucket"),
            }
        }
        osds.len()
    }

    /// All rules rendered for the API, ordered by id.
    pub fn rules(&self) -> Vec<Rule> {
        self.rules
            .iter()
            .map(|r| Rule {
                id: r.rule_id,
                name: r.rule_name.clone(),
                ruleset: r.ruleset,
                rule_type: RuleType::from_code(r.type_code),
                min_size: r.min_size,
                max_size: r.max_size,
                osd_count: self.osd_count(r),
                steps: r.steps.clone(),
            })
            .collect()
    }

    /// Rules grouped by ruleset number, ordered by ruleset id.
    pub fn rule_sets(&self) -> Vec<RuleSet> {
        group_rule_sets(self.rules())
    }
}

/// Group already-rendered rules into rule sets.
pub fn group_rule_sets(rules: Vec<Rule>) -> Vec<RuleSet> {
    let mut grouped: BTreeMap<i64, Vec<Rule>> = BTreeMap::new();
    for rule in rules {
        grouped.entry(rule.ruleset).or_default().push(rule);
    }
    grouped
        .into_iter()
        .map(|(id, mut rules)| {
            rules.sort_by_key(|r| r.id);
            RuleSet { id, rules }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Two hosts with two OSDs each under `default`, plus an `ssd` root
    /// holding only host-b.
    fn sample_dump() -> serde_json::Value {
        json!({
            "devices": [
                {"id": 0, "name": "osd.0"},
                {"id": 1, "name": "osd.1"},
                {"id": 2, "name": "osd.2"},
                {"id": 3, "name": "osd.3"}
            ],
            "types": [
                {"type_id": 0, "name": "osd"},
                {"type_id": 1, "name": "host"},
                {"type_id": 10, "name": "root"}
            ],
            "buckets": [
                {"id": -1, "name": "default", "type_id": 10, "type_name": "root",
                 "weight": 262144, "alg": "straw", "hash": "rjenkins1",
                 "items": [{"id": -2, "weight": 131072, "pos": 0},
                           {"id": -3, "weight": 131072, "pos": 1}]},
                {"id": -2, "name": "host-a", "type_id": 1, "type_name": "host",
                 "items": [{"id": 0, "weight": 65536, "pos": 0},
                           {"id": 1, "weight": 65536, "pos": 1}]},
                {"id": -3, "name": "host-b", "type_id": 1, "type_name": "host",
                 "items": [{"id": 2, "weight": 65536, "pos": 0},
                           {"id": 3, "weight": 65536, "pos": 1}]},
                {"id": -4, "name": "ssd", "type_id": 10, "type_name": "root",
                 "items": [{"id": -3, "weight": 131072, "pos": 0}]}
            ],
            "rules": [
                {"rule_id": 2, "rule_name": "fast", "ruleset": 1, "type": 1,
                 "min_size": 1, "max_size": 10,
                 "steps": [{"op": "take", "item": -4, "item_name": "ssd"},
                           {"op": "chooseleaf_firstn", "num": 0, "type": "host"},
                           {"op": "emit"}]},
                {"rule_id": 0, "rule_name": "data", "ruleset": 0, "type": 1,
                 "min_size": 1, "max_size": 10,
                 "steps": [{"op": "take", "item": -1, "item_name": "default"},
                           {"op": "chooseleaf_firstn", "num": 0, "type": "host"},
                           {"op": "emit"}]},
                {"rule_id": 1, "rule_name": "ec", "ruleset": 1, "type": 3,
                 "min_size": 3, "max_size": 20,
                 "steps": [{"op": "set_chooseleaf_tries", "num": 5},
                           {"op": "take", "item": -1},
                           {"op": "chooseleaf_indep", "num": 0, "type": "host"},
                           {"op": "emit"}]}
            ],
            "tunables": {"choose_local_tries": 0}
        })
    }

    fn sample_map() -> CrushMap {
        CrushMap::from_json(&sample_dump().to_string()).unwrap()
    }

    #[test]
    fn test_osd_count_walks_hierarchy() {
        let map = sample_map();
        let rules = map.rules();
        assert_eq!(rules[0].name, "data");
        assert_eq!(rules[0].osd_count, 4);
        assert_eq!(rules[2].name, "fast");
        assert_eq!(rules[2].osd_count, 2);
    }

    #[test]
    fn test_rule_sets_grouped_and_ordered() {
        let sets = sample_map().rule_sets();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].id, 0);
        assert_eq!(sets[0].rules.len(), 1);
        assert_eq!(sets[1].id, 1);
        let ids: Vec<i64> = sets[1].rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(sets[1].rules[0].rule_type, RuleType::Erasure);
    }

    #[test]
    fn test_take_of_device_and_unknown_bucket() {
        let map = sample_map();
        let rule = CrushRule {
            rule_id: 9,
            rule_name: "odd".into(),
            ruleset: 9,
            type_code: 1,
            min_size: 1,
            max_size: 1,
            steps: vec![
                Step::Take { item: 3 },
                Step::Take { item: -99 },
                Step::Take { item: -3 },
                Step::Emit,
            ],
        };
        // osd.3 is also under host-b; counted once.
        assert_eq!(map.osd_count(&rule), 2);
    }

    #[test]
    fn test_cycle_terminates() {
        let dump = json!({
            "buckets": [
                {"id": -1, "name": "a", "items": [{"id": -2}, {"id": 0}]},
                {"id": -2, "name": "b", "items": [{"id": -1}, {"id": 1}]}
            ],
            "rules": [
                {"rule_id": 0, "rule_name": "loop", "ruleset": 0, "type": 1,
                 "min_size": 1, "max_size": 10,
                 "steps": [{"op": "take", "item": -1}, {"op": "emit"}]}
            ]
        });
        let map = CrushMap::from_json(&dump.to_string()).unwrap();
        assert_eq!(map.rules()[0].osd_count, 2);
    }

    #[test]
    fn test_deep_bucket_chain() {
        let depth: i64 = 200_000;
        let buckets: Vec<_> = (1..=depth)
            .map(|i| {
                let child = if i == depth { 0 } else { -(i + 1) };
                json!({"id": -i, "name": format!("b{}", i), "items": [{"id": child}]})
            })
            .collect();
        let dump = json!({
            "buckets": buckets,
            "rules": [
                {"rule_id": 0, "rule_name": "deep", "ruleset": 0, "type": 1,
                 "min_size": 1, "max_size": 10,
                 "steps": [{"op": "take", "item": -1}, {"op": "emit"}]}
            ]
        });
        let map = CrushMap::from_json(&dump.to_string()).unwrap();
        assert_eq!(map.rules()[0].osd_count, 1);
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let dump = json!({
            "rules": [
                {"rule_id": 0, "rule_name": "a", "ruleset": 0, "type": 1, "min_size": 1, "max_size": 10},
                {"rule_id": 0, "rule_name": "b", "ruleset": 0, "type": 1, "min_size": 1, "max_size": 10}
            ]
        });
        let err = CrushMap::from_json(&dump.to_string()).unwrap_err();
        assert!(matches!(err, CrushError::DuplicateRule(0)));
    }

    #[test]
    fn test_missing_rules_rejected() {
        assert!(matches!(
            CrushMap::from_json(r#"{"devices": []}"#),
            Err(CrushError::Parse(_))
        ));
    }

    #[test]
    fn test_lookup_accessors() {
        let map = sample_map();
        assert_eq!(map.devices().len(), 4);
        assert_eq!(map.types().len(), 3);
        assert_eq!(map.bucket(-2).map(|b| b.name.as_str()), Some("host-a"));
        assert!(map.bucket(-50).is_none());
    }
}
