//! DAG algorithms over a subtask dependency graph (spec §4.2,
//! "Decomposition contract" / "Critical path").
//!
//! Grounded on `app/agents/orchestrator.py`'s `_compute_critical_path`
//! (Kahn's algorithm for topological order, longest-path DP over it).

use std::collections::{HashMap, HashSet, VecDeque};

use agentaskit_shared::ids::SubtaskId;
use agentaskit_shared::models::Subtask;

/// `Some(order)` if the dependency graph is acyclic, `None` on cycle.
pub fn topological_sort(subtasks: &[Subtask]) -> Option<Vec<SubtaskId>> {
    let mut in_degree: HashMap<&SubtaskId, usize> = HashMap::new();
    let mut dependents: HashMap<&SubtaskId, Vec<&SubtaskId>> = HashMap::new();

    for s in subtasks {
        in_degree.entry(&s.id).or_insert(0);
        for dep in &s.dependencies {
            *in_degree.entry(&s.id).or_insert(0) += 1;
            dependents.entry(dep).or_default().push(&s.id);
        }
    }

    // Deterministic ordering among equally-ready nodes.
    let mut initial: Vec<&SubtaskId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    initial.sort();
    let mut queue: VecDeque<&SubtaskId> = initial.into();

    let mut order = Vec::with_capacity(subtasks.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.clone());
        if let Some(next) = dependents.get(id) {
            let mut ready = Vec::new();
            for dep_id in next {
                let degree = in_degree.get_mut(dep_id).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    ready.push(*dep_id);
                }
            }
            ready.sort();
            queue.extend(ready);
        }
    }

    if order.len() == subtasks.len() {
        Some(order)
    } else {
        None
    }
}

/// Longest path by node count through the DAG, found by a DP pass over a
/// topological order. Empty if the graph has a cycle.
pub fn critical_path(subtasks: &[Subtask]) -> Vec<SubtaskId> {
    let Some(order) = topological_sort(subtasks) else {
        return Vec::new();
    };

    let by_id: HashMap<&SubtaskId, &Subtask> = subtasks.iter().map(|s| (&s.id, s)).collect();
    let mut longest: HashMap<SubtaskId, (usize, Option<SubtaskId>)> = HashMap::new();

    for id in &order {
        let subtask = by_id[id];
        let mut best = (1usize, None::<SubtaskId>);
        for dep in &subtask.dependencies {
            if let Some((len, _)) = longest.get(dep) {
                if len + 1 > best.0 {
                    best = (len + 1, Some(dep.clone()));
                }
            }
        }
        longest.insert(id.clone(), best);
    }

    let Some((tail, _)) = longest.iter().max_by_key(|(_, (len, _))| *len) else {
        return Vec::new();
    };
    let tail = tail.clone();

    let mut path = vec![tail.clone()];
    let mut cursor = tail;
    while let Some((_, Some(prev))) = longest.get(&cursor) {
        path.push(prev.clone());
        cursor = prev.clone();
    }
    path.reverse();
    path
}

/// Subtasks that declare no dependencies; minimum 1 per spec.
pub fn max_parallelism(subtasks: &[Subtask]) -> usize {
    subtasks
        .iter()
        .filter(|s| s.dependencies.is_empty())
        .count()
        .max(1)
}

/// All dependency IDs resolve to a declared subtask.
pub fn dependencies_resolve(subtasks: &[Subtask]) -> bool {
    let ids: HashSet<&SubtaskId> = subtasks.iter().map(|s| &s.id).collect();
    subtasks
        .iter()
        .all(|s| s.dependencies.iter().all(|d| ids.contains(d)))
}

pub fn ids_are_unique(subtasks: &[Subtask]) -> bool {
    let mut seen = HashSet::new();
    subtasks.iter().all(|s| seen.insert(&s.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentaskit_shared::models::{Complexity, SubtaskStatus};

    fn subtask(id: &str, deps: &[&str]) -> Subtask {
        Subtask {
            id: id.to_string(),
            description: id.to_string(),
            required_capabilities: vec![],
            estimated_complexity: Complexity::Low,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            assigned_agent: None,
            status: SubtaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    #[test]
    fn linear_chain_critical_path_covers_every_node() {
        let subtasks = vec![subtask("a", &[]), subtask("b", &["a"]), subtask("c", &["b"])];
        let path = critical_path(&subtasks);
        assert_eq!(path, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn cycle_yields_empty_critical_path() {
        let subtasks = vec![subtask("a", &["b"]), subtask("b", &["a"])];
        assert!(critical_path(&subtasks).is_empty());
        assert!(topological_sort(&subtasks).is_none());
    }

    #[test]
    fn diamond_shape_max_parallelism_is_root_count() {
        let subtasks = vec![
            subtask("a", &[]),
            subtask("b", &["a"]),
            subtask("c", &["a"]),
            subtask("d", &["b", "c"]),
        ];
        assert_eq!(max_parallelism(&subtasks), 1);
        let path = critical_path(&subtasks);
        assert_eq!(path.len(), 3);
        assert_eq!(path.first(), Some(&"a".to_string()));
        assert_eq!(path.last(), Some(&"d".to_string()));
    }

    #[test]
    fn unresolved_dependency_is_rejected() {
        let subtasks = vec![subtask("a", &["missing"])];
        assert!(!dependencies_resolve(&subtasks));
    }
}
