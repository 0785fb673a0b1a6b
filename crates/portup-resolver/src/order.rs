use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, Result};
use portup_core::PackageSpec;

/// Orders `nodes` so each spec follows the specs it depends on. Edges that
/// point outside `nodes` are ignored. Ties resolve in spec order.
pub(crate) fn topo_order(
    nodes: &BTreeMap<PackageSpec, BTreeSet<PackageSpec>>,
) -> Result<Vec<PackageSpec>> {
    let mut reverse: BTreeMap<&PackageSpec, BTreeSet<&PackageSpec>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&PackageSpec, usize> = BTreeMap::new();

    for spec in nodes.keys() {
        reverse.entry(spec).or_default();
        in_degree.insert(spec, 0);
    }

    for (spec, dependencies) in nodes {
        for dependency in dependencies {
            if !nodes.contains_key(dependency) || dependency == spec {
                continue;
            }
            if reverse.entry(dependency).or_default().insert(spec) {
                *in_degree.entry(spec).or_default() += 1;
            }
        }
    }

    let mut ready: BTreeSet<&PackageSpec> = in_degree
        .iter()
        .filter_map(|(spec, degree)| (*degree == 0).then_some(*spec))
        .collect();
    let mut ordered = Vec::new();

    while let Some(next) = ready.pop_first() {
        ordered.push(next.clone());
        if let Some(children) = reverse.get(next) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
    }

    if ordered.len() != nodes.len() {
        let cycle_nodes = nodes
            .keys()
            .filter(|spec| !ordered.contains(*spec))
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "dependency cycle detected involving: {}",
            cycle_nodes.join(", ")
        ));
    }

    Ok(ordered)
}
