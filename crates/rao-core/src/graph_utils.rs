use crate::{Branch, BusId, Network};
use petgraph::unionfind::UnionFind;
use std::collections::BTreeMap;

/// Groups buses into electrical islands using only the branches accepted by
/// `in_service` (union-find over bus ids).
///
/// Islands are returned sorted by their smallest bus id, each island's buses
/// sorted by id, so the result is independent of graph insertion order.
pub fn bus_islands<F>(network: &Network, in_service: F) -> Vec<Vec<BusId>>
where
    F: Fn(&Branch) -> bool,
{
    let buses = network.buses();
    let index: BTreeMap<BusId, usize> = buses
        .iter()
        .enumerate()
        .map(|(idx, bus)| (bus.id, idx))
        .collect();

    let mut sets = UnionFind::<usize>::new(buses.len());
    for branch in network.branches().filter(|b| in_service(b)) {
        if let (Some(&a), Some(&b)) = (index.get(&branch.from_bus), index.get(&branch.to_bus)) {
            sets.union(a, b);
        }
    }

    let mut islands: BTreeMap<usize, Vec<BusId>> = BTreeMap::new();
    for (idx, bus) in buses.iter().enumerate() {
        islands.entry(sets.find(idx)).or_default().push(bus.id);
    }
    let mut islands: Vec<Vec<BusId>> = islands.into_values().collect();
    islands.sort_by_key(|island| island.first().copied());
    islands
}

/// Number of islands for the given branch filter (0 for an empty network).
pub fn count_islands<F>(network: &Network, in_service: F) -> usize
where
    F: Fn(&Branch) -> bool,
{
    bus_islands(network, in_service).len()
}
