// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Identity-based diffing between a rendered set and a fresh snapshot.

use std::collections::HashSet;

use crate::entity::{EntityId, GeoEntity};

/// What a renderer must add and remove to match a fresh snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDiff<E> {
    pub to_add: Vec<E>,
    pub to_remove: Vec<EntityId>,
}

impl<E> EntityDiff<E> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

impl<E> Default for EntityDiff<E> {
    fn default() -> Self {
        Self {
            to_add: Vec::new(),
            to_remove: Vec::new(),
        }
    }
}

/// Identity set of a snapshot.
#[must_use]
pub fn ids<E: GeoEntity>(entities: &[E]) -> HashSet<EntityId> {
    entities.iter().map(|e| e.id().clone()).collect()
}

/// Diff `fresh` against the identities a renderer currently shows.
///
/// Entities whose id is already rendered are left alone even if their
/// fields changed. Removals are sorted so the output is deterministic.
#[must_use]
pub fn reconcile<E: GeoEntity + Clone>(previous: &HashSet<EntityId>, fresh: &[E]) -> EntityDiff<E> {
    let fresh_ids = ids(fresh);
    if fresh_ids == *previous {
        return EntityDiff::default();
    }

    let mut to_remove: Vec<EntityId> = previous.difference(&fresh_ids).cloned().collect();
    to_remove.sort();

    let mut seen = HashSet::new();
    let to_add = fresh
        .iter()
        .filter(|e| !previous.contains(e.id()) && seen.insert(e.id().clone()))
        .cloned()
        .collect();

    EntityDiff { to_add, to_remove }
}
