//! Running validator containers, indexed by chain id and validator index.
//!
//! Each chain owns a fixed-length slot vector, one slot per configured
//! validator. A slot is empty until its validator is started and becomes empty
//! again once the container is removed, so slot `i` always belongs to
//! validator `i`.

use {
    crate::{
        error::{E2eError, Result},
        runtime::ContainerHandle,
    },
    std::collections::HashMap,
};

#[derive(Debug, Default)]
pub struct ClusterRegistry {
    chains: HashMap<String, Vec<Option<ContainerHandle>>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `validator_count` empty slots for a chain. Registering the
    /// same chain twice is an error.
    pub fn register_chain(&mut self, chain_id: &str, validator_count: usize) -> Result<()> {
        if self.chains.contains_key(chain_id) {
            return Err(E2eError::Invariant(format!(
                "chain {chain_id} registered twice"
            )));
        }
        self.chains
            .insert(chain_id.to_string(), vec![None; validator_count]);
        Ok(())
    }

    fn slots(&self, chain_id: &str) -> Result<&Vec<Option<ContainerHandle>>> {
        self.chains
            .get(chain_id)
            .ok_or_else(|| E2eError::UnknownChain(chain_id.to_string()))
    }

    fn slot_mut(&mut self, chain_id: &str, index: usize) -> Result<&mut Option<ContainerHandle>> {
        let slots = self
            .chains
            .get_mut(chain_id)
            .ok_or_else(|| E2eError::UnknownChain(chain_id.to_string()))?;
        let len = slots.len();
        slots.get_mut(index).ok_or_else(|| {
            E2eError::Invariant(format!(
                "validator index {index} out of range for chain {chain_id} ({len} validators)"
            ))
        })
    }

    /// Records a started container. The slot must be empty.
    pub fn insert(&mut self, chain_id: &str, index: usize, handle: ContainerHandle) -> Result<()> {
        let slot = self.slot_mut(chain_id, index)?;
        if let Some(existing) = slot {
            return Err(E2eError::Invariant(format!(
                "validator {index} of chain {chain_id} already running as {}",
                existing.name
            )));
        }
        *slot = Some(handle);
        Ok(())
    }

    /// Empties a slot, returning whatever occupied it.
    pub fn take(&mut self, chain_id: &str, index: usize) -> Result<Option<ContainerHandle>> {
        Ok(self.slot_mut(chain_id, index)?.take())
    }

    pub fn get(&self, chain_id: &str, index: usize) -> Result<&ContainerHandle> {
        self.slots(chain_id)?
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| E2eError::MissingContainer {
                chain_id: chain_id.to_string(),
                index,
            })
    }

    /// Live containers of a chain with their validator index, in index order.
    pub fn live(&self, chain_id: &str) -> Result<Vec<(usize, &ContainerHandle)>> {
        Ok(self
            .slots(chain_id)?
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|handle| (index, handle)))
            .collect())
    }

    pub fn live_count(&self, chain_id: &str) -> Result<usize> {
        Ok(self.slots(chain_id)?.iter().flatten().count())
    }

    /// Number of slots, live or not.
    pub fn slot_count(&self, chain_id: &str) -> Result<usize> {
        Ok(self.slots(chain_id)?.len())
    }

    /// Empties every slot of every chain. Chains stay registered.
    pub fn drain(&mut self) -> Vec<ContainerHandle> {
        let mut chains: Vec<(&String, &mut Vec<Option<ContainerHandle>>)> =
            self.chains.iter_mut().collect();
        chains.sort_by(|(a, _), (b, _)| a.cmp(b));
        let mut drained = Vec::new();
        for (_, slots) in chains {
            drained.extend(slots.iter_mut().filter_map(Option::take));
        }
        drained
    }
}
