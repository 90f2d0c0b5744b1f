use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::bounds::Bounds;
use crate::error::{VarError, VarResult, Warning};
use crate::observer::{ConsumerId, ContainerId, ModelConsumer, VariableContainer};
use crate::settings::EvalSettings;
use crate::value::{TreeValue, Value};
use crate::variable::{Scope, Variable, VariableKind};

/// Stable identity of a registry entry.
///
/// The index addresses a slot; the generation distinguishes successive occupants of a reused
/// slot, so a handle kept past [`Registry::remove`] never resolves to the next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarHandle {
    index: u32,
    generation: u32,
}

impl VarHandle {
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for VarHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// A tree object occupying a registry slot in place of a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    name: Arc<str>,
    value: Arc<TreeValue>,
}

impl Tree {
    pub(crate) fn new(name: Arc<str>, value: Arc<TreeValue>) -> Self {
        Self { name, value }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Arc<TreeValue> {
        &self.value
    }
}

#[derive(Debug, Clone)]
pub enum Entry {
    Variable(Variable),
    Tree(Tree),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Variable(v) => v.name(),
            Entry::Tree(t) => t.name(),
        }
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        match self {
            Entry::Variable(v) => &v.name,
            Entry::Tree(t) => &t.name,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Entry::Variable(v) => Some(v),
            Entry::Tree(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

pub(crate) struct RegisteredContainer {
    pub(crate) id: ContainerId,
    pub(crate) container: Box<dyn VariableContainer>,
}

pub(crate) struct RegisteredConsumer {
    pub(crate) id: ConsumerId,
    pub(crate) consumer: Box<dyn ModelConsumer>,
}

/// Owner of every live variable plus the objects that track their independence.
///
/// Evaluation and rebinding operations live in the `compute`, `binding`, `pass` and
/// `propagate` modules as further `impl Registry` blocks.
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    names: AHashMap<Arc<str>, VarHandle>,
    pub(crate) containers: Vec<RegisteredContainer>,
    pub(crate) consumers: Vec<RegisteredConsumer>,
    next_observer_id: u32,
    pub(crate) warnings: Vec<Warning>,
    /// Depth of in-flight formula evaluations; structural edits are refused while non-zero.
    pub(crate) traversal_depth: usize,
    default_bounds: Bounds,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("live", &self.len())
            .field("free", &self.free.len())
            .field("containers", &self.containers.len())
            .field("consumers", &self.consumers.len())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_settings(&EvalSettings::default())
    }

    pub fn with_settings(settings: &EvalSettings) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            names: AHashMap::new(),
            containers: Vec::new(),
            consumers: Vec::new(),
            next_observer_id: 0,
            warnings: Vec::new(),
            traversal_depth: 0,
            default_bounds: settings.default_bounds,
        }
    }

    pub fn default_bounds(&self) -> Bounds {
        self.default_bounds
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a plain, local, unassigned variable.
    pub fn insert_variable(&mut self, name: &str) -> VarResult<VarHandle> {
        self.insert_variable_with(name, VariableKind::Plain, Scope::Local)
    }

    pub fn insert_variable_with(
        &mut self,
        name: &str,
        kind: VariableKind,
        scope: Scope,
    ) -> VarResult<VarHandle> {
        self.ensure_not_traversing()?;
        if self.names.contains_key(name) {
            return Err(VarError::DuplicateName(name.to_string()));
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index =
                    u32::try_from(self.slots.len()).map_err(|_| VarError::RegistryFull)?;
                self.slots.push(Slot::default());
                index
            }
        };
        let slot = &mut self.slots[index as usize];
        let handle = VarHandle::new(index, slot.generation);
        let name: Arc<str> = Arc::from(name);
        slot.entry = Some(Entry::Variable(Variable::new(
            handle,
            Arc::clone(&name),
            kind,
            scope,
            self.default_bounds,
        )));
        log::debug!("registered variable {name} as {handle}");
        self.names.insert(name, handle);
        Ok(handle)
    }

    /// Insert a variable and assign it `value`.
    pub fn insert_value(&mut self, name: &str, value: impl Into<Value>) -> VarResult<VarHandle> {
        let handle = self.insert_variable(name)?;
        self.set_value(handle, value.into())?;
        Ok(handle)
    }

    /// Remove an entry, releasing its name and recycling its slot.
    pub fn remove(&mut self, handle: VarHandle) -> VarResult<Entry> {
        self.ensure_not_traversing()?;
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.entry.is_some())
            .ok_or(VarError::StaleHandle(handle))?;
        let entry = slot.entry.take().ok_or(VarError::StaleHandle(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.names.remove(entry.name_arc());
        log::debug!("removed {} ({handle})", entry.name());
        Ok(entry)
    }

    pub fn lookup(&self, name: &str) -> Option<VarHandle> {
        self.names.get(name).copied()
    }

    /// Like [`Registry::lookup`] but failing with [`VarError::UnknownVariable`].
    pub fn resolve(&self, name: &str) -> VarResult<VarHandle> {
        self.lookup(name)
            .ok_or_else(|| VarError::UnknownVariable(name.to_string()))
    }

    pub fn contains(&self, handle: VarHandle) -> bool {
        self.entry(handle).is_some()
    }

    pub fn entry(&self, handle: VarHandle) -> Option<&Entry> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?
            .entry
            .as_ref()
    }

    fn entry_mut(&mut self, handle: VarHandle) -> Option<&mut Entry> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?
            .entry
            .as_mut()
    }

    pub fn variable(&self, handle: VarHandle) -> Option<&Variable> {
        self.entry(handle)?.as_variable()
    }

    pub fn variable_mut(&mut self, handle: VarHandle) -> Option<&mut Variable> {
        match self.entry_mut(handle)? {
            Entry::Variable(v) => Some(v),
            Entry::Tree(_) => None,
        }
    }

    pub fn tree(&self, handle: VarHandle) -> Option<&Tree> {
        match self.entry(handle)? {
            Entry::Tree(t) => Some(t),
            Entry::Variable(_) => None,
        }
    }

    pub(crate) fn try_variable(&self, handle: VarHandle) -> VarResult<&Variable> {
        match self.entry(handle) {
            Some(Entry::Variable(v)) => Ok(v),
            Some(Entry::Tree(t)) => Err(VarError::NotAVariable(t.name().to_string())),
            None => Err(VarError::StaleHandle(handle)),
        }
    }

    pub(crate) fn try_variable_mut(&mut self, handle: VarHandle) -> VarResult<&mut Variable> {
        match self.entry_mut(handle) {
            Some(Entry::Variable(v)) => Ok(v),
            Some(Entry::Tree(t)) => Err(VarError::NotAVariable(t.name().to_string())),
            None => Err(VarError::StaleHandle(handle)),
        }
    }

    /// Name of a live entry, or the handle itself for display purposes.
    pub fn display_name(&self, handle: VarHandle) -> String {
        self.entry(handle)
            .map_or_else(|| handle.to_string(), |e| e.name().to_string())
    }

    /// Live handles in slot order.
    pub fn handles(&self) -> impl Iterator<Item = VarHandle> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry
                .as_ref()
                .map(|_| VarHandle::new(index as u32, slot.generation))
        })
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref()?.as_variable())
    }

    pub(crate) fn variables_mut(&mut self) -> impl Iterator<Item = &mut Variable> + '_ {
        self.slots.iter_mut().filter_map(|slot| match slot.entry.as_mut()? {
            Entry::Variable(v) => Some(v),
            Entry::Tree(_) => None,
        })
    }

    /// Put `entry` into the live slot of `handle`, keeping handle and name binding.
    pub(crate) fn replace_entry(&mut self, handle: VarHandle, entry: Entry) -> VarResult<Entry> {
        self.ensure_not_traversing()?;
        let current = self.entry_mut(handle).ok_or(VarError::StaleHandle(handle))?;
        Ok(std::mem::replace(current, entry))
    }

    fn ensure_not_traversing(&self) -> VarResult<()> {
        if self.traversal_depth > 0 {
            return Err(VarError::RegistryBusy);
        }
        Ok(())
    }

    pub fn register_container(&mut self, container: Box<dyn VariableContainer>) -> ContainerId {
        let id = ContainerId(self.bump_observer_id());
        self.containers.push(RegisteredContainer { id, container });
        id
    }

    pub fn unregister_container(&mut self, id: ContainerId) -> Option<Box<dyn VariableContainer>> {
        let pos = self.containers.iter().position(|c| c.id == id)?;
        Some(self.containers.remove(pos).container)
    }

    pub fn register_consumer(&mut self, consumer: Box<dyn ModelConsumer>) -> ConsumerId {
        let id = ConsumerId(self.bump_observer_id());
        self.consumers.push(RegisteredConsumer { id, consumer });
        id
    }

    pub fn unregister_consumer(&mut self, id: ConsumerId) -> Option<Box<dyn ModelConsumer>> {
        let pos = self.consumers.iter().position(|c| c.id == id)?;
        Some(self.consumers.remove(pos).consumer)
    }

    fn bump_observer_id(&mut self) -> u32 {
        let id = self.next_observer_id;
        self.next_observer_id += 1;
        id
    }

    pub(crate) fn warn(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Drain the warnings collected so far.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn names_are_unique() {
        let mut reg = Registry::new();
        reg.insert_variable("x").unwrap();
        assert_eq!(
            reg.insert_variable("x").unwrap_err(),
            VarError::DuplicateName("x".to_string())
        );
    }

    #[test]
    fn removal_recycles_slot_with_new_generation() {
        let mut reg = Registry::new();
        let a = reg.insert_variable("a").unwrap();
        let b = reg.insert_variable("b").unwrap();
        reg.remove(a).unwrap();
        assert_eq!(reg.lookup("a"), None);
        assert!(!reg.contains(a));

        let c = reg.insert_variable("c").unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert!(reg.variable(a).is_none());
        assert_eq!(reg.variable(c).map(Variable::name), Some("c"));
        assert_eq!(reg.handles().collect::<Vec<_>>(), vec![c, b]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn removing_twice_reports_stale_handle() {
        let mut reg = Registry::new();
        let a = reg.insert_variable("a").unwrap();
        reg.remove(a).unwrap();
        assert_eq!(reg.remove(a).unwrap_err(), VarError::StaleHandle(a));
    }

    #[test]
    fn removed_name_can_be_reused() {
        let mut reg = Registry::new();
        let a = reg.insert_variable("a").unwrap();
        reg.remove(a).unwrap();
        let again = reg.insert_variable("a").unwrap();
        assert_eq!(reg.resolve("a"), Ok(again));
    }

    #[test]
    fn settings_bounds_apply_to_new_variables() {
        let settings = EvalSettings {
            default_bounds: Bounds::new(0.0, 1.0),
            ..EvalSettings::default()
        };
        let mut reg = Registry::with_settings(&settings);
        let x = reg.insert_variable("x").unwrap();
        assert_eq!(reg.variable(x).unwrap().bounds(), Bounds::new(0.0, 1.0));
    }
}
