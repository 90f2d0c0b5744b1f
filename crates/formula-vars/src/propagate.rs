//! Dependency discovery and independence-status propagation to containers and model consumers.

use std::collections::BTreeSet;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::context::{DeferredBinding, EvalContext};
use crate::error::Warning;
use crate::observer::DependanceUpdate;
use crate::registry::{Entry, Registry, VarHandle};
use crate::value::Value;

impl Registry {
    /// All dependent variables whose formula reads `handle`, directly or transitively.
    ///
    /// The result is de-duplicated, in registry order, and never contains `handle` itself.
    pub fn compile_list_of_dependents(&self, handle: VarHandle) -> Vec<VarHandle> {
        self.variables()
            .filter(|var| var.handle() != handle)
            .filter_map(|var| {
                let formula = var.formula()?;
                formula
                    .references_variable(self, handle, true)
                    .then_some(var.handle())
            })
            .collect()
    }

    /// Variables read directly when computing `handle`: the references of its formula, or the
    /// variable its value stands in for.
    pub fn direct_references(&self, handle: VarHandle) -> BTreeSet<VarHandle> {
        let mut out = BTreeSet::new();
        if let Some(Entry::Variable(var)) = self.entry(handle) {
            match (var.formula(), var.cached_value()) {
                (Some(formula), _) => formula.scan_variables(self, true, &mut out),
                (None, Some(Value::Reference(target))) => {
                    out.insert(*target);
                }
                (None, _) => {}
            }
        }
        out
    }

    /// Shortest-first search for a reference chain from any of `from` to `target`.
    ///
    /// Returns the chain (starting handle first, `target` last) if one exists.
    pub fn dependency_path(
        &self,
        from: impl IntoIterator<Item = VarHandle>,
        target: VarHandle,
    ) -> Option<Vec<VarHandle>> {
        let mut parent: AHashMap<VarHandle, Option<VarHandle>> = AHashMap::new();
        let mut queue: SmallVec<[VarHandle; 16]> = SmallVec::new();
        for start in from {
            if !parent.contains_key(&start) {
                parent.insert(start, None);
                queue.push(start);
            }
        }

        let mut head = 0;
        while head < queue.len() {
            let cur = queue[head];
            head += 1;
            if cur == target {
                let mut path = vec![cur];
                let mut node = cur;
                while let Some(Some(prev)) = parent.get(&node) {
                    path.push(*prev);
                    node = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.direct_references(cur) {
                if !parent.contains_key(&next) {
                    parent.insert(next, Some(cur));
                    queue.push(next);
                }
            }
        }
        None
    }

    /// Tell containers and consumers that `handle` is about to lose its formula.
    pub(crate) fn notify_now_independent(&mut self, handle: VarHandle) {
        let variable = self.display_name(handle);
        log::trace!("{variable} becomes independent");
        let mut refused = Vec::new();
        for entry in &mut self.containers {
            if !entry.container.remove_dependance(handle) {
                refused.push(entry.container.name().to_string());
            }
        }
        for container in refused {
            self.warn(Warning::ContainerRefusedIndependence {
                variable: variable.clone(),
                container,
            });
        }
        for entry in &mut self.consumers {
            entry.consumer.update_dependent(handle);
        }
    }

    /// Tell containers and consumers that `binding.handle` gained a formula.
    pub(crate) fn notify_now_dependent(&mut self, binding: DeferredBinding) {
        let DeferredBinding {
            handle,
            is_constant,
        } = binding;
        let variable = self.display_name(handle);
        log::trace!("{variable} becomes dependent");
        let mut refused = Vec::new();
        for entry in &mut self.containers {
            if entry.container.set_dependance(handle) == DependanceUpdate::Refused {
                refused.push(entry.container.name().to_string());
            }
        }
        for container in refused {
            self.warn(Warning::ContainerRefusedDependence {
                variable: variable.clone(),
                container,
            });
        }
        for entry in &mut self.consumers {
            entry.consumer.update_independent(handle, is_constant);
        }
    }

    /// Stop deferring on `ctx` and deliver every queued binding notification in order.
    ///
    /// Bindings whose variable was removed or made independent in the meantime are skipped.
    /// Returns the number of notifications delivered.
    pub fn flush_deferred(&mut self, ctx: &mut EvalContext) -> usize {
        let mut delivered = 0;
        for binding in ctx.take_deferred() {
            if self
                .variable(binding.handle)
                .is_some_and(|var| var.is_dependent())
            {
                self.notify_now_dependent(binding);
                delivered += 1;
            }
        }
        delivered
    }
}
