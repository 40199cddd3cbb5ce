use ahash::{HashMap, HashMapExt};
use smallvec::SmallVec;

use super::indices::{ModuleIdx, NetRef};

type ModuleList = SmallVec<[ModuleIdx; 4]>;
type NetList = SmallVec<[NetRef; 8]>;

/// Everything detached from the graph by a [`DependencyGraph::remove_module`]
/// call. Modules are listed in pre-order, starting with the removed module.
#[derive(Debug, Default)]
pub struct Removed {
    pub modules: Vec<ModuleIdx>,
    pub nets: Vec<NetRef>,
}

/// The bidirectional index of the design hierarchy.
///
/// It records two relations. Containment is a strict tree: every module but
/// the root has exactly one parent and every net has exactly one owning
/// module. Sensitization is a many-to-many relation between modules and nets
/// and is stored from both ends so that either side can be dropped without
/// leaving a dangling edge on the other.
#[derive(Debug)]
pub struct DependencyGraph {
    parent: HashMap<ModuleIdx, ModuleIdx>,
    children: HashMap<ModuleIdx, ModuleList>,
    owner: HashMap<NetRef, ModuleIdx>,
    owned: HashMap<ModuleIdx, NetList>,
    dependents: HashMap<NetRef, ModuleList>,
    sensitivities: HashMap<ModuleIdx, NetList>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            parent: HashMap::new(),
            children: HashMap::new(),
            owner: HashMap::new(),
            owned: HashMap::new(),
            dependents: HashMap::new(),
            sensitivities: HashMap::new(),
        }
    }

    /// Records `child` as a direct child of `parent`.
    pub fn associate(&mut self, parent: ModuleIdx, child: ModuleIdx) {
        let previous = self.parent.insert(child, parent);
        debug_assert!(previous.is_none(), "module re-parented");
        self.children.entry(parent).or_default().push(child);
    }

    /// Records `module` as the owner of `net`.
    pub fn adopt(&mut self, module: ModuleIdx, net: NetRef) {
        let previous = self.owner.insert(net, module);
        debug_assert!(previous.is_none(), "net owned twice");
        self.owned.entry(module).or_default().push(net);
    }

    /// Adds the edge `net -> module`. Returns false if it already existed.
    pub fn sensitize(&mut self, module: ModuleIdx, net: NetRef) -> bool {
        let deps = self.dependents.entry(net).or_default();
        if deps.contains(&module) {
            return false;
        }
        deps.push(module);
        self.sensitivities.entry(module).or_default().push(net);
        true
    }

    /// Removes the edge `net -> module`. Returns false if there was none.
    pub fn desensitize(&mut self, module: ModuleIdx, net: NetRef) -> bool {
        let Some(deps) = self.dependents.get_mut(&net) else {
            return false;
        };
        let Some(pos) = deps.iter().position(|m| *m == module) else {
            return false;
        };
        deps.remove(pos);
        if deps.is_empty() {
            self.dependents.remove(&net);
        }
        if let Some(sens) = self.sensitivities.get_mut(&module) {
            sens.retain(|n| *n != net);
            if sens.is_empty() {
                self.sensitivities.remove(&module);
            }
        }
        true
    }

    /// The modules to trigger when `net` changes, in sensitization order.
    pub fn dependents_of(
        &self,
        net: NetRef,
    ) -> impl Iterator<Item = ModuleIdx> + '_ {
        self.dependents.get(&net).into_iter().flatten().copied()
    }

    pub fn sensitivities_of(
        &self,
        module: ModuleIdx,
    ) -> impl Iterator<Item = NetRef> + '_ {
        self.sensitivities.get(&module).into_iter().flatten().copied()
    }

    pub fn parent_of(&self, module: ModuleIdx) -> Option<ModuleIdx> {
        self.parent.get(&module).copied()
    }

    /// Direct children in construction order.
    pub fn children_of(&self, module: ModuleIdx) -> &[ModuleIdx] {
        self.children.get(&module).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Nets owned by `module` in construction order.
    pub fn owned_by(&self, module: ModuleIdx) -> &[NetRef] {
        self.owned.get(&module).map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn owner_of(&self, net: NetRef) -> Option<ModuleIdx> {
        self.owner.get(&net).copied()
    }

    /// `module` and all of its descendants in pre-order.
    pub fn subtree(&self, module: ModuleIdx) -> Vec<ModuleIdx> {
        let mut out = vec![];
        let mut stack = vec![module];
        while let Some(current) = stack.pop() {
            out.push(current);
            // reversed so that children come out in construction order
            stack.extend(self.children_of(current).iter().rev());
        }
        out
    }

    /// Drops every edge that names `net`.
    pub fn remove_net(&mut self, net: NetRef) {
        if let Some(owner) = self.owner.remove(&net) {
            if let Some(list) = self.owned.get_mut(&owner) {
                list.retain(|n| *n != net);
                if list.is_empty() {
                    self.owned.remove(&owner);
                }
            }
        }
        for module in self.dependents.remove(&net).into_iter().flatten() {
            if let Some(sens) = self.sensitivities.get_mut(&module) {
                sens.retain(|n| *n != net);
                if sens.is_empty() {
                    self.sensitivities.remove(&module);
                }
            }
        }
        self.debug_check();
    }

    /// Detaches `module` from its parent and drops every structural and
    /// sensitization edge naming it, any of its descendants or any net they
    /// own.
    pub fn remove_module(&mut self, module: ModuleIdx) -> Removed {
        let modules = self.subtree(module);
        let mut nets = vec![];

        if let Some(parent) = self.parent.get(&module).copied() {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|c| *c != module);
                if siblings.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }

        for m in &modules {
            for net in self.owned.remove(m).into_iter().flatten() {
                self.owner.remove(&net);
                for dep in self.dependents.remove(&net).into_iter().flatten() {
                    if let Some(sens) = self.sensitivities.get_mut(&dep) {
                        sens.retain(|n| *n != net);
                        if sens.is_empty() {
                            self.sensitivities.remove(&dep);
                        }
                    }
                }
                nets.push(net);
            }
            // sensitizations of the removed module to nets that survive
            for net in self.sensitivities.remove(m).into_iter().flatten() {
                if let Some(deps) = self.dependents.get_mut(&net) {
                    deps.retain(|d| d != m);
                    if deps.is_empty() {
                        self.dependents.remove(&net);
                    }
                }
            }
            self.parent.remove(m);
            self.children.remove(m);
        }

        self.debug_check();
        Removed { modules, nets }
    }

    /// Checks that both directions of every relation agree.
    pub fn is_consistent(&self) -> bool {
        let parents_ok = self.parent.iter().all(|(child, parent)| {
            self.children_of(*parent).contains(child)
        }) && self.children.iter().all(|(parent, kids)| {
            kids.iter()
                .all(|k| self.parent.get(k).is_some_and(|p| p == parent))
        });
        let owners_ok = self
            .owner
            .iter()
            .all(|(net, owner)| self.owned_by(*owner).contains(net))
            && self.owned.iter().all(|(owner, nets)| {
                nets.iter()
                    .all(|n| self.owner.get(n).is_some_and(|o| o == owner))
            });
        let sens_ok = self.dependents.iter().all(|(net, mods)| {
            mods.iter().all(|m| {
                self.sensitivities.get(m).is_some_and(|s| s.contains(net))
            })
        }) && self.sensitivities.iter().all(|(m, nets)| {
            nets.iter()
                .all(|n| self.dependents.get(n).is_some_and(|d| d.contains(m)))
        });
        parents_ok && owners_ok && sens_ok
    }

    fn debug_check(&self) {
        debug_assert!(self.is_consistent(), "dependency graph out of sync");
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
