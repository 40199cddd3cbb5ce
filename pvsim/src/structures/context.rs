use std::{any::type_name, cell::Cell, collections::BTreeSet};

use itertools::Itertools;
use pvsim_idx::{
    IndexRef,
    maps::{IndexedMap, SecondaryMap},
};
use slog::Logger;

use super::{
    graph::DependencyGraph,
    indices::{
        ModuleId, ModuleIdx, NetRef, Register, RegisterIdx, Signal,
        SignalIdx, SignalKind,
    },
    module::Module,
    register::{ErasedRegister, RegisterCell},
    signal::{ErasedSignal, SignalCell},
};
use crate::{
    errors::ConstructionError,
    logging::{self, debug, trace, warn},
    simulation::RunStatus,
    trace::{ChangeRecord, TraceValue},
    values::SignalValue,
};

thread_local! {
    static CONTEXT_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

pub(crate) struct ModuleSlot {
    pub name: String,
    pub parent: Option<ModuleIdx>,
    /// set by `force_eval_next_clock`
    pub needs_evaluation: bool,
    pub evaluated_this_cycle: bool,
    pub installed: bool,
    /// taken out while the module is being evaluated
    pub behaviour: Option<Box<dyn Module>>,
}

pub(crate) struct SignalSlot {
    pub name: String,
    pub owner: ModuleIdx,
    pub kind: SignalKind,
    pub width: u32,
    pub written: bool,
    pub cell: Box<dyn ErasedSignal>,
}

pub(crate) struct RegisterSlot {
    pub name: String,
    pub owner: ModuleIdx,
    pub width: u32,
    pub cell: Box<dyn ErasedRegister>,
}

/// The owner of a design hierarchy and all of its state.
///
/// Every module, signal and register lives in an arena of the context and is
/// addressed by an index. Removing a component tombstones its slot and drops
/// every dependency edge naming it, so a stale handle can never reach a
/// different component: it panics instead. Handles are not tied to the
/// context that created them, so a handle must not outlive its context.
///
/// Only one context may be alive per thread.
pub struct SimContext {
    modules: IndexedMap<ModuleIdx, Option<ModuleSlot>>,
    signals: IndexedMap<SignalIdx, Option<SignalSlot>>,
    registers: IndexedMap<RegisterIdx, Option<RegisterSlot>>,
    graph: DependencyGraph,
    /// modules pending evaluation, drained in index (construction) order
    run_set: BTreeSet<ModuleIdx>,
    /// signals written since the last settle
    dirty: Vec<SignalIdx>,
    /// registers reported with their clock-edge changes
    traced: SecondaryMap<RegisterIdx, bool>,
    changes: Vec<ChangeRecord>,
    /// forced unknown since the last clock edge
    forced: Vec<RegisterIdx>,
    stop: Option<RunStatus>,
    cycle: u64,
    root: ModuleIdx,
    logger: Logger,
}

impl SimContext {
    /// Creates a context holding only the root module `root_name`.
    pub fn new<S: Into<String>>(
        root_name: S,
        logger: Logger,
    ) -> Result<Self, ConstructionError> {
        if CONTEXT_ACTIVE.with(|active| active.replace(true)) {
            return Err(ConstructionError::ContextAlreadyActive);
        }

        let mut modules = IndexedMap::new();
        let root = modules.push(Some(ModuleSlot {
            name: root_name.into(),
            parent: None,
            needs_evaluation: false,
            evaluated_this_cycle: false,
            installed: false,
            behaviour: None,
        }));

        Ok(Self {
            modules,
            signals: IndexedMap::new(),
            registers: IndexedMap::new(),
            graph: DependencyGraph::new(),
            run_set: BTreeSet::new(),
            dirty: vec![],
            traced: SecondaryMap::new(),
            changes: vec![],
            forced: vec![],
            stop: None,
            cycle: 0,
            root,
            logger,
        })
    }

    /// A context whose log records are discarded.
    pub fn quiet<S: Into<String>>(
        root_name: S,
    ) -> Result<Self, ConstructionError> {
        Self::new(root_name, logging::discard())
    }

    pub fn root(&self) -> ModuleId {
        self.root
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// The current clock cycle. Zero before the first cycle of a run.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    // ----- construction -----

    /// Declares a module named `name` inside `parent`.
    pub fn module<S: Into<String>>(
        &mut self,
        parent: ModuleId,
        name: S,
    ) -> Result<ModuleId, ConstructionError> {
        let name = name.into();
        if !self.is_live(parent) {
            return Err(ConstructionError::UnknownModule {
                what: "module",
                name,
            });
        }
        let idx = self.modules.push(Some(ModuleSlot {
            name,
            parent: Some(parent),
            needs_evaluation: false,
            evaluated_this_cycle: false,
            installed: false,
            behaviour: None,
        }));
        self.graph.associate(parent, idx);
        trace!(self.logger, "declared module"; "path" => self.path(idx));
        Ok(idx)
    }

    /// Declares a signal of the given kind owned by `owner`. A `None`
    /// initializer starts the signal unknown.
    pub fn signal<T: SignalValue, S: Into<String>>(
        &mut self,
        owner: ModuleId,
        name: S,
        kind: SignalKind,
        init: Option<T>,
    ) -> Result<Signal<T>, ConstructionError> {
        let name = name.into();
        if !self.is_live(owner) {
            return Err(ConstructionError::UnknownModule {
                what: kind.as_str(),
                name,
            });
        }

        let target = match kind {
            SignalKind::Wire | SignalKind::Input => Some(owner),
            SignalKind::Output => match self.graph.parent_of(owner) {
                Some(parent) => Some(parent),
                None => {
                    return Err(ConstructionError::OutputWithoutParent {
                        name,
                        module: self.module_slot(owner).name.clone(),
                    });
                }
            },
            SignalKind::Quiet => None,
        };
        if kind.is_port() && owner == self.root {
            return Err(ConstructionError::PortOnRoot {
                kind: kind.as_str(),
                name,
            });
        }

        let idx = self.signals.push(Some(SignalSlot {
            name,
            owner,
            kind,
            width: T::WIDTH,
            written: false,
            cell: Box::new(SignalCell::new(init)),
        }));
        let net = NetRef::Signal(idx);
        self.graph.adopt(owner, net);
        if let Some(target) = target {
            self.graph.sensitize(target, net);
        }
        trace!(self.logger, "declared signal"; "path" => self.signal_path_of(idx), "kind" => kind.as_str());
        Ok(Signal::new(idx))
    }

    pub fn wire<T: SignalValue, S: Into<String>>(
        &mut self,
        owner: ModuleId,
        name: S,
        init: Option<T>,
    ) -> Result<Signal<T>, ConstructionError> {
        self.signal(owner, name, SignalKind::Wire, init)
    }

    pub fn input<T: SignalValue, S: Into<String>>(
        &mut self,
        owner: ModuleId,
        name: S,
        init: Option<T>,
    ) -> Result<Signal<T>, ConstructionError> {
        self.signal(owner, name, SignalKind::Input, init)
    }

    pub fn output<T: SignalValue, S: Into<String>>(
        &mut self,
        owner: ModuleId,
        name: S,
        init: Option<T>,
    ) -> Result<Signal<T>, ConstructionError> {
        self.signal(owner, name, SignalKind::Output, init)
    }

    pub fn qwire<T: SignalValue, S: Into<String>>(
        &mut self,
        owner: ModuleId,
        name: S,
        init: Option<T>,
    ) -> Result<Signal<T>, ConstructionError> {
        self.signal(owner, name, SignalKind::Quiet, init)
    }

    /// Declares a register owned by, and sensitizing, `owner`. A `None`
    /// initializer starts both stages unknown.
    pub fn register<T: SignalValue, S: Into<String>>(
        &mut self,
        owner: ModuleId,
        name: S,
        init: Option<T>,
    ) -> Result<Register<T>, ConstructionError> {
        let name = name.into();
        if !self.is_live(owner) {
            return Err(ConstructionError::UnknownModule {
                what: "register",
                name,
            });
        }
        let idx = self.registers.push(Some(RegisterSlot {
            name,
            owner,
            width: T::WIDTH,
            cell: Box::new(RegisterCell::new(init)),
        }));
        let net = NetRef::Register(idx);
        self.graph.adopt(owner, net);
        self.graph.sensitize(owner, net);
        trace!(self.logger, "declared register"; "path" => self.register_path_of(idx));
        Ok(Register::new(idx))
    }

    /// Overrides the display width of a signal.
    pub fn set_signal_width<T>(
        &mut self,
        signal: Signal<T>,
        width: u32,
    ) -> Result<(), ConstructionError> {
        if width == 0 {
            return Err(ConstructionError::InvalidWidth(
                self.signal_path_of(signal.idx()),
            ));
        }
        self.signal_slot_mut(signal.idx()).width = width;
        Ok(())
    }

    /// Overrides the display width of a register.
    pub fn set_register_width<T>(
        &mut self,
        register: Register<T>,
        width: u32,
    ) -> Result<(), ConstructionError> {
        if width == 0 {
            return Err(ConstructionError::InvalidWidth(
                self.register_path_of(register.idx()),
            ));
        }
        self.register_slot_mut(register.idx()).width = width;
        Ok(())
    }

    /// Installs the behaviour evaluated for `module`. The root is driven by
    /// the testbench and takes no behaviour.
    pub fn install<M: Module>(
        &mut self,
        module: ModuleId,
        behaviour: M,
    ) -> Result<(), ConstructionError> {
        if !self.is_live(module) {
            return Err(ConstructionError::UnknownModule {
                what: "behaviour",
                name: format!("module #{}", module.index()),
            });
        }
        let is_root = module == self.root;
        let slot = self.module_slot_mut(module);
        if slot.installed || is_root {
            return Err(ConstructionError::BehaviourAlreadyInstalled(
                slot.name.clone(),
            ));
        }
        slot.installed = true;
        slot.behaviour = Some(Box::new(behaviour));
        Ok(())
    }

    /// Makes `module` evaluate whenever `net` changes. Returns false if it
    /// already did.
    pub fn sensitize<N: Into<NetRef>>(
        &mut self,
        module: ModuleId,
        net: N,
    ) -> Result<bool, ConstructionError> {
        let net = net.into();
        self.check_edge(module, net)?;
        Ok(self.graph.sensitize(module, net))
    }

    /// Removes a sensitization edge. Returns false if there was none.
    pub fn desensitize<N: Into<NetRef>>(
        &mut self,
        module: ModuleId,
        net: N,
    ) -> Result<bool, ConstructionError> {
        let net = net.into();
        self.check_edge(module, net)?;
        Ok(self.graph.desensitize(module, net))
    }

    fn check_edge(
        &self,
        module: ModuleId,
        net: NetRef,
    ) -> Result<(), ConstructionError> {
        if !self.is_live(module) {
            return Err(ConstructionError::AlreadyRemoved("module"));
        }
        let net_live = match net {
            NetRef::Signal(s) => self.signals.get(s).is_some_and(Option::is_some),
            NetRef::Register(r) => {
                self.registers.get(r).is_some_and(Option::is_some)
            }
        };
        if !net_live {
            return Err(ConstructionError::AlreadyRemoved(match net {
                NetRef::Signal(_) => "signal",
                NetRef::Register(_) => "register",
            }));
        }
        Ok(())
    }

    /// Removes `module`, all of its descendants and everything they own.
    pub fn remove_module(
        &mut self,
        module: ModuleId,
    ) -> Result<(), ConstructionError> {
        if module == self.root {
            return Err(ConstructionError::CannotRemoveRoot(
                self.module_slot(module).name.clone(),
            ));
        }
        if !self.is_live(module) {
            return Err(ConstructionError::AlreadyRemoved("module"));
        }
        debug!(self.logger, "removing module"; "path" => self.path(module));

        let removed = self.graph.remove_module(module);
        for net in removed.nets {
            match net {
                NetRef::Signal(s) => self.signals[s] = None,
                NetRef::Register(r) => self.registers[r] = None,
            }
        }
        for m in removed.modules {
            self.modules[m] = None;
            self.run_set.remove(&m);
        }
        self.dirty.retain(|s| self.signals[*s].is_some());
        Ok(())
    }

    pub fn remove_signal<T>(
        &mut self,
        signal: Signal<T>,
    ) -> Result<(), ConstructionError> {
        let idx = signal.idx();
        if !self.signals.get(idx).is_some_and(Option::is_some) {
            return Err(ConstructionError::AlreadyRemoved("signal"));
        }
        self.graph.remove_net(NetRef::Signal(idx));
        self.signals[idx] = None;
        self.dirty.retain(|s| *s != idx);
        Ok(())
    }

    pub fn remove_register<T>(
        &mut self,
        register: Register<T>,
    ) -> Result<(), ConstructionError> {
        let idx = register.idx();
        if !self.registers.get(idx).is_some_and(Option::is_some) {
            return Err(ConstructionError::AlreadyRemoved("register"));
        }
        self.graph.remove_net(NetRef::Register(idx));
        self.registers[idx] = None;
        Ok(())
    }

    // ----- signal access -----

    pub fn get<T: SignalValue>(&self, signal: Signal<T>) -> T {
        self.signal_cell(signal).value().clone()
    }

    pub fn is_unknown<T: SignalValue>(&self, signal: Signal<T>) -> bool {
        self.signal_cell(signal).is_unknown()
    }

    /// The value the signal had before its first write this cycle.
    pub fn previous<T: SignalValue>(&self, signal: Signal<T>) -> T {
        self.signal_cell(signal).old_value().clone()
    }

    /// Whether the signal was unknown before its first write this cycle.
    pub fn was_unknown<T: SignalValue>(&self, signal: Signal<T>) -> bool {
        self.signal_cell(signal).was_unknown()
    }

    pub fn width<T>(&self, signal: Signal<T>) -> u32 {
        self.signal_slot(signal.idx()).width
    }

    pub fn signal_kind<T>(&self, signal: Signal<T>) -> SignalKind {
        self.signal_slot(signal.idx()).kind
    }

    /// Drives a known value. The sensitized module is triggered if the
    /// signal's state changes.
    pub fn set<T: SignalValue>(&mut self, signal: Signal<T>, value: T) {
        let changed = self.write_signal(signal, |cell| cell.write(value));
        if changed {
            self.trigger(NetRef::Signal(signal.idx()));
        }
    }

    /// Drives the unknown state, keeping the underlying value.
    pub fn set_unknown<T: SignalValue>(&mut self, signal: Signal<T>) {
        let changed = self.write_signal(signal, |cell| cell.write_unknown());
        if changed {
            self.trigger(NetRef::Signal(signal.idx()));
        }
    }

    fn write_signal<T: SignalValue, F>(
        &mut self,
        signal: Signal<T>,
        write: F,
    ) -> bool
    where
        F: FnOnce(&mut SignalCell<T>) -> bool,
    {
        let idx = signal.idx();
        let slot = self.signal_slot_mut(idx);
        let first_write = !slot.written;
        if first_write {
            slot.written = true;
            slot.cell.snapshot();
        }
        let name = &slot.name;
        let cell = slot
            .cell
            .as_any_mut()
            .downcast_mut::<SignalCell<T>>()
            .unwrap_or_else(|| wrong_type::<T>("signal", name));
        let changed = write(cell);
        if first_write {
            self.dirty.push(idx);
        }
        changed
    }

    // ----- register access -----

    /// The committed value.
    pub fn q<T: SignalValue>(&self, register: Register<T>) -> T {
        self.register_cell(register).committed().clone()
    }

    /// The pending value, committed on the next clock edge.
    pub fn next_value<T: SignalValue>(&self, register: Register<T>) -> T {
        self.register_cell(register).pending().clone()
    }

    pub fn register_is_unknown<T: SignalValue>(
        &self,
        register: Register<T>,
    ) -> bool {
        self.register_cell(register).committed_unknown()
    }

    pub fn register_will_be_unknown<T: SignalValue>(
        &self,
        register: Register<T>,
    ) -> bool {
        self.register_cell(register).pending_unknown()
    }

    pub fn register_width<T>(&self, register: Register<T>) -> u32 {
        self.register_slot(register.idx()).width
    }

    /// Schedules `value` for the next clock edge. Never triggers anything by
    /// itself.
    pub fn assign_next<T: SignalValue>(
        &mut self,
        register: Register<T>,
        value: T,
    ) {
        self.register_cell_mut(register).assign(value);
    }

    pub fn assign_unknown<T: SignalValue>(&mut self, register: Register<T>) {
        self.register_cell_mut(register).assign_unknown();
    }

    /// Marks both stages unknown right away. If the committed value was
    /// known, dependents are triggered and the register is traced with the
    /// next clock edge.
    pub fn force_unknown<T: SignalValue>(&mut self, register: Register<T>) {
        let idx = register.idx();
        if self.register_slot_mut(idx).cell.force_unknown() {
            self.trigger(NetRef::Register(idx));
            self.forced.push(idx);
        }
    }

    /// Reports the clock-edge changes of `register` in
    /// [`traced_changes`](Self::traced_changes) and the simulation log.
    pub fn trace_register<T>(&mut self, register: Register<T>) {
        self.traced.insert(register.idx(), true);
    }

    /// Traces every register currently in the design.
    pub fn trace_all_registers(&mut self) {
        for (idx, slot) in self.registers.iter() {
            if slot.is_some() {
                self.traced.insert(idx, true);
            }
        }
    }

    pub fn untrace_register<T>(&mut self, register: Register<T>) {
        self.traced.insert(register.idx(), false);
    }

    pub fn is_traced<T>(&self, register: Register<T>) -> bool {
        self.traced[register.idx()]
    }

    /// The changes of traced registers at the clock edge of the current
    /// cycle, ordered by path.
    pub fn traced_changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    // ----- scheduling control -----

    /// Adds `module` to the current run-set.
    pub fn force_eval(&mut self, module: ModuleId) {
        if self.is_live(module) {
            self.run_set.insert(module);
        } else {
            warn!(self.logger, "ignoring force_eval of a removed module"; "module" => module.index());
        }
    }

    /// Adds `module` to the run-set at the start of the next cycle.
    pub fn force_eval_next_clock(&mut self, module: ModuleId) {
        self.module_slot_mut(module).needs_evaluation = true;
    }

    /// Asks the simulation to stop at the end of the current cycle with a
    /// user-defined exit code. The first request of a cycle wins.
    pub fn end_simulation<S: Into<String>>(&mut self, code: i32, message: S) {
        if self.stop.is_none() {
            self.stop = Some(RunStatus::UserRequested {
                code,
                message: message.into(),
            });
        }
    }

    /// Asks the simulation to stop normally at the end of the current cycle.
    pub fn finish(&mut self) {
        if self.stop.is_none() {
            self.stop = Some(RunStatus::Normal);
        }
    }

    pub fn is_pending(&self, module: ModuleId) -> bool {
        self.run_set.contains(&module)
    }

    pub fn pending_modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.run_set.iter().copied()
    }

    // ----- hierarchy queries -----

    pub fn is_live(&self, module: ModuleId) -> bool {
        self.modules.get(module).is_some_and(Option::is_some)
    }

    /// The local name of `module`.
    pub fn name(&self, module: ModuleId) -> &str {
        &self.module_slot(module).name
    }

    /// The hierarchical name of `module`, e.g. `tb.counter`.
    pub fn path(&self, module: ModuleId) -> String {
        let mut names = vec![];
        let mut current = Some(module);
        while let Some(m) = current {
            let slot = self.module_slot(m);
            names.push(slot.name.as_str());
            current = slot.parent;
        }
        names.iter().rev().join(".")
    }

    pub fn signal_path<T>(&self, signal: Signal<T>) -> String {
        self.signal_path_of(signal.idx())
    }

    pub fn register_path<T>(&self, register: Register<T>) -> String {
        self.register_path_of(register.idx())
    }

    pub(crate) fn signal_path_of(&self, idx: SignalIdx) -> String {
        let slot = self.signal_slot(idx);
        format!("{}.{}", self.path(slot.owner), slot.name)
    }

    pub(crate) fn register_path_of(&self, idx: RegisterIdx) -> String {
        let slot = self.register_slot(idx);
        format!("{}.{}", self.path(slot.owner), slot.name)
    }

    pub fn parent(&self, module: ModuleId) -> Option<ModuleId> {
        self.graph.parent_of(module)
    }

    pub fn children(&self, module: ModuleId) -> &[ModuleId] {
        self.graph.children_of(module)
    }

    /// The modules triggered when `net` changes.
    pub fn dependents<N: Into<NetRef>>(&self, net: N) -> Vec<ModuleId> {
        self.graph.dependents_of(net.into()).collect()
    }

    /// Restores every signal and register to its construction-time state
    /// and empties the run-set.
    pub fn reset_to_instance_state(&mut self) {
        for slot in self.signals.values_mut().flatten() {
            slot.cell.reset_to_init();
            slot.written = false;
        }
        for slot in self.registers.values_mut().flatten() {
            slot.cell.reset_to_init();
        }
        for slot in self.modules.values_mut().flatten() {
            slot.needs_evaluation = false;
            slot.evaluated_this_cycle = false;
        }
        self.run_set.clear();
        self.dirty.clear();
        self.changes.clear();
        self.forced.clear();
        self.stop = None;
        debug!(self.logger, "restored instance state");
    }

    // ----- scheduler internals -----

    pub(crate) fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub(crate) fn set_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
    }

    pub(crate) fn live_modules(&self) -> impl Iterator<Item = ModuleIdx> + '_ {
        self.modules
            .iter()
            .filter_map(|(idx, slot)| slot.as_ref().map(|_| idx))
    }

    /// Adds every live module to the run-set.
    pub(crate) fn kick_start(&mut self) {
        let all = self.live_modules().collect_vec();
        self.run_set.extend(all);
    }

    /// Clears the per-cycle evaluation flags and promotes modules flagged by
    /// `force_eval_next_clock`.
    pub(crate) fn begin_cycle(&mut self) {
        self.changes.clear();
        for (idx, slot) in self.modules.iter_mut() {
            let Some(slot) = slot else { continue };
            slot.evaluated_this_cycle = false;
            if slot.needs_evaluation {
                slot.needs_evaluation = false;
                self.run_set.insert(idx);
            }
        }
    }

    /// Commits every register, depth-first with a module's registers before
    /// its children. Returns the registers whose state changed, including
    /// those forced unknown since the last edge.
    pub(crate) fn commit_registers(&mut self) -> Vec<RegisterIdx> {
        let order = self
            .graph
            .subtree(self.root)
            .into_iter()
            .flat_map(|m| self.graph.owned_by(m).iter().copied())
            .filter_map(|net| match net {
                NetRef::Register(r) => Some(r),
                NetRef::Signal(_) => None,
            })
            .collect_vec();

        let forced = std::mem::take(&mut self.forced);
        let mut changed = vec![];
        for idx in order {
            let traced = self.traced[idx];
            let slot = self.register_slot_mut(idx);
            let width = slot.width;
            let start = traced.then(|| slot.cell.trace_value(width));
            if slot.cell.commit() {
                if let Some(start) = start {
                    let end = slot.cell.trace_value(width);
                    let path = self.register_path_of(idx);
                    self.changes.push(ChangeRecord {
                        path,
                        width,
                        start,
                        end,
                    });
                }
                self.trigger(NetRef::Register(idx));
                changed.push(idx);
            } else if forced.contains(&idx) {
                changed.push(idx);
            }
        }
        self.changes.sort_by(|a, b| a.path.cmp(&b.path));
        changed
    }

    pub(crate) fn run_set_is_empty(&self) -> bool {
        self.run_set.is_empty()
    }

    pub(crate) fn take_run_set(&mut self) -> Vec<ModuleIdx> {
        std::mem::take(&mut self.run_set).into_iter().collect()
    }

    /// Marks `module` evaluated, rolling its registers' pending stage back
    /// to the committed one if it already ran this cycle. Returns false if
    /// the module no longer exists.
    pub(crate) fn prepare_eval(&mut self, module: ModuleIdx) -> bool {
        let Some(Some(slot)) = self.modules.get_mut(module) else {
            return false;
        };
        let replay = slot.evaluated_this_cycle;
        slot.evaluated_this_cycle = true;
        if replay {
            let owned = self
                .graph
                .owned_by(module)
                .iter()
                .filter_map(|net| match net {
                    NetRef::Register(r) => Some(*r),
                    NetRef::Signal(_) => None,
                })
                .collect_vec();
            for r in owned {
                self.register_slot_mut(r).cell.restore_replica();
            }
        }
        true
    }

    pub(crate) fn take_behaviour(
        &mut self,
        module: ModuleIdx,
    ) -> Option<Box<dyn Module>> {
        self.modules
            .get_mut(module)
            .and_then(Option::as_mut)
            .and_then(|slot| slot.behaviour.take())
    }

    /// Puts a behaviour back unless its module was removed meanwhile.
    pub(crate) fn restore_behaviour(
        &mut self,
        module: ModuleIdx,
        behaviour: Box<dyn Module>,
    ) {
        if let Some(Some(slot)) = self.modules.get_mut(module) {
            slot.behaviour = Some(behaviour);
        }
    }

    /// Ends the cycle for every written signal. Returns the signals whose
    /// state differs from their cycle-start state, in index order.
    pub(crate) fn settle(&mut self) -> Vec<SignalIdx> {
        let mut dirty = std::mem::take(&mut self.dirty);
        dirty.sort_unstable();
        dirty.dedup();

        let mut changed = vec![];
        for idx in dirty {
            let Some(Some(slot)) = self.signals.get_mut(idx) else {
                continue;
            };
            if slot.cell.differs_from_snapshot() {
                changed.push(idx);
            }
            slot.cell.snapshot();
            slot.written = false;
        }
        changed
    }

    pub(crate) fn take_stop_request(&mut self) -> Option<RunStatus> {
        self.stop.take()
    }

    pub(crate) fn signal_trace_value(&self, idx: SignalIdx) -> TraceValue {
        let slot = self.signal_slot(idx);
        slot.cell.trace_value(slot.width)
    }

    pub(crate) fn register_trace_value(&self, idx: RegisterIdx) -> TraceValue {
        let slot = self.register_slot(idx);
        slot.cell.trace_value(slot.width)
    }

    pub(crate) fn module_slot(&self, idx: ModuleIdx) -> &ModuleSlot {
        self.modules
            .get(idx)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| removed("module", idx.index()))
    }

    fn module_slot_mut(&mut self, idx: ModuleIdx) -> &mut ModuleSlot {
        self.modules
            .get_mut(idx)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| removed("module", idx.index()))
    }

    pub(crate) fn signal_slot(&self, idx: SignalIdx) -> &SignalSlot {
        self.signals
            .get(idx)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| removed("signal", idx.index()))
    }

    fn signal_slot_mut(&mut self, idx: SignalIdx) -> &mut SignalSlot {
        self.signals
            .get_mut(idx)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| removed("signal", idx.index()))
    }

    pub(crate) fn register_slot(&self, idx: RegisterIdx) -> &RegisterSlot {
        self.registers
            .get(idx)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| removed("register", idx.index()))
    }

    fn register_slot_mut(&mut self, idx: RegisterIdx) -> &mut RegisterSlot {
        self.registers
            .get_mut(idx)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| removed("register", idx.index()))
    }

    fn signal_cell<T: SignalValue>(&self, signal: Signal<T>) -> &SignalCell<T> {
        let slot = self.signal_slot(signal.idx());
        slot.cell
            .as_any()
            .downcast_ref()
            .unwrap_or_else(|| wrong_type::<T>("signal", &slot.name))
    }

    fn register_cell<T: SignalValue>(
        &self,
        register: Register<T>,
    ) -> &RegisterCell<T> {
        let slot = self.register_slot(register.idx());
        slot.cell
            .as_any()
            .downcast_ref()
            .unwrap_or_else(|| wrong_type::<T>("register", &slot.name))
    }

    fn register_cell_mut<T: SignalValue>(
        &mut self,
        register: Register<T>,
    ) -> &mut RegisterCell<T> {
        let slot = self.register_slot_mut(register.idx());
        let name = &slot.name;
        slot.cell
            .as_any_mut()
            .downcast_mut()
            .unwrap_or_else(|| wrong_type::<T>("register", name))
    }

    fn trigger(&mut self, net: NetRef) {
        self.run_set.extend(self.graph.dependents_of(net));
    }
}

impl Drop for SimContext {
    fn drop(&mut self) {
        CONTEXT_ACTIVE.with(|active| active.set(false));
    }
}

fn removed(kind: &str, index: usize) -> ! {
    panic!("{kind} #{index} was removed or was never part of this context")
}

fn wrong_type<T>(kind: &str, name: &str) -> ! {
    panic!(
        "{kind} \"{name}\" does not carry values of type {}",
        type_name::<T>()
    )
}
