//=====================================================
// File: task/registry.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Process-wide registry of live tasks
// Objective: Own every task in most-recently-spawned-first order, assign ids,
//            account memory, and keep the scheduler cursor stable while the
//            collection changes under it
//=====================================================

use tracing::info;

use super::{Task, TaskId, TaskLimits, TaskStatus};

//=====================================================
// SECTION 1: Slots
//=====================================================

#[derive(Debug)]
enum Slot {
    Parked(Box<Task>),
    /// The task body is checked out by the interpreter for its quantum.
    Running {
        id: TaskId,
        name: String,
        footprint: usize,
    },
}

impl Slot {
    fn id(&self) -> TaskId {
        match self {
            Slot::Parked(task) => task.id(),
            Slot::Running { id, .. } => *id,
        }
    }

    fn name(&self) -> &str {
        match self {
            Slot::Parked(task) => task.name(),
            Slot::Running { name, .. } => name,
        }
    }

    fn status(&self) -> TaskStatus {
        match self {
            Slot::Parked(task) => task.status(),
            Slot::Running { .. } => TaskStatus::Running,
        }
    }

    fn footprint(&self) -> usize {
        match self {
            Slot::Parked(task) => task.footprint(),
            Slot::Running { footprint, .. } => *footprint,
        }
    }
}

//=====================================================
// SECTION 2: Registry
//=====================================================

#[derive(Debug)]
pub struct Registry {
    slots: Vec<Slot>,
    cursor: usize,
    last_id: TaskId,
    limits: TaskLimits,
    memory_used: usize,
    peak_memory: usize,
}

impl Registry {
    /// Ids are handed out starting just above `reserved`.
    pub fn new(reserved: TaskId, limits: TaskLimits) -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
            last_id: reserved,
            limits,
            memory_used: 0,
            peak_memory: 0,
        }
    }

    pub fn limits(&self) -> &TaskLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    pub fn peak_memory(&self) -> usize {
        self.peak_memory
    }

    /// Create a fresh task and link it at the head.
    ///
    /// The cursor shifts with the insertion so that, during a pass, the task
    /// it pointed at stays current. Callers start a pass with [`rewind`](Self::rewind).
    pub fn spawn(&mut self, name: &str) -> TaskId {
        self.last_id += 1;
        let task = Task::new(self.last_id, name, &self.limits);
        self.memory_used += task.footprint();
        self.peak_memory = self.peak_memory.max(self.memory_used);
        if !self.slots.is_empty() {
            self.cursor += 1;
        }
        self.slots.insert(0, Slot::Parked(Box::new(task)));
        info!(task = self.last_id, "spawned new task '{}' as {}", name, self.last_id);
        self.last_id
    }

    /// Unlink `id`, wake its waiters, and release its memory.
    ///
    /// Returns the ids of the tasks that were woken, or `None` when `id` is
    /// not registered.
    pub fn halt(&mut self, id: TaskId) -> Option<Vec<TaskId>> {
        let index = self.position(id)?;
        let slot = self.slots.remove(index);
        if index < self.cursor {
            self.cursor -= 1;
        }
        self.memory_used = self.memory_used.saturating_sub(slot.footprint());
        info!(task = id, "task '{}' ({}) completed", slot.name(), id);

        let mut woken = Vec::new();
        for other in &mut self.slots {
            if let Slot::Parked(task) = other {
                if task.wait_for == Some(id) {
                    task.wait_for = None;
                    task.ready = true;
                    woken.push(task.id());
                }
            }
        }
        Some(woken)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id() == id)
    }

    /// Ids in link order, head first.
    pub fn ids(&self) -> Vec<TaskId> {
        self.slots.iter().map(Slot::id).collect()
    }

    pub fn id_at(&self, index: usize) -> Option<TaskId> {
        self.slots.get(index).map(Slot::id)
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(Slot::name)
    }

    pub fn status_at(&self, index: usize) -> Option<TaskStatus> {
        self.slots.get(index).map(Slot::status)
    }

    /// Borrow a parked task. The running task is not reachable here.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.slots.iter().find_map(|slot| match slot {
            Slot::Parked(task) if task.id() == id => Some(task.as_ref()),
            _ => None,
        })
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.slots.iter_mut().find_map(|slot| match slot {
            Slot::Parked(task) if task.id() == id => Some(task.as_mut()),
            _ => None,
        })
    }

    //=====================================================
    // SECTION 3: Scheduler Cursor
    //=====================================================

    /// Id of the task the cursor points at, wrapping to the head past the tail.
    pub(crate) fn cursor_id(&mut self) -> Option<TaskId> {
        if self.cursor >= self.slots.len() {
            self.cursor = 0;
        }
        self.slots.get(self.cursor).map(Slot::id)
    }

    pub(crate) fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Move past `current`. If `current` was removed, its successor already
    /// occupies the cursor position.
    pub(crate) fn advance(&mut self, current: TaskId) {
        if self.slots.get(self.cursor).map(Slot::id) == Some(current) {
            self.cursor += 1;
        }
    }

    /// True when the cursor has run past the tail.
    pub(crate) fn at_end(&self) -> bool {
        self.cursor >= self.slots.len()
    }

    /// Take the task body at the cursor out of its slot.
    pub(crate) fn checkout(&mut self) -> Option<Box<Task>> {
        let slot = self.slots.get_mut(self.cursor)?;
        let placeholder = match slot {
            Slot::Parked(task) => Slot::Running {
                id: task.id(),
                name: task.name().to_string(),
                footprint: task.footprint(),
            },
            Slot::Running { .. } => return None,
        };
        match std::mem::replace(slot, placeholder) {
            Slot::Parked(task) => Some(task),
            Slot::Running { .. } => None,
        }
    }

    /// Return a checked-out task to its slot.
    pub(crate) fn checkin(&mut self, task: Box<Task>) {
        let id = task.id();
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.id() == id) {
            *slot = Slot::Parked(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new(100, TaskLimits::default())
    }

    #[test]
    fn spawn_links_at_head_with_fresh_ids() {
        let mut registry = registry();
        let a = registry.spawn("a");
        let b = registry.spawn("b");
        assert_eq!((a, b), (101, 102));
        assert_eq!(registry.ids(), vec![b, a]);
        assert_eq!(registry.name_at(1), Some("a"));
    }

    #[test]
    fn halt_wakes_only_matching_waiters() {
        let mut registry = registry();
        let target = registry.spawn("target");
        let waiter = registry.spawn("waiter");
        let bystander = registry.spawn("bystander");
        for (id, wait) in [(waiter, target), (bystander, 999)] {
            let task = registry.get_mut(id).unwrap();
            task.ready = false;
            task.wait_for = Some(wait);
        }

        let woken = registry.halt(target).unwrap();
        assert_eq!(woken, vec![waiter]);
        assert!(registry.get(waiter).unwrap().is_ready());
        assert!(!registry.get(bystander).unwrap().is_ready());
        assert!(!registry.contains(target));
    }

    #[test]
    fn memory_counter_returns_to_zero() {
        let mut registry = registry();
        let a = registry.spawn("a");
        let b = registry.spawn("b");
        assert_eq!(registry.memory_used(), 2 * TaskLimits::default().footprint());
        registry.halt(a);
        registry.halt(b);
        assert_eq!(registry.memory_used(), 0);
        assert_eq!(registry.peak_memory(), 2 * TaskLimits::default().footprint());
        assert!(registry.halt(a).is_none());
    }

    #[test]
    fn checkout_reports_running_and_checkin_restores() {
        let mut registry = registry();
        let a = registry.spawn("a");
        let task = registry.checkout().unwrap();
        assert_eq!(task.id(), a);
        assert_eq!(registry.status_at(0), Some(TaskStatus::Running));
        assert!(registry.get(a).is_none());
        assert!(registry.checkout().is_none());
        registry.checkin(task);
        assert_eq!(registry.status_at(0), Some(TaskStatus::Ready));
    }

    #[test]
    fn cursor_stays_on_current_task_across_head_spawns() {
        let mut registry = registry();
        let a = registry.spawn("a");
        let b = registry.spawn("b");
        registry.rewind();
        assert_eq!(registry.cursor_id(), Some(b));
        registry.advance(b);
        assert_eq!(registry.cursor_id(), Some(a));
        let c = registry.spawn("c");
        assert_eq!(registry.cursor_id(), Some(a));
        registry.advance(a);
        assert_eq!(registry.cursor_id(), Some(c));
    }

    #[test]
    fn spawn_outside_a_pass_shifts_cursor_until_rewind() {
        let mut registry = registry();
        let a = registry.spawn("a");
        let b = registry.spawn("b");
        assert_eq!(registry.cursor_id(), Some(a));
        registry.rewind();
        assert_eq!(registry.cursor_id(), Some(b));
    }

    #[test]
    fn removing_current_task_leaves_cursor_on_successor() {
        let mut registry = registry();
        let a = registry.spawn("a");
        let b = registry.spawn("b");
        let c = registry.spawn("c");
        registry.rewind();
        assert_eq!(registry.cursor_id(), Some(c));
        registry.advance(c);
        assert_eq!(registry.cursor_id(), Some(b));
        registry.halt(b);
        registry.advance(b);
        assert_eq!(registry.cursor_id(), Some(a));
        registry.halt(c);
        assert_eq!(registry.cursor_id(), Some(a));
    }
}
