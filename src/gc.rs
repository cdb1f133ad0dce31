//! Incremental mark-and-sweep garbage collection.
//!
//! Objects live in fixed-size chunks and are handed out as reference-counted
//! `Gc<T>` handles. Reference counts are not the liveness criterion: a cycle
//! starts by counting heap edges, and any object whose handle count exceeds
//! its heap edge count is held from outside the heap and becomes a root.
//! Everything reachable from the roots survives, so unreachable cycles are
//! reclaimed.
//!
//! Marking can be split into slices. While a cycle is in progress, objects
//! are allocated black and every store into a traced slot must call
//! [`Gc::write_barrier`] on both the overwritten and the stored value, so
//! the snapshot taken at the start of the cycle is never violated.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use tracing::trace;

// ============================================================================
// MarkBits - one bit per cell of a chunk
// ============================================================================

/// Chunk capacity: objects per chunk (matches the 256 bits of `MarkBits`)
const CHUNK_CAPACITY: usize = 256;

/// Default threshold: collect after this many net allocations
const DEFAULT_GC_THRESHOLD: usize = 100;

#[derive(Clone, Copy, Default)]
struct MarkBits {
    words: [u64; 4],
}

impl MarkBits {
    #[inline]
    fn set(&mut self, slot: usize) {
        if let Some(word) = self.words.get_mut(slot >> 6) {
            *word |= 1 << (slot & 63);
        }
    }

    #[inline]
    fn is_set(&self, slot: usize) -> bool {
        self.words
            .get(slot >> 6)
            .is_some_and(|word| word & (1 << (slot & 63)) != 0)
    }

    #[inline]
    fn unset(&mut self, slot: usize) {
        if let Some(word) = self.words.get_mut(slot >> 6) {
            *word &= !(1 << (slot & 63));
        }
    }

    #[inline]
    fn clear(&mut self) {
        self.words = [0; 4];
    }

    fn unmarked(&self, len: usize) -> impl Iterator<Item = usize> + '_ {
        (0..len.min(CHUNK_CAPACITY)).filter(move |slot| !self.is_set(*slot))
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Allocation hint: nursery cells are reclaimed without running their
/// finalizer, tenured cells always finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Nursery,
    Tenured,
}

// ============================================================================
// Gc - handle to a GC-managed object
// ============================================================================

/// A handle to a GC-managed object.
///
/// Cloning increments the cell's handle count and dropping decrements it. A
/// cell whose count reaches zero is reclaimed immediately; cells that are
/// only kept alive by each other are reclaimed by the next collection.
///
/// Handles survive relocation: `borrow`, `id` and equality always resolve
/// through forwarding pointers to the live cell.
pub struct Gc<T: Default + Reset + Traceable> {
    /// Pointer to the cell this handle was created for (may be forwarded)
    ptr: NonNull<GcBox<T>>,

    /// Weak reference to space - guards against touching cells after the heap is gone
    space: Weak<RefCell<Space<T>>>,
}

impl<T: Default + Reset + Traceable> Gc<T> {
    /// The live cell, following forwarding pointers left by relocation
    #[inline]
    fn cell(&self) -> &GcBox<T> {
        // Safety: a forwarded cell holds a counted edge to its successor, so
        // every cell on the chain is alive as long as this handle is.
        unsafe { resolve(self.ptr).as_ref() }
    }

    /// Borrow the inner data immutably
    pub fn borrow(&self) -> Ref<'_, T> {
        self.cell().data.borrow()
    }

    /// Borrow the inner data mutably
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.cell().data.borrow_mut()
    }

    /// Try to borrow immutably, failing if the object is mutably borrowed
    pub fn try_borrow(&self) -> Option<Ref<'_, T>> {
        self.cell().data.try_borrow().ok()
    }

    /// Try to borrow mutably, failing if the object is already borrowed
    pub fn try_borrow_mut(&self) -> Option<RefMut<'_, T>> {
        self.cell().data.try_borrow_mut().ok()
    }

    /// Identity of the live cell
    pub fn id(&self) -> usize {
        self.cell().index
    }

    /// Check if two handles refer to the same object
    pub fn ptr_eq(a: &Gc<T>, b: &Gc<T>) -> bool {
        a.id() == b.id()
    }

    /// Whether this handle points at a cell that has been relocated
    pub fn is_forwarded(&self) -> bool {
        // Safety: self.ptr is kept alive by this handle's count
        unsafe { self.ptr.as_ref().forwarded.get().is_some() }
    }

    /// A handle to the live cell, skipping any forwarding hops
    pub fn maybe_forwarded(&self) -> Gc<T> {
        let live = resolve(self.ptr);
        if live == self.ptr {
            return self.clone();
        }
        let handle = Gc {
            ptr: live,
            space: self.space.clone(),
        };
        if self.space.upgrade().is_some() {
            let cell = handle.cell();
            cell.ref_count.set(cell.ref_count.get() + 1);
        }
        handle
    }

    /// Generation of the live cell
    pub fn generation(&self) -> Generation {
        self.cell().generation.get()
    }

    pub fn is_in_nursery(&self) -> bool {
        self.generation() == Generation::Nursery
    }

    /// Tell an in-progress marking cycle that a reference to this object is
    /// being stored or overwritten.
    #[inline]
    pub fn write_barrier(&self) {
        let Some(space) = self.space.upgrade() else {
            return;
        };
        // A borrowed space means a collector phase is running on this thread,
        // and the mutator cannot race it.
        if let Ok(mut space) = space.try_borrow_mut() {
            space.shade(resolve(self.ptr));
        }
    }

    /// Create a copy of this handle for tracing, without touching counts.
    ///
    /// The copy names the cell this handle counts against, which is what
    /// edge counting needs.
    pub fn copy_ref(&self) -> GcPtr<T> {
        GcPtr { ptr: self.ptr }
    }
}

/// Follow forwarding pointers to the live cell
#[inline]
fn resolve<T: Default + Reset + Traceable>(mut ptr: NonNull<GcBox<T>>) -> NonNull<GcBox<T>> {
    // Safety: see `Gc::cell`
    while let Some(next) = unsafe { ptr.as_ref().forwarded.get() } {
        ptr = next;
    }
    ptr
}

impl<T: Default + Reset + Traceable> PartialEq for Gc<T> {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(self, other)
    }
}

impl<T: Default + Reset + Traceable> Eq for Gc<T> {}

impl<T: Default + Reset + Traceable> Clone for Gc<T> {
    fn clone(&self) -> Self {
        if self.space.upgrade().is_some() {
            // Safety: the space is alive, so the cell is too
            let gc_box = unsafe { self.ptr.as_ref() };
            if !gc_box.pooled.get() {
                gc_box.ref_count.set(gc_box.ref_count.get() + 1);
            }
        }
        Self {
            ptr: self.ptr,
            space: self.space.clone(),
        }
    }
}

impl<T: Default + Reset + Traceable> Drop for Gc<T> {
    fn drop(&mut self) {
        // The chunks are freed together with the space; check it first.
        let Some(space_rc) = self.space.upgrade() else {
            return;
        };

        // Safety: space is alive, so is the cell
        let gc_box = unsafe { self.ptr.as_ref() };
        if gc_box.pooled.get() {
            return;
        }

        let count = gc_box.ref_count.get().saturating_sub(1);
        gc_box.ref_count.set(count);

        if count == 0 {
            // During a collection the space is borrowed; the sweep picks it up.
            if let Ok(mut space) = space_rc.try_borrow_mut() {
                space.reclaim(self.ptr);
            }
        }
    }
}

impl<T: Default + Reset + Traceable> std::fmt::Debug for Gc<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gc").field("id", &self.id()).finish()
    }
}

// ============================================================================
// GcPtr - a Copy pointer without Drop (for tracing)
// ============================================================================

/// A raw pointer to a GC-managed object. Copy and no Drop.
pub struct GcPtr<T: Default + Reset + Traceable> {
    pub(crate) ptr: NonNull<GcBox<T>>,
}

impl<T: Default + Reset + Traceable> Copy for GcPtr<T> {}

impl<T: Default + Reset + Traceable> Clone for GcPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Default + Reset + Traceable> GcPtr<T> {
    /// Index of the cell this pointer names
    pub fn gcbox_index(&self) -> usize {
        // Safety: GcPtrs are only produced from live handles during tracing
        unsafe { self.ptr.as_ref().index }
    }
}

// ============================================================================
// Traceable / Reset
// ============================================================================

/// Types stored in the heap.
pub trait Traceable: Sized + Default + Reset {
    /// Visit every `Gc<Self>` stored in this object, once per stored handle.
    ///
    /// Edge counting relies on the visit count matching the number of
    /// handles held, so a handle must not be skipped or reported twice.
    fn trace<F: FnMut(GcPtr<Self>)>(&self, visitor: F);

    /// Called once when a tenured object is reclaimed, before `reset`.
    fn finalize(&mut self) {}

    /// Whether `finalize` may be deferred to the background batch.
    fn finalize_in_background(&self) -> bool {
        true
    }

    /// Called on the new cell after [`Heap::relocate`] moved the object.
    fn object_moved(&mut self, _old_id: usize) {}
}

/// Trait for types that can be reset to a clean state for pooling.
pub trait Reset: Default {
    /// Reset object to clean state (equivalent to Default but in-place)
    fn reset(&mut self);
}

// ============================================================================
// GcBox - cell storage
// ============================================================================

/// Internal storage for a GC-managed object.
pub struct GcBox<T: Default + Reset + Traceable> {
    /// chunk_idx * CHUNK_CAPACITY + index_in_chunk
    index: usize,
    data: RefCell<T>,
    /// Live handles naming this cell, including heap edges and forwarding
    ref_count: Cell<usize>,
    /// Whether this cell is in the free list
    pooled: Cell<bool>,
    generation: Cell<Generation>,
    /// Successor cell after relocation (counted in its ref_count)
    forwarded: Cell<Option<NonNull<GcBox<T>>>>,
}

impl<T: Default + Reset + Traceable> GcBox<T> {
    fn new(index: usize, generation: Generation) -> Self {
        Self {
            index,
            data: RefCell::new(T::default()),
            ref_count: Cell::new(0),
            pooled: Cell::new(false),
            generation: Cell::new(generation),
            forwarded: Cell::new(None),
        }
    }
}

// ============================================================================
// Space - the internal memory arena
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Marking,
}

enum Drain {
    Done,
    Yielded,
    /// An object was mutably borrowed and could not be traced
    Blocked,
}

#[derive(Default, Clone, Copy)]
struct Counters {
    collections: usize,
    foreground_finalized: usize,
    background_finalized: usize,
    nursery_reclaimed: usize,
    relocated: usize,
}

struct Space<T: Default + Reset + Traceable> {
    /// Inner vecs are allocated at full capacity and never reallocate.
    chunks: Vec<Vec<GcBox<T>>>,
    free_list: Vec<NonNull<GcBox<T>>>,
    marks: Vec<MarkBits>,
    /// Gray objects; persistent so capacity survives between cycles
    mark_stack: Vec<NonNull<GcBox<T>>>,
    sweep_buffer: Vec<NonNull<GcBox<T>>>,
    /// Heap edges per cell, rebuilt at the start of each cycle
    edge_counts: Vec<usize>,
    guard_pool: Vec<Vec<Gc<T>>>,
    phase: Phase,
    nursery_enabled: bool,
    net_allocs: isize,
    /// Threshold for triggering collection (0 = never auto-collect)
    gc_threshold: isize,
    counters: Counters,
    self_weak: Weak<RefCell<Space<T>>>,
}

impl<T: Default + Reset + Traceable> Space<T> {
    fn new() -> Self {
        Self {
            chunks: Vec::new(),
            free_list: Vec::new(),
            marks: Vec::new(),
            mark_stack: Vec::new(),
            sweep_buffer: Vec::new(),
            edge_counts: Vec::new(),
            guard_pool: Vec::new(),
            phase: Phase::Idle,
            nursery_enabled: true,
            net_allocs: 0,
            gc_threshold: DEFAULT_GC_THRESHOLD as isize,
            counters: Counters::default(),
            self_weak: Weak::new(),
        }
    }

    fn create_guard(&mut self) -> Guard<T> {
        let guarded = self.guard_pool.pop().unwrap_or_default();
        Guard {
            space: self.self_weak.clone(),
            guarded: RefCell::new(guarded),
        }
    }

    fn return_guard_to_pool(&mut self, guarded: Vec<Gc<T>>) {
        if self.guard_pool.len() < 16 && guarded.is_empty() {
            self.guard_pool.push(guarded);
        }
    }

    #[inline]
    fn is_marked(&self, index: usize) -> bool {
        self.marks
            .get(index / CHUNK_CAPACITY)
            .is_some_and(|bits| bits.is_set(index % CHUNK_CAPACITY))
    }

    #[inline]
    fn set_mark(&mut self, index: usize) {
        if let Some(bits) = self.marks.get_mut(index / CHUNK_CAPACITY) {
            bits.set(index % CHUNK_CAPACITY);
        }
    }

    /// Take a fresh cell, without triggering a collection
    fn alloc_cell(&mut self, generation: Generation) -> Gc<T> {
        let generation = if self.nursery_enabled {
            generation
        } else {
            Generation::Tenured
        };

        let ptr = if let Some(ptr) = self.free_list.pop() {
            // Safety: free-list pointers come from our chunks, whose storage never moves
            let gc_box = unsafe { ptr.as_ref() };
            gc_box.data.borrow_mut().reset();
            gc_box.pooled.set(false);
            gc_box.forwarded.set(None);
            gc_box.generation.set(generation);
            gc_box.ref_count.set(1);
            ptr
        } else {
            if self
                .chunks
                .last()
                .is_none_or(|chunk| chunk.len() >= CHUNK_CAPACITY)
            {
                self.chunks.push(Vec::with_capacity(CHUNK_CAPACITY));
                self.marks.push(MarkBits::default());
            }
            let chunk_idx = self.chunks.len().saturating_sub(1);
            let Some(chunk) = self.chunks.last_mut() else {
                #[allow(clippy::panic)]
                {
                    panic!("GC internal error: no chunk after creation")
                }
            };
            let index = chunk_idx * CHUNK_CAPACITY + chunk.len();
            chunk.push(GcBox::new(index, generation));
            let Some(gc_box) = chunk.last() else {
                #[allow(clippy::panic)]
                {
                    panic!("GC internal error: chunk empty after push")
                }
            };
            gc_box.ref_count.set(1);
            NonNull::from(gc_box)
        };

        if self.phase == Phase::Marking {
            // Allocated black: nothing in a new cell predates the snapshot.
            // Safety: ptr was produced above from a live chunk
            let index = unsafe { ptr.as_ref().index };
            self.set_mark(index);
        }

        self.net_allocs += 1;
        Gc {
            ptr,
            space: self.self_weak.clone(),
        }
    }

    fn alloc_internal(&mut self, generation: Generation) -> Gc<T> {
        let result = self.alloc_cell(generation);
        if self.phase == Phase::Idle
            && self.gc_threshold > 0
            && self.net_allocs >= self.gc_threshold
        {
            self.collect();
        }
        result
    }

    /// Reclaim a cell whose last handle was dropped outside a collection
    fn reclaim(&mut self, ptr: NonNull<GcBox<T>>) {
        // Safety: called with cells from our chunks
        let gc_box = unsafe { ptr.as_ref() };
        if gc_box.pooled.get() {
            return;
        }
        let Ok(mut data) = gc_box.data.try_borrow_mut() else {
            return;
        };
        if gc_box.generation.get() == Generation::Tenured {
            if data.finalize_in_background() {
                self.counters.background_finalized += 1;
            } else {
                self.counters.foreground_finalized += 1;
            }
            data.finalize();
        } else {
            self.counters.nursery_reclaimed += 1;
        }
        data.reset();
        drop(data);

        if let Some(next) = gc_box.forwarded.take() {
            // Safety: the forwarding edge kept `next` alive until now
            let next_box = unsafe { next.as_ref() };
            let count = next_box.ref_count.get().saturating_sub(1);
            next_box.ref_count.set(count);
            if count == 0 {
                self.reclaim(next);
            }
        }
        self.pool_object(ptr);
    }

    fn pool_object(&mut self, ptr: NonNull<GcBox<T>>) {
        // Safety: ptr is one of our cells
        let gc_box = unsafe { ptr.as_ref() };
        if gc_box.pooled.get() {
            return;
        }
        self.net_allocs -= 1;
        gc_box.pooled.set(true);
        self.free_list.push(ptr);
    }

    /// Gray an object if a marking cycle is running and it is still white
    fn shade(&mut self, ptr: NonNull<GcBox<T>>) {
        if self.phase != Phase::Marking {
            return;
        }
        // Safety: ptr was resolved from a live handle
        let gc_box = unsafe { ptr.as_ref() };
        if !gc_box.pooled.get() && !self.is_marked(gc_box.index) {
            self.mark_stack.push(ptr);
        }
    }

    /// Turn a cell gray again so its current contents get traced
    fn rescan(&mut self, ptr: NonNull<GcBox<T>>) {
        if self.phase != Phase::Marking {
            return;
        }
        // Safety: ptr was resolved from a live handle
        let index = unsafe { ptr.as_ref().index };
        if let Some(bits) = self.marks.get_mut(index / CHUNK_CAPACITY) {
            bits.unset(index % CHUNK_CAPACITY);
        }
        self.mark_stack.push(ptr);
    }

    /// Count heap edges and push every externally held object onto the mark stack.
    /// Returns false if some object was mutably borrowed and could not be traced.
    fn begin_marking(&mut self) -> bool {
        for bits in &mut self.marks {
            bits.clear();
        }

        let mut counts = std::mem::take(&mut self.edge_counts);
        counts.clear();
        counts.resize(self.chunks.len() * CHUNK_CAPACITY, 0);

        for gc_box in self.chunks.iter().flatten() {
            if gc_box.pooled.get() {
                continue;
            }
            let Ok(data) = gc_box.data.try_borrow() else {
                self.edge_counts = counts;
                return false;
            };
            data.trace(|child: GcPtr<T>| {
                if let Some(count) = counts.get_mut(child.gcbox_index()) {
                    *count += 1;
                }
            });
            if let Some(next) = gc_box.forwarded.get() {
                // Safety: forwarded cells are alive
                let index = unsafe { next.as_ref().index };
                if let Some(count) = counts.get_mut(index) {
                    *count += 1;
                }
            }
        }

        self.mark_stack.clear();
        for gc_box in self.chunks.iter().flatten() {
            let edges = counts.get(gc_box.index).copied().unwrap_or(0);
            if !gc_box.pooled.get() && gc_box.ref_count.get() > edges {
                self.mark_stack.push(NonNull::from(gc_box));
            }
        }

        trace!(roots = self.mark_stack.len(), "gc: marking started");
        self.edge_counts = counts;
        self.phase = Phase::Marking;
        true
    }

    /// Process gray objects, at most `budget` of them when given
    fn drain(&mut self, budget: Option<usize>) -> Drain {
        let mut stack = std::mem::take(&mut self.mark_stack);
        let mut work = 0usize;
        let mut outcome = Drain::Done;

        while let Some(ptr) = stack.pop() {
            if budget.is_some_and(|limit| work >= limit) {
                stack.push(ptr);
                outcome = Drain::Yielded;
                break;
            }
            // Safety: only live cells are pushed
            let gc_box = unsafe { ptr.as_ref() };
            if gc_box.pooled.get() || self.is_marked(gc_box.index) {
                continue;
            }
            let Ok(data) = gc_box.data.try_borrow() else {
                stack.push(ptr);
                outcome = Drain::Blocked;
                break;
            };
            self.set_mark(gc_box.index);
            work += 1;

            let marks = &self.marks;
            data.trace(|child: GcPtr<T>| {
                // Safety: traced handles name live cells
                let child_box = unsafe { child.ptr.as_ref() };
                let index = child_box.index;
                let marked = marks
                    .get(index / CHUNK_CAPACITY)
                    .is_some_and(|bits| bits.is_set(index % CHUNK_CAPACITY));
                if !marked && !child_box.pooled.get() {
                    stack.push(child.ptr);
                }
            });
            if let Some(next) = gc_box.forwarded.get() {
                stack.push(next);
            }
        }

        self.mark_stack = stack;
        outcome
    }

    fn abort_marking(&mut self) {
        self.mark_stack.clear();
        for bits in &mut self.marks {
            bits.clear();
        }
        self.phase = Phase::Idle;
        trace!("gc: cycle abandoned, an object was borrowed");
    }

    /// Reclaim every white cell. Returns the number of cells reclaimed.
    fn sweep(&mut self) -> usize {
        let mut unmarked = std::mem::take(&mut self.sweep_buffer);
        unmarked.clear();

        for (chunk, bits) in self.chunks.iter().zip(self.marks.iter()) {
            for gc_box in chunk {
                if !gc_box.pooled.get() && bits.is_set(gc_box.index % CHUNK_CAPACITY) {
                    gc_box.generation.set(Generation::Tenured);
                }
            }
            for slot in bits.unmarked(chunk.len()) {
                if let Some(gc_box) = chunk.get(slot)
                    && !gc_box.pooled.get()
                {
                    unmarked.push(NonNull::from(gc_box));
                }
            }
        }

        // Foreground finalizers run first; background-eligible ones are
        // batched after them.
        let mut deferred = Vec::new();
        for ptr in &unmarked {
            // Safety: collected from our chunks above
            let gc_box = unsafe { ptr.as_ref() };
            if gc_box.generation.get() == Generation::Nursery {
                self.counters.nursery_reclaimed += 1;
                continue;
            }
            if let Ok(mut data) = gc_box.data.try_borrow_mut() {
                if data.finalize_in_background() {
                    deferred.push(*ptr);
                } else {
                    data.finalize();
                    self.counters.foreground_finalized += 1;
                }
            }
        }
        for ptr in deferred {
            // Safety: as above
            let gc_box = unsafe { ptr.as_ref() };
            if let Ok(mut data) = gc_box.data.try_borrow_mut() {
                data.finalize();
                self.counters.background_finalized += 1;
            }
        }

        // Reset everything before checking counts so cycles are fully broken.
        for ptr in &unmarked {
            // Safety: as above
            let gc_box = unsafe { ptr.as_ref() };
            if let Ok(mut data) = gc_box.data.try_borrow_mut() {
                data.reset();
            }
            if let Some(next) = gc_box.forwarded.take() {
                // Safety: the forwarding edge kept `next` alive
                let next_box = unsafe { next.as_ref() };
                next_box
                    .ref_count
                    .set(next_box.ref_count.get().saturating_sub(1));
            }
        }

        let mut collected = 0;
        for ptr in &unmarked {
            // Safety: as above
            let gc_box = unsafe { ptr.as_ref() };
            if gc_box.ref_count.get() == 0 {
                self.pool_object(*ptr);
                collected += 1;
            }
        }

        unmarked.clear();
        self.sweep_buffer = unmarked;
        collected
    }

    /// Run (or complete) a full cycle. Returns false if it had to be abandoned.
    fn collect(&mut self) -> bool {
        if self.phase == Phase::Idle && !self.begin_marking() {
            trace!("gc: collection skipped, an object was borrowed");
            return false;
        }
        match self.drain(None) {
            Drain::Done => {}
            Drain::Yielded | Drain::Blocked => {
                self.abort_marking();
                return false;
            }
        }
        let collected = self.sweep();
        self.phase = Phase::Idle;
        self.net_allocs = 0;
        self.counters.collections += 1;
        trace!(collected, live = self.live_count(), "gc: cycle finished");
        true
    }

    fn mark_slice(&mut self, budget: usize) -> bool {
        if self.phase == Phase::Idle {
            return true;
        }
        match self.drain(Some(budget)) {
            Drain::Done => true,
            Drain::Yielded | Drain::Blocked => false,
        }
    }

    /// Move `obj` into a fresh tenured cell and leave a forwarding pointer
    fn relocate(&mut self, obj: &Gc<T>) -> Option<Gc<T>> {
        if self.phase == Phase::Marking && !self.collect() {
            return None;
        }
        let old_ptr = resolve(obj.ptr);
        // Safety: resolved from a live handle
        let old = unsafe { old_ptr.as_ref() };
        let data = std::mem::take(&mut *old.data.try_borrow_mut().ok()?);

        let fresh = self.alloc_cell(Generation::Tenured);
        let fresh_box = fresh.cell();
        {
            let mut slot = fresh_box.data.borrow_mut();
            *slot = data;
            slot.object_moved(old.index);
        }
        fresh_box.ref_count.set(fresh_box.ref_count.get() + 1);
        old.forwarded.set(Some(fresh.ptr));
        self.counters.relocated += 1;
        trace!(from = old.index, to = fresh_box.index, "gc: object relocated");
        Some(fresh)
    }

    fn live_count(&self) -> usize {
        let total: usize = self.chunks.iter().map(|c| c.len()).sum();
        total - self.free_list.len()
    }

    fn stats(&self) -> GcStats {
        let total_objects: usize = self.chunks.iter().map(|c| c.len()).sum();
        let nursery_objects = self
            .chunks
            .iter()
            .flatten()
            .filter(|b| !b.pooled.get() && b.generation.get() == Generation::Nursery)
            .count();

        GcStats {
            total_objects,
            pooled_objects: self.free_list.len(),
            live_objects: total_objects - self.free_list.len(),
            nursery_objects,
            collections: self.counters.collections,
            foreground_finalized: self.counters.foreground_finalized,
            background_finalized: self.counters.background_finalized,
            nursery_reclaimed: self.counters.nursery_reclaimed,
            relocated: self.counters.relocated,
        }
    }
}

impl<T: Default + Reset + Traceable> Drop for Space<T> {
    fn drop(&mut self) {
        // Any handle that outlives the space sees pooled=true and stays away.
        for gc_box in self.chunks.iter().flatten() {
            gc_box.pooled.set(true);
        }
    }
}

// ============================================================================
// Heap - the public wrapper
// ============================================================================

/// Entry point for allocation and collection.
pub struct Heap<T: Default + Reset + Traceable> {
    inner: Rc<RefCell<Space<T>>>,
}

impl<T: Default + Reset + Traceable> Heap<T> {
    pub fn new() -> Self {
        let inner = Rc::new(RefCell::new(Space::new()));
        inner.borrow_mut().self_weak = Rc::downgrade(&inner);
        Self { inner }
    }

    /// Create a new guard for allocating objects
    pub fn create_guard(&self) -> Guard<T> {
        self.inner.borrow_mut().create_guard()
    }

    /// Allocate an object kept alive only by the returned handle and by heap edges
    pub fn alloc(&self, generation: Generation) -> Gc<T> {
        self.inner.borrow_mut().alloc_internal(generation)
    }

    pub fn stats(&self) -> GcStats {
        self.inner.borrow().stats()
    }

    /// Run a full cycle, finishing any incremental cycle in progress.
    /// Returns false if the cycle had to be abandoned because an object was borrowed.
    pub fn collect(&self) -> bool {
        self.inner.borrow_mut().collect()
    }

    /// Set the GC threshold (0 = disable automatic collection)
    pub fn set_gc_threshold(&self, threshold: usize) {
        self.inner.borrow_mut().gc_threshold = threshold as isize;
    }

    /// When disabled, every allocation is tenured
    pub fn set_nursery_enabled(&self, enabled: bool) {
        self.inner.borrow_mut().nursery_enabled = enabled;
    }

    /// Snapshot the roots and begin an incremental cycle.
    pub fn start_incremental(&self) -> bool {
        let mut space = self.inner.borrow_mut();
        space.phase == Phase::Marking || space.begin_marking()
    }

    /// Mark up to `budget` objects. Returns true once no gray objects remain.
    pub fn mark_slice(&self, budget: usize) -> bool {
        self.inner.borrow_mut().mark_slice(budget)
    }

    /// Drain the remaining gray objects and sweep.
    pub fn finish_incremental(&self) -> bool {
        self.collect()
    }

    pub fn is_marking(&self) -> bool {
        self.inner.borrow().phase == Phase::Marking
    }

    /// Whether the live cell behind `obj` is black in the current cycle
    pub fn is_marked(&self, obj: &Gc<T>) -> bool {
        let space = self.inner.borrow();
        space.phase == Phase::Marking && space.is_marked(obj.id())
    }

    /// Exchange the contents of two cells, leaving both identities in place.
    /// Returns false if either object is currently borrowed.
    pub fn swap(&self, a: &Gc<T>, b: &Gc<T>) -> bool {
        if Gc::ptr_eq(a, b) {
            return true;
        }
        {
            let (Some(mut x), Some(mut y)) = (a.try_borrow_mut(), b.try_borrow_mut()) else {
                return false;
            };
            std::mem::swap(&mut *x, &mut *y);
        }
        let mut space = self.inner.borrow_mut();
        space.rescan(resolve(a.ptr));
        space.rescan(resolve(b.ptr));
        trace!(a = a.id(), b = b.id(), "gc: cell contents swapped");
        true
    }

    /// Compact `obj` into a new cell. Old handles keep working through the
    /// forwarding pointer. Returns None if the object is currently borrowed.
    pub fn relocate(&self, obj: &Gc<T>) -> Option<Gc<T>> {
        self.inner.borrow_mut().relocate(obj)
    }
}

impl<T: Default + Reset + Traceable> Default for Heap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + Reset + Traceable> Clone for Heap<T> {
    fn clone(&self) -> Self {
        Heap {
            inner: self.inner.clone(),
        }
    }
}

// ============================================================================
// Guard - root anchor for objects
// ============================================================================

/// A set of handles that keeps objects alive until cleared or dropped.
///
/// Guards also allocate: every object allocated through a guard stays
/// rooted by it. Guard storage returns to the heap's pool on drop.
pub struct Guard<T: Default + Reset + Traceable> {
    space: Weak<RefCell<Space<T>>>,
    guarded: RefCell<Vec<Gc<T>>>,
}

impl<T: Default + Reset + Traceable> Guard<T> {
    /// Allocate a nursery object rooted by this guard.
    ///
    /// # Panics
    /// Panics if the Heap has been dropped while the guard is still alive.
    pub fn alloc(&self) -> Gc<T> {
        self.alloc_in(Generation::Nursery)
    }

    /// Allocate an object that always runs its finalizer
    pub fn alloc_tenured(&self) -> Gc<T> {
        self.alloc_in(Generation::Tenured)
    }

    pub fn alloc_in(&self, generation: Generation) -> Gc<T> {
        let space = self.space.upgrade().unwrap_or_else(|| {
            #[allow(clippy::panic)]
            {
                panic!("GC error: Heap dropped while guard is still alive")
            }
        });
        let result = space.borrow_mut().alloc_internal(generation);
        self.guarded.borrow_mut().push(result.clone());
        result
    }

    /// Add an existing object to this guard's roots.
    pub fn guard(&self, obj: Gc<T>) {
        self.guarded.borrow_mut().push(obj);
    }

    /// Remove one occurrence of an object from this guard's roots.
    pub fn unguard(&self, obj: &Gc<T>) -> bool {
        let removed = {
            let mut guarded = self.guarded.borrow_mut();
            guarded
                .iter()
                .position(|g| Gc::ptr_eq(g, obj))
                .map(|pos| guarded.swap_remove(pos))
        };
        removed.is_some()
    }

    pub fn clear(&self) {
        let handles = std::mem::take(&mut *self.guarded.borrow_mut());
        drop(handles);
    }

    pub fn len(&self) -> usize {
        self.guarded.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guarded.borrow().is_empty()
    }
}

impl<T: Default + Reset + Traceable> Drop for Guard<T> {
    fn drop(&mut self) {
        let mut guarded = std::mem::take(self.guarded.get_mut());
        // Release the handles before touching the space: dropping them may
        // reclaim cells, which needs the space borrow.
        guarded.clear();
        if let Some(space_rc) = self.space.upgrade()
            && let Ok(mut space) = space_rc.try_borrow_mut()
        {
            space.return_guard_to_pool(guarded);
        }
    }
}

// ============================================================================
// GcStats
// ============================================================================

/// Statistics about the garbage collector
#[derive(Debug, Clone)]
pub struct GcStats {
    /// Total number of cells (including pooled)
    pub total_objects: usize,
    /// Number of cells in the pool (available for reuse)
    pub pooled_objects: usize,
    pub live_objects: usize,
    /// Live cells that have not survived a collection yet
    pub nursery_objects: usize,
    pub collections: usize,
    pub foreground_finalized: usize,
    pub background_finalized: usize,
    /// Nursery cells reclaimed without finalization
    pub nursery_reclaimed: usize,
    pub relocated: usize,
}

// ============================================================================
// Tests
// ============================================================================
