//! Generational config arena.
//!
//! Module configurations, emitter configs and render configs all live
//! here, grouped per concrete type, and are referenced by checked
//! [`ConfigHandle`]s. A handle whose slot was freed (generation bumped)
//! resolves to `None`; callers skip the module rather than fault. Freed
//! slots are reissued LIFO before the backing storage grows, and storage
//! never shrinks.

use std::any::{Any, TypeId};
use std::marker::PhantomData;

use ahash::AHashMap;

/// A checked handle into the arena's set for type `T`.
///
/// Handles are only ever valid for the type they were allocated with;
/// the type parameter makes cross-type confusion unrepresentable.
#[derive(Debug)]
pub struct ConfigHandle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

// Manual impls: `T` itself need not be Copy for the handle to be.
impl<T> Clone for ConfigHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ConfigHandle<T> {}

impl<T> PartialEq for ConfigHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<T> Eq for ConfigHandle<T> {}

impl<T> ConfigHandle<T> {
    /// Slot index within the type's set.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation the handle was issued at.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// One type's slot storage.
struct TypedSet<T> {
    slots: Vec<Option<T>>,
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl<T> Default for TypedSet<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> TypedSet<T> {
    fn insert(&mut self, value: T) -> ConfigHandle<T> {
        if let Some(index) = self.free.pop() {
            let i = index as usize;
            self.slots[i] = Some(value);
            ConfigHandle {
                index,
                generation: self.generations[i],
                _marker: PhantomData,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some(value));
            self.generations.push(0);
            ConfigHandle {
                index,
                generation: 0,
                _marker: PhantomData,
            }
        }
    }

    fn live(&self, handle: ConfigHandle<T>) -> bool {
        let i = handle.index as usize;
        i < self.slots.len() && self.generations[i] == handle.generation
    }

    fn get(&self, handle: ConfigHandle<T>) -> Option<&T> {
        if self.live(handle) {
            self.slots[handle.index as usize].as_ref()
        } else {
            None
        }
    }

    fn get_mut(&mut self, handle: ConfigHandle<T>) -> Option<&mut T> {
        if self.live(handle) {
            self.slots[handle.index as usize].as_mut()
        } else {
            None
        }
    }

    fn remove(&mut self, handle: ConfigHandle<T>) -> Option<T> {
        if !self.live(handle) {
            return None;
        }
        let i = handle.index as usize;
        let value = self.slots[i].take();
        if value.is_some() {
            // Bump the generation so stale handles miss.
            self.generations[i] = self.generations[i].wrapping_add(1);
            self.free.push(handle.index);
        }
        value
    }
}

/// Marker trait erasing typed sets.
trait AnySet: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + Sync + 'static> AnySet for TypedSet<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Arena of per-type generational slot sets.
///
/// # Example
///
/// ```
/// use cinder_core::arena::ConfigArena;
///
/// let mut arena = ConfigArena::new();
/// let handle = arena.insert(42u32);
/// assert_eq!(arena.get(handle), Some(&42));
///
/// arena.remove(handle);
/// assert_eq!(arena.get(handle), None);
/// ```
#[derive(Default)]
pub struct ConfigArena {
    sets: AHashMap<TypeId, Box<dyn AnySet>>,
}

impl ConfigArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning a checked handle.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> ConfigHandle<T> {
        self.set_mut::<T>().insert(value)
    }

    /// Resolves a handle; `None` if the slot was freed or never existed.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, handle: ConfigHandle<T>) -> Option<&T> {
        self.set::<T>()?.get(handle)
    }

    /// Mutable resolve; `None` on a stale handle.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self, handle: ConfigHandle<T>) -> Option<&mut T> {
        self.sets
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<TypedSet<T>>()?
            .get_mut(handle)
    }

    /// Removes a value. Freeing a stale handle is a silent no-op.
    pub fn remove<T: Send + Sync + 'static>(&mut self, handle: ConfigHandle<T>) -> Option<T> {
        self.sets
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<TypedSet<T>>()?
            .remove(handle)
    }

    fn set<T: Send + Sync + 'static>(&self) -> Option<&TypedSet<T>> {
        self.sets
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<TypedSet<T>>()
    }

    fn set_mut<T: Send + Sync + 'static>(&mut self) -> &mut TypedSet<T> {
        self.sets
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(TypedSet::<T>::default()))
            .as_any_mut()
            .downcast_mut::<TypedSet<T>>()
            .expect("set registered under its own TypeId")
    }
}

impl std::fmt::Debug for ConfigArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigArena")
            .field("types", &self.sets.len())
            .finish()
    }
}
