//! Shared ownership of devices and surfaces
//!
//! A [Device] keeps track of the contexts drawing through it in a [ContextRegistry].
//! Contexts are identified by generation checked handles, so a handle of a destroyed context
//! never aliases a context created later in the same slot.

use crate::error::Error;
use std::{cell::RefCell, rc::Rc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    occupied: bool,
}

/// Arena of live context slots.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl ContextRegistry {
    pub fn register(&mut self) -> ContextHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.occupied = true;
            return ContextHandle {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            occupied: true,
        });
        ContextHandle {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    pub fn contains(&self, handle: ContextHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .map(|slot| slot.occupied && slot.generation == handle.generation)
            .unwrap_or(false)
    }

    /// Frees the slot of `handle`, which makes the handle stale.
    pub fn unregister(&mut self, handle: ContextHandle) -> Result<(), Error> {
        if !self.contains(handle) {
            return Err(Error::StaleHandle);
        }
        let slot = &mut self.slots[handle.index as usize];
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn handles(&self) -> impl Iterator<Item = ContextHandle> + '_ {
        self.slots.iter().enumerate().filter(|(_, slot)| slot.occupied).map(|(index, slot)| ContextHandle {
            index: index as u32,
            generation: slot.generation,
        })
    }
}

/// Shared by all surfaces and contexts created from it, lives as long as the last of them.
#[derive(Debug, Default)]
pub struct Device {
    contexts: RefCell<ContextRegistry>,
}

impl Device {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn register_context(&self) -> ContextHandle {
        let handle = self.contexts.borrow_mut().register();
        log::debug!("registered context {:?}", handle);
        handle
    }

    pub(crate) fn unregister_context(&self, handle: ContextHandle) -> Result<(), Error> {
        log::debug!("unregistering context {:?}", handle);
        self.contexts.borrow_mut().unregister(handle)
    }

    pub fn is_live(&self, handle: ContextHandle) -> bool {
        self.contexts.borrow().contains(handle)
    }

    pub fn live_contexts(&self) -> usize {
        self.contexts.borrow().len()
    }

    pub fn context_handles(&self) -> Vec<ContextHandle> {
        self.contexts.borrow().handles().collect()
    }
}

/// Drawing target of a fixed size in pixels.
#[derive(Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    device: Rc<Device>,
}

impl Surface {
    pub fn new(device: &Rc<Device>, width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            width,
            height,
            device: device.clone(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> glam::Vec2 {
        glam::vec2(self.width as f32, self.height as f32)
    }

    pub fn device(&self) -> &Rc<Device> {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_generations() {
        let mut registry = ContextRegistry::default();
        let a = registry.register();
        let b = registry.register();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(a) && registry.contains(b));
        registry.unregister(a).unwrap();
        assert!(!registry.contains(a));
        assert_eq!(registry.unregister(a), Err(Error::StaleHandle));
        let c = registry.register();
        assert_ne!(a, c);
        assert!(!registry.contains(a));
        assert!(registry.contains(c));
        assert_eq!(registry.handles().collect::<Vec<_>>(), vec![c, b]);
        registry.unregister(b).unwrap();
        registry.unregister(c).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_ownership() {
        let device = Device::new();
        let surface = Surface::new(&device, 64, 32);
        assert_eq!(Rc::strong_count(&device), 2);
        assert_eq!(surface.size(), glam::vec2(64.0, 32.0));
        let handle = surface.device().register_context();
        assert!(device.is_live(handle));
        assert_eq!(device.context_handles(), vec![handle]);
        drop(surface);
        assert_eq!(Rc::strong_count(&device), 1);
        device.unregister_context(handle).unwrap();
        assert_eq!(device.live_contexts(), 0);
    }
}
