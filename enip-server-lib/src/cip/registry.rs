//! Object/attribute registry (§4.E): the in-memory map from tag name to
//! typed attribute buffer, plus the logical class/instance addressing that
//! aliases the same tags under CIP's Symbol Object (class 0x6B).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::cip::epath::{symbolic_name, EpathSegment};
use crate::cip::status;
use crate::cip::value::{CipType, Primitive};

/// CIP class ID of the Symbol Object; every tag is exposed as one instance
/// of this class (instance IDs are assigned in creation order, starting at 1).
pub const SYMBOL_OBJECT_CLASS: u16 = 0x6B;

const MAX_EVENTS: usize = 16;

/// A recent access or fault event against one attribute, surfaced to the
/// control plane for test-harness introspection (§10.7).
#[derive(Debug, Clone)]
pub struct Event {
    pub time: SystemTime,
    pub message: String,
}

/// A named tag: its type, its backing buffer, and an optional pre-armed
/// error status (§3).
#[derive(Debug)]
pub struct Attribute {
    pub name: String,
    pub cip_type: CipType,
    pub buffer: Vec<Primitive>,
    pub error: u8,
    pub events: VecDeque<Event>,
}

impl Attribute {
    fn new(name: String, cip_type: CipType, buffer: Vec<Primitive>) -> Self {
        Self { name, cip_type, buffer, error: 0, events: VecDeque::with_capacity(MAX_EVENTS) }
    }

    pub fn is_scalar(&self) -> bool {
        self.buffer.len() == 1
    }

    pub fn record_event(&mut self, message: impl Into<String>) {
        if self.events.len() == MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(Event { time: SystemTime::now(), message: message.into() });
    }
}

/// Error raised when building the registry at startup: the configuration
/// layer is expected to turn this into a fatal exit, not a recoverable path.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate tag name: {0}")]
    DuplicateName(String),
    #[error("tag {0:?} must have at least one element")]
    EmptyArray(String),
}

/// The process-wide tag table. Built once at startup (`create` is the only
/// mutator of the map shape); attribute *contents* are mutated for the
/// process lifetime under each attribute's own lock.
#[derive(Default)]
pub struct TagRegistry {
    tags: HashMap<String, Mutex<Attribute>>,
    /// Creation order, 1-indexed by CIP instance id, for logical addressing
    /// via class 0x6B / instance N.
    order: Vec<String>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tag. Startup only; a duplicate name is a fatal
    /// configuration error (§4.E).
    pub fn create(
        &mut self,
        name: impl Into<String>,
        cip_type: CipType,
        size: usize,
        default: Primitive,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.tags.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        if size == 0 {
            return Err(RegistryError::EmptyArray(name));
        }
        let buffer = vec![default; size];
        self.order.push(name.clone());
        self.tags.insert(name.clone(), Mutex::new(Attribute::new(name, cip_type, buffer)));
        Ok(())
    }

    /// Resolve a decoded path to the attribute it addresses, honoring either
    /// symbolic ANSI segments or logical class/instance segments that map to
    /// the Symbol Object. Unknown symbol or out-of-range instance both yield
    /// `PATH_SEGMENT_ERROR` (§4.E, §8 scenario 4).
    pub fn resolve(&self, segments: &[EpathSegment]) -> Result<&Mutex<Attribute>, u8> {
        if let Some(name) = symbolic_name(segments) {
            return self.tags.get(name).ok_or(status::PATH_SEGMENT_ERROR);
        }

        let class = segments.iter().find_map(|s| match s {
            EpathSegment::ClassId(c) => Some(*c),
            _ => None,
        });
        let instance = segments.iter().find_map(|s| match s {
            EpathSegment::InstanceId(i) => Some(*i),
            _ => None,
        });
        match (class, instance) {
            (Some(SYMBOL_OBJECT_CLASS) | None, Some(instance)) if instance >= 1 => {
                let idx = instance as usize - 1;
                let name = self.order.get(idx).ok_or(status::PATH_SEGMENT_ERROR)?;
                Ok(self.tags.get(name).expect("order and tags stay in sync"))
            }
            _ => Err(status::PATH_SEGMENT_ERROR),
        }
    }

    /// Pre-arm a CIP status to be returned (with no side effects) on every
    /// subsequent access to `name`, until cleared by setting it back to 0.
    pub fn inject_error(&self, name: &str, error_status: u8) -> Result<(), u8> {
        let attr = self.tags.get(name).ok_or(status::PATH_SEGMENT_ERROR)?;
        attr.lock().expect("attribute lock poisoned").error = error_status;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Mutex<Attribute>> {
        self.tags.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
