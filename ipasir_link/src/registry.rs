/*!
A process-wide map from native addresses to the data they stand for.

The native side of a callback only carries an address.
So, before a callback which may be passed some data is installed, the data is registered under its address, and a trampoline recovers the data by looking the address up.

The registry does not own anything in a meaningful sense.
An entry keeps its object alive, but the entry is added and removed by the owner of the object, and uniqueness of addresses is the responsibility of whoever supplies them.
A [put] to an address already present replaces the entry.

# Typed access

The raw table is untyped, as the native side is.
[SolverData] puts a type in front of it: a [SolverData] owns its datum, knows its address, registers the datum when a callback is installed with it, and removes the entry when closed (or dropped).
Lookups made by trampolines are typed with [get_typed].

# Concurrency

Lookups come from callbacks, possibly during the solves of many solvers on many threads, and so the table is guarded by a [ShardedLock], which favours concurrent reads.
Writes are serialised with each other and with reads.
*/

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, OnceLock, PoisonError},
};

use crossbeam::sync::ShardedLock;

use crate::{address::NativeAddress, misc::log::targets};

/// An object in the registry.
pub type Entry = Arc<dyn Any + Send + Sync>;

type Table = HashMap<NativeAddress, Entry>;

static REGISTRY: OnceLock<ShardedLock<Table>> = OnceLock::new();

fn table() -> &'static ShardedLock<Table> {
    REGISTRY.get_or_init(|| ShardedLock::new(Table::default()))
}

/// Stores `object` under `address`, returning the object previously stored there, if any.
pub fn put(address: NativeAddress, object: Entry) -> Option<Entry> {
    let mut table = table().write().unwrap_or_else(PoisonError::into_inner);
    let previous = table.insert(address, object);
    if previous.is_some() {
        log::debug!(target: targets::REGISTRY, "Replaced the entry at {address}");
    }
    previous
}

/// The object stored under `address`, if any.
pub fn get(address: NativeAddress) -> Option<Entry> {
    let table = table().read().unwrap_or_else(PoisonError::into_inner);
    table.get(&address).cloned()
}

/// The object stored under `address`, if any and if it is a `D`.
pub fn get_typed<D: Any + Send + Sync>(address: NativeAddress) -> Option<Arc<D>> {
    get(address)?.downcast::<D>().ok()
}

/// Removes and returns the object stored under `address`.
/// Removing an address which is not present does nothing.
pub fn remove(address: NativeAddress) -> Option<Entry> {
    let mut table = table().write().unwrap_or_else(PoisonError::into_inner);
    table.remove(&address)
}

pub fn contains(address: NativeAddress) -> bool {
    let table = table().read().unwrap_or_else(PoisonError::into_inner);
    table.contains_key(&address)
}

/// Removes the entry at `address` only if it is `object`.
fn remove_if_same(address: NativeAddress, object: &Entry) -> bool {
    let mut table = table().write().unwrap_or_else(PoisonError::into_inner);
    match table.get(&address) {
        Some(present) if Arc::ptr_eq(present, object) => {
            table.remove(&address);
            true
        }
        _ => false,
    }
}

/// The data passed to a callback when a callback is given the null address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NullData;

static NULL_DATA: OnceLock<Entry> = OnceLock::new();

/// The data a trampoline should pass on for `address`.
///
/// The null address is never registered, and stands for [NullData].
pub(crate) fn resolve<D: Any + Send + Sync>(address: NativeAddress) -> Option<Arc<D>> {
    match address.is_null() {
        true => NULL_DATA
            .get_or_init(|| Arc::new(NullData))
            .clone()
            .downcast::<D>()
            .ok(),
        false => get_typed::<D>(address),
    }
}

/// Some data for callbacks, together with the address it is known by on the native side.
///
/// By default the address is that of the (shared) allocation holding the data, which is unique while the data lives.
///
/// ```rust
/// # use ipasir_link::registry::{self, SolverData};
/// let data = SolverData::new(vec![1, 2, 3]);
/// assert!(!data.address().is_null());
/// assert_eq!(data.len(), 3);
///
/// // Data is registered when a callback is installed with it, and no sooner.
/// assert!(!registry::contains(data.address()));
/// ```
pub struct SolverData<D: Send + Sync + 'static> {
    address: NativeAddress,
    data: Arc<D>,
}

impl<D: Send + Sync + 'static> SolverData<D> {
    pub fn new(data: D) -> Self {
        let data = Arc::new(data);
        SolverData {
            address: NativeAddress::from(Arc::as_ptr(&data)),
            data,
        }
    }

    /// Data known by a caller supplied address.
    ///
    /// The address should not be shared by any other live data, as a later registration under the same address replaces an earlier one.
    pub fn with_address(address: NativeAddress, data: D) -> Self {
        SolverData {
            address,
            data: Arc::new(data),
        }
    }

    pub fn address(&self) -> NativeAddress {
        self.address
    }

    /// A shared handle on the data.
    pub fn share(&self) -> Arc<D> {
        self.data.clone()
    }

    /// Registers the data under its address, unless the address is null.
    pub(crate) fn register(&self) {
        if self.address.is_null() {
            return;
        }

        let entry: Entry = self.data.clone();
        put(self.address, entry);
        log::trace!(target: targets::REGISTRY, "Registered data at {}", self.address);
    }

    /// Removes the data from the registry.
    ///
    /// Callbacks installed with the data, and still in use, will find nothing at the address from then on.
    pub fn close(self) {}
}

impl SolverData<NullData> {
    /// No data, passed to the native side as the null address.
    pub fn null() -> Self {
        SolverData {
            address: NativeAddress::NULL,
            data: Arc::new(NullData),
        }
    }
}

impl<D: Send + Sync + 'static> std::ops::Deref for SolverData<D> {
    type Target = D;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<D: Send + Sync + 'static> Drop for SolverData<D> {
    fn drop(&mut self) {
        if self.address.is_null() {
            return;
        }

        let entry: Entry = self.data.clone();
        if remove_if_same(self.address, &entry) {
            log::trace!(target: targets::REGISTRY, "Removed data at {}", self.address);
        }
    }
}
