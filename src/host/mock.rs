// src/host/mock.rs

//! In-memory stand-in for an X server.
//!
//! A `FakeServer` holds selection owners, window properties and one event
//! queue per window. Each `FakeHost` is one client connection with its own
//! window, so two clipboard services attached to the same server behave like
//! two processes exchanging selections.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use super::{
    Atom, Clock, GraphicsBridge, HostDisplay, HostEvent, Property, SelectionNotify,
    SelectionRequest, WindowId, NONE,
};

/// Atoms the real protocol predefines, with their fixed values.
const PREDEFINED_ATOMS: &[(Atom, &str)] = &[
    (1, "PRIMARY"),
    (2, "SECONDARY"),
    (4, "ATOM"),
    (5, "BITMAP"),
    (6, "CARDINAL"),
    (19, "INTEGER"),
    (20, "PIXMAP"),
    (31, "STRING"),
    (33, "WINDOW"),
];

const FIRST_DYNAMIC_ATOM: Atom = 69;
const FIRST_PIXMAP_ID: u64 = 0x40_0000;

#[derive(Debug)]
struct ServerState {
    atoms_by_name: HashMap<String, Atom>,
    atom_names: HashMap<Atom, String>,
    next_atom: Atom,
    owners: HashMap<Atom, WindowId>,
    properties: HashMap<(WindowId, Atom), Property>,
    queues: HashMap<WindowId, VecDeque<HostEvent>>,
    next_window: WindowId,
    pixmaps: HashMap<u64, Vec<u8>>,
    sent_notifies: Vec<SelectionNotify>,
    /// Windows that answer conversions from a fixed table.
    scripts: HashMap<WindowId, HashMap<Atom, Property>>,
    conversions: Vec<(Atom, Atom)>,
    refuse_interning: bool,
}

/// Shared in-memory server.
#[derive(Debug, Clone)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServer {
    pub fn new() -> Self {
        let mut atoms_by_name = HashMap::new();
        let mut atom_names = HashMap::new();
        for (atom, name) in PREDEFINED_ATOMS {
            atoms_by_name.insert(name.to_string(), *atom);
            atom_names.insert(*atom, name.to_string());
        }
        FakeServer {
            state: Arc::new(Mutex::new(ServerState {
                atoms_by_name,
                atom_names,
                next_atom: FIRST_DYNAMIC_ATOM,
                owners: HashMap::new(),
                properties: HashMap::new(),
                queues: HashMap::new(),
                next_window: 0x20_0001,
                pixmaps: HashMap::new(),
                sent_notifies: Vec::new(),
                scripts: HashMap::new(),
                conversions: Vec::new(),
                refuse_interning: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_window(&self) -> WindowId {
        let mut state = self.lock();
        let window = state.next_window;
        state.next_window += 1;
        state.queues.insert(window, VecDeque::new());
        window
    }

    /// Opens a new client connection with its own window.
    pub fn connect(&self) -> FakeHost {
        FakeHost {
            server: self.clone(),
            window: self.create_window(),
        }
    }

    /// Creates a foreign client that owns `selection` and answers every
    /// conversion immediately: targets named in `responses` get their
    /// property, anything else is refused.
    pub fn scripted_owner(&self, selection: Atom, responses: Vec<(&str, Property)>) -> WindowId {
        let window = self.create_window();
        let script = responses
            .into_iter()
            .map(|(target, value)| (self.intern(target), value))
            .collect();
        let mut state = self.lock();
        state.scripts.insert(window, script);
        state.owners.insert(selection, window);
        window
    }

    /// Creates a foreign client that owns `selection` and never answers.
    pub fn silent_owner(&self, selection: Atom) -> WindowId {
        let window = self.create_window();
        self.force_owner(selection, window);
        window
    }

    /// Every `(selection, target)` conversion requested so far.
    pub fn conversions(&self) -> Vec<(Atom, Atom)> {
        self.lock().conversions.clone()
    }

    /// Makes clients' `intern_atom` fail from now on, as a server out of
    /// resources would. `intern` keeps working for test setup.
    pub fn refuse_interning(&self, refuse: bool) {
        self.lock().refuse_interning = refuse;
    }

    pub fn intern(&self, name: &str) -> Atom {
        let mut state = self.lock();
        if let Some(atom) = state.atoms_by_name.get(name) {
            return *atom;
        }
        let atom = state.next_atom;
        state.next_atom += 1;
        state.atoms_by_name.insert(name.to_string(), atom);
        state.atom_names.insert(atom, name.to_string());
        atom
    }

    pub fn selection_owner(&self, selection: Atom) -> WindowId {
        self.lock().owners.get(&selection).copied().unwrap_or(NONE)
    }

    pub fn property(&self, window: WindowId, property: Atom) -> Option<Property> {
        self.lock().properties.get(&(window, property)).cloned()
    }

    pub fn set_property(&self, window: WindowId, property: Atom, value: Property) {
        self.lock().properties.insert((window, property), value);
    }

    /// Queues an event for `window` as if the server had delivered it.
    pub fn push_event(&self, window: WindowId, event: HostEvent) {
        self.lock().queues.entry(window).or_default().push_back(event);
    }

    /// Removes and returns everything queued for `window`.
    pub fn drain_events(&self, window: WindowId) -> Vec<HostEvent> {
        self.lock()
            .queues
            .get_mut(&window)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Every `SelectionNotify` sent so far, in order.
    pub fn sent_notifies(&self) -> Vec<SelectionNotify> {
        self.lock().sent_notifies.clone()
    }

    pub fn pixmap(&self, id: u64) -> Option<Vec<u8>> {
        self.lock().pixmaps.get(&id).cloned()
    }

    /// Makes `window` own `selection` without any notification, as a
    /// foreign client would.
    pub fn force_owner(&self, selection: Atom, window: WindowId) {
        self.lock().owners.insert(selection, window);
    }
}

/// One client connection to a `FakeServer`.
#[derive(Debug, Clone)]
pub struct FakeHost {
    server: FakeServer,
    window: WindowId,
}

impl FakeHost {
    pub fn server(&self) -> &FakeServer {
        &self.server
    }

    pub fn window(&self) -> WindowId {
        self.window
    }
}

impl HostDisplay for FakeHost {
    fn intern_atom(&self, name: &str) -> Result<Atom> {
        if name.is_empty() {
            return Err(anyhow!("Cannot intern an empty atom name"));
        }
        if self.server.lock().refuse_interning {
            return Err(anyhow!("BadAlloc interning '{}'", name));
        }
        Ok(self.server.intern(name))
    }

    fn atom_name(&self, atom: Atom) -> Option<String> {
        self.server.lock().atom_names.get(&atom).cloned()
    }

    fn selection_window(&self) -> WindowId {
        self.window
    }

    fn set_selection_owner(&self, selection: Atom, owner: WindowId) {
        let mut state = self.server.lock();
        let previous = state.owners.insert(selection, owner).unwrap_or(NONE);
        if previous != NONE && previous != owner {
            state
                .queues
                .entry(previous)
                .or_default()
                .push_back(HostEvent::SelectionClear {
                    window: previous,
                    selection,
                    time: 0,
                });
        }
    }

    fn selection_owner(&self, selection: Atom) -> WindowId {
        self.server.selection_owner(selection)
    }

    fn convert_selection(&self, selection: Atom, target: Atom, property: Atom, requestor: WindowId) {
        let mut state = self.server.lock();
        state.conversions.push((selection, target));
        let owner = state.owners.get(&selection).copied().unwrap_or(NONE);
        let scripted = state
            .scripts
            .get(&owner)
            .map(|script| script.get(&target).cloned());
        if let Some(answer) = scripted {
            let reply_property = match answer {
                Some(value) => {
                    state.properties.insert((requestor, property), value);
                    property
                }
                None => NONE,
            };
            state
                .queues
                .entry(requestor)
                .or_default()
                .push_back(HostEvent::SelectionNotify(SelectionNotify {
                    requestor,
                    selection,
                    target,
                    property: reply_property,
                    time: 0,
                }));
        } else if owner == NONE {
            state
                .queues
                .entry(requestor)
                .or_default()
                .push_back(HostEvent::SelectionNotify(SelectionNotify {
                    requestor,
                    selection,
                    target,
                    property: NONE,
                    time: 0,
                }));
        } else {
            state
                .queues
                .entry(owner)
                .or_default()
                .push_back(HostEvent::SelectionRequest(SelectionRequest {
                    owner,
                    requestor,
                    selection,
                    target,
                    property,
                    time: 0,
                }));
        }
    }

    fn change_property(&self, window: WindowId, property: Atom, value: &Property) {
        self.server.set_property(window, property, value.clone());
    }

    fn get_property(&self, window: WindowId, property: Atom, delete: bool) -> Option<Property> {
        let mut state = self.server.lock();
        if delete {
            state.properties.remove(&(window, property))
        } else {
            state.properties.get(&(window, property)).cloned()
        }
    }

    fn delete_property(&self, window: WindowId, property: Atom) {
        self.server.lock().properties.remove(&(window, property));
    }

    fn send_selection_notify(&self, notify: &SelectionNotify) {
        let mut state = self.server.lock();
        state.sent_notifies.push(*notify);
        state
            .queues
            .entry(notify.requestor)
            .or_default()
            .push_back(HostEvent::SelectionNotify(*notify));
    }

    fn poll_event(&self) -> Option<HostEvent> {
        self.server
            .lock()
            .queues
            .get_mut(&self.window)
            .and_then(|queue| queue.pop_front())
    }

    fn flush(&self) {}

    fn create_pixmap_from_dib(&self, dib: &[u8]) -> Option<u64> {
        let mut state = self.server.lock();
        let id = FIRST_PIXMAP_ID + state.pixmaps.len() as u64;
        state.pixmaps.insert(id, dib.to_vec());
        Some(id)
    }

    fn dib_from_pixmap(&self, pixmap: u64) -> Option<Vec<u8>> {
        self.server.pixmap(pixmap)
    }
}

/// A clock whose time only moves when something sleeps on it.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    now: Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        let start = Instant::now();
        ManualClock {
            start,
            now: Mutex::new(start),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.now() - self.start
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, duration: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += duration;
    }
}

/// Metafile and bitmap stores keyed by handle.
#[derive(Debug, Default)]
pub struct FakeGraphics {
    metafiles: Mutex<HashMap<u32, Vec<u8>>>,
    bitmaps: Mutex<HashMap<u32, Vec<u8>>>,
}

impl FakeGraphics {
    /// Registers a bitmap whose DIB is `dib` and returns its handle.
    pub fn insert_bitmap(&self, dib: &[u8]) -> u32 {
        let mut bitmaps = self.bitmaps.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = 0x800 + bitmaps.len() as u32;
        bitmaps.insert(handle, dib.to_vec());
        handle
    }

    pub fn insert(&self, bits: &[u8]) -> u32 {
        let mut metafiles = self.metafiles.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = 0x100 + metafiles.len() as u32;
        metafiles.insert(handle, bits.to_vec());
        handle
    }

    pub fn bits(&self, handle: u32) -> Option<Vec<u8>> {
        self.metafiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle)
            .cloned()
    }
}

impl GraphicsBridge for FakeGraphics {
    fn bitmap_dib(&self, handle: u32) -> Option<Vec<u8>> {
        self.bitmaps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle)
            .cloned()
    }

    fn metafile_bits(&self, handle: u32) -> Option<Vec<u8>> {
        self.bits(handle)
    }

    fn enh_metafile_bits(&self, handle: u32) -> Option<Vec<u8>> {
        self.bits(handle)
    }

    fn create_metafile(&self, bits: &[u8]) -> Option<u32> {
        Some(self.insert(bits))
    }

    fn create_enh_metafile(&self, bits: &[u8]) -> Option<u32> {
        Some(self.insert(bits))
    }
}
