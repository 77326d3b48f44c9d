// src/clipboard/mod.rs

//! The local clipboard API.
//!
//! `ClipboardService` is the process-wide state: the format registry, the
//! session controller, the format store and the record of which host
//! selections this process claims. It is shared behind an `Arc`; each thread
//! that talks to the host attaches its own connection and gets a
//! `Clipboard`, which is what applications call.
//!
//! The state mutex is only held for in-memory updates. Host round trips and
//! owner/viewer callbacks always run with it released.

pub mod format;
pub mod legacy;
pub mod messages;
pub mod session;
pub mod store;
pub mod text;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use log::{debug, info, trace};

use self::format::{FormatId, FormatRegistry, INVALID_FORMAT};
use self::messages::{ClipboardMessages, NoMessages};
use self::session::{ContextId, Session};
use self::store::{alias_partner, FormatStore};
use crate::config::SelectionConfig;
use crate::error::ClipboardError;
use crate::host::{Atom, Clock, GraphicsBridge, HostDisplay, HostEvent, NullGraphics, SystemClock, WindowId, NONE};
use crate::selection::atoms::SelectionAtoms;
use crate::selection::claim::{SelectionClaims, SelectionMask};
use crate::selection::targets::TargetMap;

pub use self::store::ClipData;

/// Everything guarded by the service mutex.
#[derive(Debug, Default)]
pub(crate) struct ClipboardState {
    pub(crate) session: Session,
    pub(crate) store: FormatStore,
    pub(crate) claims: SelectionClaims,
}

/// Process-wide clipboard state shared by every attached `Clipboard`.
pub struct ClipboardService {
    registry: FormatRegistry,
    state: Mutex<ClipboardState>,
    messages: Arc<dyn ClipboardMessages>,
    graphics: Arc<dyn GraphicsBridge>,
    config: SelectionConfig,
}

impl std::fmt::Debug for ClipboardService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardService")
            .field("registry", &self.registry)
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClipboardService {
    /// A service with no owner/viewer callbacks and no metafile support.
    pub fn new(config: SelectionConfig) -> Arc<Self> {
        Self::with_collaborators(config, Arc::new(NoMessages), Arc::new(NullGraphics))
    }

    pub fn with_collaborators(
        config: SelectionConfig,
        messages: Arc<dyn ClipboardMessages>,
        graphics: Arc<dyn GraphicsBridge>,
    ) -> Arc<Self> {
        Arc::new(ClipboardService {
            registry: FormatRegistry::new(),
            state: Mutex::new(ClipboardState::default()),
            messages,
            graphics,
            config,
        })
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub(crate) fn messages(&self) -> &dyn ClipboardMessages {
        self.messages.as_ref()
    }

    pub(crate) fn graphics(&self) -> &dyn GraphicsBridge {
        self.graphics.as_ref()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ClipboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds a host connection to this service.
    pub fn attach<H: HostDisplay>(self: &Arc<Self>, host: H) -> Result<Clipboard<H>> {
        let atoms = SelectionAtoms::new(&host).context("Failed to prepare selection atoms")?;
        let window = host.selection_window();
        debug!("Clipboard attached to host window {:#x}", window);
        Ok(Clipboard {
            service: Arc::clone(self),
            host,
            targets: TargetMap::new(atoms),
            window,
            clock: Arc::new(SystemClock),
        })
    }
}

/// One host connection's view of the shared clipboard.
pub struct Clipboard<H: HostDisplay> {
    pub(crate) service: Arc<ClipboardService>,
    pub(crate) host: H,
    pub(crate) targets: TargetMap,
    pub(crate) window: WindowId,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<H: HostDisplay> Clipboard<H> {
    /// Replaces the clock used by the inbound conversion wait.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn service(&self) -> &Arc<ClipboardService> {
        &self.service
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub(crate) fn atoms(&self) -> &SelectionAtoms {
        self.targets.atoms()
    }

    pub(crate) fn registry(&self) -> &FormatRegistry {
        self.service.registry()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ClipboardState> {
        self.service.lock()
    }

    /// The selections a successful `set_data` claims.
    pub(crate) fn wanted_selections(&self) -> SelectionMask {
        if self.service.config.use_primary {
            SelectionMask::CLIPBOARD | SelectionMask::PRIMARY
        } else {
            SelectionMask::CLIPBOARD
        }
    }

    pub(crate) fn selection_atom(&self, flag: SelectionMask) -> Atom {
        if flag == SelectionMask::PRIMARY {
            self.atoms().primary
        } else {
            self.atoms().clipboard
        }
    }

    pub fn open(&self, ctx: ContextId) -> Result<(), ClipboardError> {
        let mut state = self.lock();
        state.session.open(ctx)?;
        if state.claims.mask().is_empty() {
            // Whatever a peer advertised last time may be gone; ask again on demand.
            state.store.clear_origin(store::DataOrigin::Host);
        }
        Ok(())
    }

    /// Closes the bracket. Claims are dropped if the bracket left the
    /// clipboard empty, and the viewer is told about changes.
    pub fn close(&self) -> Result<(), ClipboardError> {
        let (outcome, released) = {
            let mut state = self.lock();
            let outcome = state.session.close()?;
            let released = if outcome.changed && state.store.is_empty() {
                state.claims.release_all()
            } else {
                SelectionMask::empty()
            };
            (outcome, released)
        };
        self.release_host_selections(released);
        if let Some(viewer) = outcome.notify_viewer {
            trace!("Notifying clipboard viewer {}", viewer);
            self.service.messages().draw_clipboard(viewer);
        }
        Ok(())
    }

    /// Clears every format and makes the caller owner of record.
    ///
    /// The host selection is not claimed here; that waits for data.
    pub fn empty(&self) -> Result<(), ClipboardError> {
        let previous = {
            let mut state = self.lock();
            let previous = state.session.begin_empty()?;
            state.store.clear();
            previous
        };
        if let Some(previous) = previous {
            debug!("Sending destroy notification to previous owner {}", previous);
            self.service.messages().destroy_clipboard(previous);
        }
        Ok(())
    }

    /// Stores `data` for `id`, or with `None` declares it for delayed
    /// rendering. Returns the stored handle.
    pub fn set_data(&self, id: FormatId, data: Option<Vec<u8>>) -> Result<Option<ClipData>, ClipboardError> {
        if id == INVALID_FORMAT {
            return Err(ClipboardError::FormatAbsent(id));
        }
        let data: Option<ClipData> = data.map(ClipData::from);
        let to_claim = {
            let mut state = self.lock();
            state.session.require_owner()?;
            state.store.set(id, data.clone());
            state.session.mark_changed();
            state.claims.plan_acquire(self.wanted_selections(), self.window)
        };
        trace!(
            "Stored {} ({} bytes)",
            self.registry().describe(id),
            data.as_ref().map_or(0, |d| d.len())
        );
        self.claim_host_selections(to_claim);
        Ok(data)
    }

    /// Returns the data for `id`, rendering, synthesizing or fetching it
    /// from the host owner as needed.
    pub fn get_data(&self, id: FormatId) -> Result<ClipData, ClipboardError> {
        self.lock().session.require_open()?;
        if let Some(data) = self.materialize_local(id) {
            return Ok(data);
        }
        if let Some(selection) = self.peer_selection() {
            return self.import_with_alias(selection, id);
        }
        debug!("{} is not available", self.registry().describe(id));
        Err(ClipboardError::FormatAbsent(id))
    }

    /// Local data for `id`: a stored record, a synthesized alias, or a
    /// delayed format rendered by its owner (one request, one retry).
    pub(crate) fn materialize_local(&self, id: FormatId) -> Option<ClipData> {
        let render = {
            let mut state = self.lock();
            if let Some(data) = state.store.data(id) {
                return Some(data);
            }
            if let Some(data) = state.store.synthesize_alias(id) {
                return Some(data);
            }
            let delayed = if state.store.is_delayed(id) {
                Some(id)
            } else {
                alias_partner(id).filter(|partner| !state.store.contains(id) && state.store.is_delayed(*partner))
            };
            delayed.and_then(|format| state.session.owner().map(|owner| (owner, format)))
        };
        let (owner, format) = render?;
        self.render_delayed(owner, format);
        let mut state = self.lock();
        state.store.data(id).or_else(|| state.store.synthesize_alias(id))
    }

    /// Asks `owner` to render `format` and stores the result if the format
    /// is still waiting for it. Returns whether data was stored.
    fn render_delayed(&self, owner: ContextId, format: FormatId) -> bool {
        debug!("Requesting delayed render of {} from {}", self.registry().describe(format), owner);
        let Some(bytes) = self.service.messages().render_format(owner, format) else {
            debug!("{} did not render {}", owner, self.registry().describe(format));
            return false;
        };
        let mut state = self.lock();
        if state.session.owner() == Some(owner) && state.store.is_delayed(format) {
            state.store.set(format, Some(ClipData::from(bytes)));
            true
        } else {
            debug!("Discarding render of {}: clipboard changed meanwhile", format);
            false
        }
    }

    /// Renders every delayed format of the current owner, as it must before
    /// going away. Returns the number of formats rendered.
    pub fn render_all(&self) -> usize {
        let (owner, delayed) = {
            let state = self.lock();
            match state.session.owner() {
                Some(owner) => (owner, state.store.delayed_ids()),
                None => return 0,
            }
        };
        delayed
            .into_iter()
            .filter(|format| self.render_delayed(owner, *format))
            .count()
    }

    /// The selection to read from when this process does not hold it.
    pub(crate) fn peer_selection(&self) -> Option<Atom> {
        let claimed = self.lock().claims.mask();
        let mut candidates = vec![SelectionMask::CLIPBOARD];
        if self.service.config.use_primary {
            candidates.push(SelectionMask::PRIMARY);
        }
        candidates
            .into_iter()
            .filter(|flag| !claimed.contains(*flag))
            .map(|flag| self.selection_atom(flag))
            .find(|selection| {
                let owner = self.host.selection_owner(*selection);
                owner != NONE && owner != self.window
            })
    }

    /// Number of formats a reader could ask for.
    ///
    /// When a peer owns the selection this probes its TARGETS first, one
    /// round trip per call.
    pub fn count_formats(&self) -> Result<usize, ClipboardError> {
        self.refresh_from_host()?;
        Ok(self.lock().store.available().len())
    }

    /// The format after `prev`, or `INVALID_FORMAT` at the end. Starting a
    /// walk (`prev == 0`) probes the host owner once.
    pub fn enum_formats(&self, prev: FormatId) -> Result<FormatId, ClipboardError> {
        self.lock().session.require_open()?;
        if prev == INVALID_FORMAT {
            self.refresh_from_host()?;
        }
        let available = self.lock().store.available();
        let next = if prev == INVALID_FORMAT {
            available.first().copied()
        } else {
            available
                .iter()
                .position(|id| *id == prev)
                .and_then(|index| available.get(index + 1).copied())
        };
        Ok(next.unwrap_or(INVALID_FORMAT))
    }

    /// Whether `id` is present or can be produced. Formats not held locally
    /// cost a host round trip when a peer owns the selection.
    pub fn is_format_available(&self, id: FormatId) -> bool {
        if id == INVALID_FORMAT {
            return false;
        }
        let locally = {
            let state = self.lock();
            state.store.contains(id) || state.store.can_synthesize(id)
        };
        if locally {
            return true;
        }
        if self.refresh_from_host().is_err() {
            return false;
        }
        let state = self.lock();
        state.store.contains(id) || state.store.can_synthesize(id)
    }

    pub fn register_format(&self, name: &str) -> Result<FormatId, ClipboardError> {
        match self.registry().register(name) {
            INVALID_FORMAT => Err(ClipboardError::InvalidFormatName),
            id => Ok(id),
        }
    }

    /// Name of a registered format. Built-ins have none.
    pub fn format_name(&self, id: FormatId) -> Option<String> {
        self.registry().name_of(id)
    }

    /// Installs `viewer` at the head of the viewer chain and returns the
    /// previous head.
    pub fn set_viewer(&self, viewer: Option<ContextId>) -> Option<ContextId> {
        self.lock().session.set_viewer(viewer)
    }

    pub fn change_viewer_chain(&self, remove: ContextId, next: Option<ContextId>) -> bool {
        self.lock().session.change_viewer_chain(remove, next)
    }

    pub fn viewer(&self) -> Option<ContextId> {
        self.lock().session.viewer()
    }

    /// Owner of record of the current contents.
    pub fn owner(&self) -> Option<ContextId> {
        self.lock().session.owner()
    }

    /// The context holding the open bracket, if any.
    pub fn open_by(&self) -> Option<ContextId> {
        self.lock().session.holder()
    }

    pub fn sequence_number(&self) -> u32 {
        self.lock().session.sequence_number()
    }

    /// Whether this process believes it owns any host selection.
    pub fn owns_selection(&self) -> bool {
        !self.lock().claims.mask().is_empty()
    }

    /// Dispatches one host event.
    pub fn process_event(&self, event: HostEvent) {
        match event {
            HostEvent::SelectionRequest(request) => self.handle_selection_request(&request),
            HostEvent::SelectionClear { window, selection, .. } => {
                if window == self.window {
                    self.handle_selection_clear(selection);
                } else {
                    trace!("SelectionClear for foreign window {:#x}", window);
                }
            }
            HostEvent::SelectionNotify(notify) => {
                trace!("Ignoring unsolicited SelectionNotify for target {}", notify.target);
            }
            HostEvent::PropertyNotify { .. } | HostEvent::Other(_) => {
                trace!("Ignoring host event {:?}", event);
            }
        }
    }

    /// Handles every queued host event. Returns how many were handled.
    pub fn pump_events(&self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.host.poll_event() {
            self.process_event(event);
            handled += 1;
        }
        handled
    }

    pub(crate) fn claim_host_selections(&self, mask: SelectionMask) {
        if mask.is_empty() {
            return;
        }
        for flag in mask.iter() {
            let selection = self.selection_atom(flag);
            self.host.set_selection_owner(selection, self.window);
            info!("Claimed {:?} selection for window {:#x}", flag, self.window);
        }
        self.host.flush();
    }

    /// Gives up the listed selections where this window still owns them.
    pub(crate) fn release_host_selections(&self, mask: SelectionMask) {
        if mask.is_empty() {
            return;
        }
        for flag in mask.iter() {
            let selection = self.selection_atom(flag);
            if self.host.selection_owner(selection) == self.window {
                self.host.set_selection_owner(selection, NONE);
                info!("Released {:?} selection", flag);
            }
        }
        self.host.flush();
    }
}
