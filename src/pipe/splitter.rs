//! `AudioSplitter`: fan a single upstream sample stream out to N independent
//! downstream sinks, absorbing per-branch back-pressure without blocking the
//! others.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::pipe::{AudioSink, Sample};
use crate::reactor::{Reactor, Signal, SlotId, Timer};

/// Owned-vs-borrowed replacement for a managed/unmanaged sink lifetime
/// flag: rather than a boolean paired with a raw pointer, the distinction
/// is made explicit in the type the splitter actually stores.
pub enum SinkRef {
    /// The splitter holds a strong reference; the sink lives at least as
    /// long as its branch does.
    Owned(Rc<RefCell<dyn AudioSink>>),
    /// The splitter only borrows the sink. If the external owner drops
    /// their reference first, the branch is treated as gone the next time
    /// it would have been written to.
    Borrowed(Weak<RefCell<dyn AudioSink>>),
}

impl SinkRef {
    fn upgrade(&self) -> Option<Rc<RefCell<dyn AudioSink>>> {
        match self {
            SinkRef::Owned(rc) => Some(rc.clone()),
            SinkRef::Borrowed(weak) => weak.upgrade(),
        }
    }
}

struct Branch {
    id: u64,
    sink: SinkRef,
    enabled: bool,
    flushed: bool,
    cursor: usize,
    marked_for_removal: bool,
    resume_slot: Option<SlotId>,
    flushed_slot: Option<SlotId>,
}

/// A pending action queued while the splitter is servicing a call into an
/// external `dyn AudioSink`. Draining this queue from outside any live
/// `RefCell` borrow is what keeps the splitter reentrancy-safe: a branch
/// sink is allowed to call back synchronously via
/// `resume_output`/`all_samples_flushed` from inside `write_samples`/
/// `flush_samples`, and this splitter must not panic on the resulting
/// nested borrow.
enum PostAction {
    DrainBranch(u64),
    CheckCompaction,
    CheckFlush,
    RemoveBranch(u64),
    RunCleanup,
}

struct SplitterState {
    self_weak: Weak<RefCell<SplitterState>>,
    #[allow(dead_code)]
    reactor: Reactor,
    buf: Vec<Sample>,
    branches: Vec<Branch>,
    next_branch_id: u64,
    input_stopped: bool,
    do_flush: bool,
    flush_dispatched: bool,
    cleanup_timer: Option<Timer>,
    pending_actions: VecDeque<PostAction>,
    resume_output: Rc<Signal<()>>,
    all_samples_flushed: Rc<Signal<()>>,
}

impl SplitterState {
    fn min_enabled_cursor(&self) -> usize {
        let mut min = self.buf.len();
        let mut any = false;
        for b in &self.branches {
            if b.enabled {
                any = true;
                min = min.min(b.cursor);
            }
        }
        if any {
            min
        } else {
            self.buf.len()
        }
    }

    fn all_enabled_caught_up(&self) -> bool {
        self.branches
            .iter()
            .filter(|b| b.enabled)
            .all(|b| b.cursor >= self.buf.len())
    }

    /// True while a flush is outstanding, or some enabled branch hasn't
    /// caught up to the shared buffer yet. Removal during either case must
    /// be deferred rather than mutating the branch list underfoot.
    fn is_mid_operation(&self) -> bool {
        self.do_flush || !self.all_enabled_caught_up()
    }

    fn arm_cleanup_timer(&self) {
        if let Some(timer) = &self.cleanup_timer {
            timer.set_enable(true);
        }
    }

    fn add_branch(&mut self, sink: Rc<RefCell<dyn AudioSink>>, managed: bool) -> u64 {
        let id = self.next_branch_id;
        self.next_branch_id += 1;
        let cursor = self.buf.len();

        let weak_for_resume = self.self_weak.clone();
        let resume_slot = sink.borrow().resume_output().connect(move |_| {
            if let Some(state) = weak_for_resume.upgrade() {
                {
                    let mut st = state.borrow_mut();
                    st.pending_actions.push_back(PostAction::DrainBranch(id));
                    st.pending_actions.push_back(PostAction::CheckCompaction);
                }
                pump(&state);
            }
        });

        let weak_for_flush = self.self_weak.clone();
        let flushed_slot = sink.borrow().all_samples_flushed().connect(move |_| {
            if let Some(state) = weak_for_flush.upgrade() {
                {
                    let mut st = state.borrow_mut();
                    if let Some(b) = st.branches.iter_mut().find(|b| b.id == id) {
                        b.flushed = true;
                    }
                    st.pending_actions.push_back(PostAction::CheckFlush);
                }
                pump(&state);
            }
        });

        let sink_ref = if managed {
            SinkRef::Owned(sink)
        } else {
            SinkRef::Borrowed(Rc::downgrade(&sink))
        };

        self.branches.push(Branch {
            id,
            sink: sink_ref,
            enabled: true,
            flushed: false,
            cursor,
            marked_for_removal: false,
            resume_slot: Some(resume_slot),
            flushed_slot: Some(flushed_slot),
        });
        id
    }
}

fn pump(state: &Rc<RefCell<SplitterState>>) {
    loop {
        let actions = {
            let mut s = state.borrow_mut();
            if s.pending_actions.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut s.pending_actions))
            }
        };
        match actions {
            None => break,
            Some(actions) => {
                for action in actions {
                    process_action(state, action);
                }
            }
        }
    }
}

fn process_action(state: &Rc<RefCell<SplitterState>>, action: PostAction) {
    match action {
        PostAction::DrainBranch(id) => drain_branch(state, id),
        PostAction::CheckCompaction => check_compaction(state),
        PostAction::CheckFlush => check_flush(state),
        PostAction::RemoveBranch(id) => {
            remove_branch_now(state, id);
            check_compaction(state);
        }
        PostAction::RunCleanup => run_cleanup(state),
    }
}

/// Write as much of the shared buffer as branch `id` will currently accept.
/// Never holds `state`'s borrow while calling into the branch's `dyn
/// AudioSink` — that call may synchronously re-enter this module via the
/// branch's own `resume_output`/`all_samples_flushed` signals.
fn drain_branch(state: &Rc<RefCell<SplitterState>>, id: u64) {
    enum Step {
        Skip,
        Gone,
        Ready(Rc<RefCell<dyn AudioSink>>, usize, Vec<Sample>),
    }

    let step = {
        let s = state.borrow();
        match s.branches.iter().find(|b| b.id == id) {
            None => Step::Skip,
            Some(b) if !b.enabled || b.cursor >= s.buf.len() => Step::Skip,
            Some(b) => match b.sink.upgrade() {
                Some(rc) => Step::Ready(rc, b.cursor, s.buf[b.cursor..].to_vec()),
                None => Step::Gone,
            },
        }
    };

    match step {
        Step::Skip => {}
        Step::Gone => {
            {
                let mut s = state.borrow_mut();
                if let Some(b) = s.branches.iter_mut().find(|b| b.id == id) {
                    b.enabled = false;
                }
            }
            remove_branch_now(state, id);
            check_compaction(state);
        }
        Step::Ready(sink_rc, cursor, chunk) => {
            let accepted = sink_rc.borrow_mut().write_samples(&chunk);
            let mut s = state.borrow_mut();
            if let Some(b) = s.branches.iter_mut().find(|b| b.id == id) {
                let new_cursor = cursor + accepted;
                b.cursor = new_cursor;
                if new_cursor < s.buf.len() {
                    s.input_stopped = true;
                }
            }
        }
    }
}

/// Compact the shared buffer once every enabled branch has caught up, and
/// re-check whether a pending flush can now start or complete.
fn check_compaction(state: &Rc<RefCell<SplitterState>>) {
    let resume_needed = {
        let mut s = state.borrow_mut();
        if s.buf.is_empty() || !s.all_enabled_caught_up() {
            false
        } else {
            let was_stopped = s.input_stopped;
            s.buf.clear();
            for b in s.branches.iter_mut() {
                b.cursor = 0;
            }
            s.input_stopped = false;
            was_stopped
        }
    };
    if resume_needed {
        log::trace!("splitter: all branches drained, resuming upstream");
        let signal = state.borrow().resume_output.clone();
        signal.emit(());
    }
    check_flush(state);
}

/// Dispatch `flush_samples` to enabled branches if a flush is pending and
/// the input isn't currently stopped, and/or complete the flush if every
/// live enabled branch has acknowledged. The enabled-branch set and each
/// branch's `flushed` flag are read fresh every call, so a branch removed
/// mid-flush can never desynchronize the count.
fn check_flush(state: &Rc<RefCell<SplitterState>>) {
    let to_dispatch: Option<Vec<Rc<RefCell<dyn AudioSink>>>> = {
        let mut s = state.borrow_mut();
        if s.do_flush && !s.flush_dispatched && !s.input_stopped {
            s.flush_dispatched = true;
            for b in s.branches.iter_mut().filter(|b| b.enabled) {
                b.flushed = false;
            }
            Some(
                s.branches
                    .iter()
                    .filter(|b| b.enabled)
                    .filter_map(|b| b.sink.upgrade())
                    .collect(),
            )
        } else {
            None
        }
    };
    if let Some(sinks) = to_dispatch {
        for sink in sinks {
            sink.borrow_mut().flush_samples();
        }
    }

    let complete = {
        let mut s = state.borrow_mut();
        if !s.do_flush {
            false
        } else {
            let mut any_enabled = false;
            let mut all_flushed = true;
            for b in s.branches.iter().filter(|b| b.enabled) {
                any_enabled = true;
                if !b.flushed {
                    all_flushed = false;
                }
            }
            if !any_enabled || all_flushed {
                s.do_flush = false;
                s.flush_dispatched = false;
                for b in s.branches.iter_mut() {
                    b.flushed = false;
                }
                true
            } else {
                false
            }
        }
    };
    if complete {
        log::trace!("splitter: flush complete, notifying upstream");
        let signal = state.borrow().all_samples_flushed.clone();
        signal.emit(());
    }
}

fn remove_branch_now(state: &Rc<RefCell<SplitterState>>, id: u64) {
    let removed = {
        let mut s = state.borrow_mut();
        let idx = s.branches.iter().position(|b| b.id == id);
        idx.map(|i| s.branches.remove(i))
    };
    if let Some(branch) = removed {
        if let Some(sink_rc) = branch.sink.upgrade() {
            let sink = sink_rc.borrow();
            if let Some(slot) = branch.resume_slot {
                sink.resume_output().disconnect(slot);
            }
            if let Some(slot) = branch.flushed_slot {
                sink.all_samples_flushed().disconnect(slot);
            }
        }
    }
}

fn run_cleanup(state: &Rc<RefCell<SplitterState>>) {
    let ids: Vec<u64> = {
        let s = state.borrow();
        s.branches
            .iter()
            .filter(|b| b.marked_for_removal)
            .map(|b| b.id)
            .collect()
    };
    if ids.is_empty() {
        return;
    }
    for id in ids {
        remove_branch_now(state, id);
    }
    {
        let s = state.borrow();
        if let Some(timer) = &s.cleanup_timer {
            timer.set_enable(false);
        }
    }
    check_compaction(state);
}

/// Fan-out audio pipe node: one upstream, N independent downstream sinks.
///
/// Cheap to clone (shares its internal state), mirroring [`Reactor`]'s
/// handle semantics.
#[derive(Clone)]
pub struct AudioSplitter {
    inner: Rc<RefCell<SplitterState>>,
    resume_output: Rc<Signal<()>>,
    all_samples_flushed: Rc<Signal<()>>,
}

impl AudioSplitter {
    pub fn new(reactor: Reactor) -> Self {
        let resume_output = Rc::new(Signal::new());
        let all_samples_flushed = Rc::new(Signal::new());
        let state = Rc::new(RefCell::new(SplitterState {
            self_weak: Weak::new(),
            reactor: reactor.clone(),
            buf: Vec::new(),
            branches: Vec::new(),
            next_branch_id: 0,
            input_stopped: false,
            do_flush: false,
            flush_dispatched: false,
            cleanup_timer: None,
            pending_actions: VecDeque::new(),
            resume_output: resume_output.clone(),
            all_samples_flushed: all_samples_flushed.clone(),
        }));
        state.borrow_mut().self_weak = Rc::downgrade(&state);

        let timer = reactor.create_timer(0, false);
        let weak_for_timer = Rc::downgrade(&state);
        timer.expired().connect(move |_| {
            if let Some(s) = weak_for_timer.upgrade() {
                s.borrow_mut()
                    .pending_actions
                    .push_back(PostAction::RunCleanup);
                pump(&s);
            }
        });
        state.borrow_mut().cleanup_timer = Some(timer);

        Self {
            inner: state,
            resume_output,
            all_samples_flushed,
        }
    }

    /// Attach a downstream sink as a new, enabled branch. Its cursor starts
    /// at the current buffer length, so already-buffered samples are not
    /// replayed to a freshly attached sink.
    ///
    /// `managed = true` has the splitter hold the sink alive
    /// ([`SinkRef::Owned`]); `managed = false` only borrows it
    /// ([`SinkRef::Borrowed`]) and the caller is responsible for keeping
    /// their own `Rc` alive for as long as the branch should function.
    ///
    /// Returns a branch id used by [`Self::remove_sink`] and
    /// [`Self::enable_sink`] in place of the source's pointer-identity
    /// lookup.
    pub fn add_sink(&self, sink: Rc<RefCell<dyn AudioSink>>, managed: bool) -> u64 {
        self.inner.borrow_mut().add_branch(sink, managed)
    }

    /// Remove a branch. If the splitter is mid write/flush, the removal is
    /// deferred to a zero-delay cleanup timer.
    pub fn remove_sink(&self, id: u64) {
        let state = &self.inner;
        let defer = {
            let mut s = state.borrow_mut();
            let present = s.branches.iter().any(|b| b.id == id);
            debug_assert!(present, "remove_sink: no such branch");
            if !present {
                return;
            }
            let defer = s.is_mid_operation();
            if defer {
                if let Some(b) = s.branches.iter_mut().find(|b| b.id == id) {
                    b.marked_for_removal = true;
                }
            } else {
                s.pending_actions.push_back(PostAction::RemoveBranch(id));
            }
            defer
        };
        if defer {
            self.inner.borrow().arm_cleanup_timer();
        } else {
            pump(state);
        }
    }

    pub fn remove_all_sinks(&self) {
        let state = &self.inner;
        let defer = {
            let mut s = state.borrow_mut();
            let defer = s.is_mid_operation();
            let ids: Vec<u64> = s.branches.iter().map(|b| b.id).collect();
            if defer {
                for id in ids {
                    if let Some(b) = s.branches.iter_mut().find(|b| b.id == id) {
                        b.marked_for_removal = true;
                    }
                }
            } else {
                for id in ids {
                    s.pending_actions.push_back(PostAction::RemoveBranch(id));
                }
            }
            defer
        };
        if defer {
            self.inner.borrow().arm_cleanup_timer();
        } else {
            pump(state);
        }
    }

    /// Toggle a branch's enabled flag. Re-enabling advances the branch's
    /// cursor to the current buffer length rather than replaying history.
    pub fn enable_sink(&self, id: u64, enable: bool) {
        let state = &self.inner;
        {
            let mut s = state.borrow_mut();
            let buf_len = s.buf.len();
            if let Some(b) = s.branches.iter_mut().find(|b| b.id == id) {
                if enable && !b.enabled {
                    b.cursor = buf_len;
                }
                b.enabled = enable;
            }
            s.pending_actions.push_back(PostAction::CheckCompaction);
        }
        pump(state);
    }

    /// Append `samples` to the shared buffer and drive every enabled
    /// branch. Returns how many leading samples of `samples` the splitter
    /// was able to absorb (i.e. how far `min(branch.cursor)` advanced),
    /// which may be less than `samples.len()` under back-pressure.
    pub fn write_samples(&self, samples: &[Sample]) -> usize {
        if samples.is_empty() {
            return 0;
        }
        let state = &self.inner;
        let prev_min = state.borrow().min_enabled_cursor();
        {
            let mut s = state.borrow_mut();
            s.buf.extend_from_slice(samples);
            let ids: Vec<u64> = s.branches.iter().map(|b| b.id).collect();
            for id in ids {
                s.pending_actions.push_back(PostAction::DrainBranch(id));
            }
            s.pending_actions.push_back(PostAction::CheckCompaction);
        }
        pump(state);
        let new_min = state.borrow().min_enabled_cursor();
        new_min.saturating_sub(prev_min)
    }

    pub fn flush_samples(&self) {
        let state = &self.inner;
        {
            let mut s = state.borrow_mut();
            s.do_flush = true;
            s.pending_actions.push_back(PostAction::CheckFlush);
        }
        pump(state);
    }

    pub fn resume_output(&self) -> &Signal<()> {
        &self.resume_output
    }

    pub fn all_samples_flushed(&self) -> &Signal<()> {
        &self.all_samples_flushed
    }

    pub fn branch_count(&self) -> usize {
        self.inner.borrow().branches.len()
    }

    pub fn enabled_branch_count(&self) -> usize {
        self.inner
            .borrow()
            .branches
            .iter()
            .filter(|b| b.enabled)
            .count()
    }
}

impl AudioSink for AudioSplitter {
    fn write_samples(&mut self, samples: &[Sample]) -> usize {
        AudioSplitter::write_samples(self, samples)
    }

    fn flush_samples(&mut self) {
        AudioSplitter::flush_samples(self)
    }

    fn resume_output(&self) -> &Signal<()> {
        AudioSplitter::resume_output(self)
    }

    fn all_samples_flushed(&self) -> &Signal<()> {
        AudioSplitter::all_samples_flushed(self)
    }
}

impl std::fmt::Debug for AudioSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.inner.borrow();
        f.debug_struct("AudioSplitter")
            .field("branches", &s.branches.len())
            .field("buf_len", &s.buf.len())
            .field("input_stopped", &s.input_stopped)
            .field("do_flush", &s.do_flush)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct AlwaysAcceptSink {
        received: Vec<Sample>,
        resume_output: Signal<()>,
        all_samples_flushed: Signal<()>,
    }

    impl AudioSink for AlwaysAcceptSink {
        fn write_samples(&mut self, samples: &[Sample]) -> usize {
            self.received.extend_from_slice(samples);
            samples.len()
        }
        fn flush_samples(&mut self) {
            self.all_samples_flushed.emit(());
        }
        fn resume_output(&self) -> &Signal<()> {
            &self.resume_output
        }
        fn all_samples_flushed(&self) -> &Signal<()> {
            &self.all_samples_flushed
        }
    }

    /// Accepts half of every write until `ready` flips true, at which point
    /// it accepts everything (models "back-pressured, then released").
    struct HalfThenReadySink {
        ready: Rc<Cell<bool>>,
        received: Vec<Sample>,
        resume_output: Signal<()>,
        all_samples_flushed: Signal<()>,
    }

    impl AudioSink for HalfThenReadySink {
        fn write_samples(&mut self, samples: &[Sample]) -> usize {
            let n = if self.ready.get() {
                samples.len()
            } else {
                samples.len() / 2
            };
            self.received.extend_from_slice(&samples[..n]);
            n
        }
        fn flush_samples(&mut self) {
            self.all_samples_flushed.emit(());
        }
        fn resume_output(&self) -> &Signal<()> {
            &self.resume_output
        }
        fn all_samples_flushed(&self) -> &Signal<()> {
            &self.all_samples_flushed
        }
    }

    /// Never auto-acknowledges a flush; the test drives acknowledgement
    /// manually to model a sink that's still draining downstream.
    #[derive(Default)]
    struct ManualFlushSink {
        received: Vec<Sample>,
        resume_output: Signal<()>,
        all_samples_flushed: Signal<()>,
    }

    impl AudioSink for ManualFlushSink {
        fn write_samples(&mut self, samples: &[Sample]) -> usize {
            self.received.extend_from_slice(samples);
            samples.len()
        }
        fn flush_samples(&mut self) {}
        fn resume_output(&self) -> &Signal<()> {
            &self.resume_output
        }
        fn all_samples_flushed(&self) -> &Signal<()> {
            &self.all_samples_flushed
        }
    }

    #[test]
    fn s1_two_branch_back_pressure() {
        let reactor = Reactor::new();
        let splitter = AudioSplitter::new(reactor);
        let b1 = Rc::new(RefCell::new(AlwaysAcceptSink::default()));
        let ready = Rc::new(Cell::new(false));
        let b2 = Rc::new(RefCell::new(HalfThenReadySink {
            ready: ready.clone(),
            received: Vec::new(),
            resume_output: Signal::new(),
            all_samples_flushed: Signal::new(),
        }));
        splitter.add_sink(b1.clone(), true);
        splitter.add_sink(b2.clone(), true);

        let resumed = Rc::new(Cell::new(0u32));
        {
            let resumed = resumed.clone();
            splitter
                .resume_output()
                .connect(move |_| resumed.set(resumed.get() + 1));
        }

        let samples: Vec<Sample> = (0..10).map(|i| i as Sample).collect();
        let absorbed = splitter.write_samples(&samples);

        assert_eq!(absorbed, 5);
        assert_eq!(b1.borrow().received.len(), 10);
        assert_eq!(b2.borrow().received.len(), 5);
        assert_eq!(resumed.get(), 0);

        ready.set(true);
        b2.borrow().resume_output.emit(());

        assert_eq!(b2.borrow().received.len(), 10);
        assert_eq!(resumed.get(), 1, "resume_output must fire exactly once");
    }

    #[test]
    fn s2_removal_deferred_during_flush() {
        let reactor = Reactor::new();
        let splitter = AudioSplitter::new(reactor.clone());
        let b1 = Rc::new(RefCell::new(ManualFlushSink::default()));
        let b2 = Rc::new(RefCell::new(ManualFlushSink::default()));
        let b1_id = splitter.add_sink(b1.clone(), true);
        let b2_id = splitter.add_sink(b2.clone(), true);

        let flushed = Rc::new(Cell::new(0u32));
        {
            let flushed = flushed.clone();
            splitter
                .all_samples_flushed()
                .connect(move |_| flushed.set(flushed.get() + 1));
        }

        splitter.flush_samples();
        splitter.remove_sink(b2_id);
        assert_eq!(splitter.branch_count(), 2, "removal must be deferred");
        assert_eq!(flushed.get(), 0);

        b1.borrow().all_samples_flushed.emit(());
        assert_eq!(flushed.get(), 0, "b2 has not acknowledged yet");

        assert!(reactor.run_once(), "cleanup timer should be armed");
        assert_eq!(splitter.branch_count(), 1);
        assert_eq!(flushed.get(), 1, "removing the lagging branch completes the flush");
        let _ = b1_id;
    }

    #[test]
    fn new_branch_does_not_replay_buffered_history() {
        let reactor = Reactor::new();
        let splitter = AudioSplitter::new(reactor);
        let b1 = Rc::new(RefCell::new(ManualFlushSink::default()));
        splitter.add_sink(b1.clone(), true);
        splitter.write_samples(&[1.0, 2.0, 3.0]);

        let b2 = Rc::new(RefCell::new(AlwaysAcceptSink::default()));
        splitter.add_sink(b2.clone(), true);
        splitter.write_samples(&[4.0, 5.0]);

        assert_eq!(b2.borrow().received, vec![4.0, 5.0]);
    }

    #[test]
    fn disabled_branch_is_excluded_from_back_pressure_and_not_replayed() {
        let reactor = Reactor::new();
        let splitter = AudioSplitter::new(reactor);
        let b1 = Rc::new(RefCell::new(AlwaysAcceptSink::default()));
        let ready = Rc::new(Cell::new(false));
        let b2 = Rc::new(RefCell::new(HalfThenReadySink {
            ready: ready.clone(),
            received: Vec::new(),
            resume_output: Signal::new(),
            all_samples_flushed: Signal::new(),
        }));
        splitter.add_sink(b1.clone(), true);
        let b2_id = splitter.add_sink(b2.clone(), true);

        splitter.write_samples(&[0.0; 10]);
        assert_eq!(b2.borrow().received.len(), 5);

        splitter.enable_sink(b2_id, false);
        // Disabling the lagging branch lets the buffer fully drain and
        // compact, since b1 (the only enabled branch) already caught up.
        assert_eq!(splitter.write_samples(&[1.0, 1.0]), 2);

        splitter.enable_sink(b2_id, true);
        assert_eq!(b2.borrow().received.len(), 5, "re-enabling must not replay");
    }

    #[test]
    fn flush_completeness_waits_for_every_enabled_branch() {
        let reactor = Reactor::new();
        let splitter = AudioSplitter::new(reactor);
        let b1 = Rc::new(RefCell::new(ManualFlushSink::default()));
        let b2 = Rc::new(RefCell::new(ManualFlushSink::default()));
        splitter.add_sink(b1.clone(), true);
        splitter.add_sink(b2.clone(), true);

        let flushed = Rc::new(Cell::new(0u32));
        {
            let flushed = flushed.clone();
            splitter
                .all_samples_flushed()
                .connect(move |_| flushed.set(flushed.get() + 1));
        }

        splitter.flush_samples();
        b1.borrow().all_samples_flushed.emit(());
        assert_eq!(flushed.get(), 0);
        b2.borrow().all_samples_flushed.emit(());
        assert_eq!(flushed.get(), 1);
    }

    #[test]
    fn remove_all_sinks_when_idle_is_immediate() {
        let reactor = Reactor::new();
        let splitter = AudioSplitter::new(reactor);
        splitter.add_sink(Rc::new(RefCell::new(AlwaysAcceptSink::default())), true);
        splitter.add_sink(Rc::new(RefCell::new(AlwaysAcceptSink::default())), true);
        assert_eq!(splitter.branch_count(), 2);
        splitter.remove_all_sinks();
        assert_eq!(splitter.branch_count(), 0);
    }
}
