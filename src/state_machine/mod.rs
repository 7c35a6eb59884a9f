//! Hierarchical finite state machine.
//!
//! A natural C++ rendering of this kind of hierarchy uses multiple
//! inheritance: an active leaf object simultaneously *is* every ancestor
//! type, so entering it runs every ancestor's constructor body. Rust has
//! no multiple inheritance, so states here are stateless, `Default`
//! -constructible marker types instead: all of the data a transition might
//! read or write lives in a single user-supplied context `C`, and a state's
//! position in the hierarchy is given by [`StateNode::parent_instance`],
//! walked on demand to reconstruct an ancestor chain whenever one is
//! needed. Two stateless instances of the same type are behaviorally
//! identical, which is what lets [`StateMachine::set_state`] freely
//! construct fresh instances instead of threading a single one through by
//! value.

use std::any::Any;

use crate::reactor::{Reactor, Timer};

/// Blanket downcasting support for `dyn StateNode<C>`, used by
/// [`StateMachine::is_active`] and [`StateMachine::state`].
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Lets [`StateMachine`] obtain a fresh, behaviorally-identical instance of
/// whatever concrete type a `dyn StateNode<C>` trait object wraps, without
/// requiring every state to hand-write a `boxed_default`. The blanket impl
/// below means any type satisfying `StateNode<C> + Default` gets this for
/// free.
pub trait DynDefault<C> {
    fn dyn_default(&self) -> Box<dyn StateNode<C>>;
}

impl<C, T: StateNode<C> + Default + 'static> DynDefault<C> for T {
    fn dyn_default(&self) -> Box<dyn StateNode<C>> {
        Box::new(T::default())
    }
}

/// One node in the state hierarchy.
///
/// `C` is the shared context every state reads and writes through
/// [`StateMachine::context`]/[`StateMachine::context_mut`]; states
/// themselves carry no fields.
pub trait StateNode<C>: AsAny + DynDefault<C> {
    /// This state's immediate parent, or `None` for a top-level state.
    fn parent_instance(&self) -> Option<Box<dyn StateNode<C>>> {
        None
    }

    /// Runs once when the state (or an ancestor newly entered alongside
    /// it) becomes active, root-first.
    fn entry(&self, _machine: &mut StateMachine<C>) {}

    /// Runs once when the state stops being active, leaf-first.
    fn exit(&self, _machine: &mut StateMachine<C>) {}

    /// Runs immediately after `entry`, once this state is installed as
    /// current. A composite state overrides this to cascade into a default
    /// child via [`StateMachine::set_state`].
    fn init(&self, _machine: &mut StateMachine<C>) {}

    /// Runs when the machine's pending timeout fires while this state is
    /// the active leaf.
    fn timeout_event(&self, _machine: &mut StateMachine<C>) {}
}

/// Owns the context, the active state chain, and the single pending
/// timeout a leaf state may arm via [`Self::set_timeout`].
pub struct StateMachine<C> {
    context: C,
    current: Option<Box<dyn StateNode<C>>>,
    reactor: Reactor,
    timeout_timer: Option<Timer>,
}

impl<C: 'static> StateMachine<C> {
    pub fn new(context: C, reactor: Reactor) -> Self {
        Self {
            context,
            current: None,
            reactor,
            timeout_timer: None,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// Enter the machine's initial state. Must be called exactly once,
    /// before any event dispatch.
    pub fn start<T: StateNode<C> + Default + 'static>(&mut self) {
        debug_assert!(self.current.is_none(), "start: state machine already started");
        self.set_state::<T>();
    }

    pub fn is_started(&self) -> bool {
        self.current.is_some()
    }

    /// True if `T` is the active leaf or any of its ancestors.
    pub fn is_active<T: 'static>(&self) -> bool {
        let target = std::any::TypeId::of::<T>();
        let Some(leaf) = self.current.as_ref() else {
            return false;
        };
        if leaf.as_any().type_id() == target {
            return true;
        }
        let mut ancestor = leaf.parent_instance();
        while let Some(a) = ancestor {
            if a.as_any().type_id() == target {
                return true;
            }
            ancestor = a.parent_instance();
        }
        false
    }

    /// Downcast the active leaf to `T`, or `None` if a different state (or
    /// no state) is active.
    pub fn state<T: 'static>(&self) -> Option<&T> {
        self.current.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Arm the machine's single pending timeout. Replaces any previously
    /// armed one. The caller (or a higher-level runtime) is responsible for
    /// connecting `timeout_timer().expired()` to [`Self::dispatch_timeout`]
    /// — `StateMachine` is owned directly rather than share-owned, so it
    /// can't wire that connection to itself.
    pub fn set_timeout(&mut self, ms: u64, periodic: bool) {
        let timer = self.reactor.create_timer(ms, periodic);
        timer.set_enable(true);
        self.timeout_timer = Some(timer);
    }

    /// Disarm the pending timeout, if any. Dropping the [`Timer`] removes
    /// it from the reactor.
    pub fn clear_timeout(&mut self) {
        self.timeout_timer = None;
    }

    pub fn timeout_timer(&self) -> Option<&Timer> {
        self.timeout_timer.as_ref()
    }

    /// Deliver the pending timeout to the active leaf. Any transition
    /// implicitly clears a timeout the outgoing state held, since
    /// `set_state` always clears it first.
    pub fn dispatch_timeout(&mut self) {
        let Some(leaf) = self.current.take() else {
            return;
        };
        self.current = Some(leaf.dyn_default());
        leaf.timeout_event(self);
    }

    /// Transition to `T`. Exits the outgoing chain bottom-up down to (but
    /// excluding) the common ancestor with `T`, then enters the incoming
    /// chain top-down from the common ancestor to `T`, then runs `T::init`.
    /// A nested `set_state` call from within `entry`/`init` (e.g. a
    /// composite state cascading into a default child) composes correctly:
    /// by the time it runs, `self.current` already reflects the outer
    /// transition's target, so the nested call computes its own common
    /// ancestor against that, not against whatever was active before the
    /// outer transition started.
    /// Setting the current state to itself is a no-op: if `T` is already
    /// the active leaf's type, this returns immediately without touching
    /// the timeout or calling any `exit`/`entry`/`init`.
    pub fn set_state<T: StateNode<C> + Default + 'static>(&mut self) {
        if let Some(leaf) = self.current.as_ref() {
            if leaf.as_any().type_id() == std::any::TypeId::of::<T>() {
                return;
            }
        }
        self.clear_timeout();
        let candidate: Box<dyn StateNode<C>> = Box::new(T::default());
        self.set_state_dyn(candidate);
    }

    fn set_state_dyn(&mut self, candidate: Box<dyn StateNode<C>>) {
        let mut new_chain = Self::build_chain(candidate);
        new_chain.reverse(); // root-first

        let old_chain = match self.current.take() {
            Some(leaf) => {
                let mut chain = Self::build_chain(leaf);
                chain.reverse();
                chain
            }
            None => Vec::new(),
        };

        let common_len = old_chain
            .iter()
            .map(|s| s.as_any().type_id())
            .zip(new_chain.iter().map(|s| s.as_any().type_id()))
            .take_while(|(a, b)| a == b)
            .count();

        #[cfg(feature = "state-machine-trace")]
        log::trace!(
            "state machine: exiting {} state(s), common ancestor depth {}",
            old_chain.len().saturating_sub(common_len),
            common_len
        );

        for state in old_chain.into_iter().skip(common_len).rev() {
            state.exit(self);
        }

        let leaf = new_chain.pop().expect("a chain always includes itself");
        for ancestor in new_chain.into_iter().skip(common_len) {
            ancestor.entry(self);
        }
        leaf.entry(self);

        self.current = Some(leaf.dyn_default());
        leaf.init(self);
    }

    fn build_chain(leaf: Box<dyn StateNode<C>>) -> Vec<Box<dyn StateNode<C>>> {
        let mut chain = vec![leaf];
        while let Some(parent) = chain.last().unwrap().parent_instance() {
            chain.push(parent);
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Ctx {
        log: Vec<&'static str>,
    }

    #[derive(Default)]
    struct Idle;
    impl StateNode<Ctx> for Idle {
        fn entry(&self, m: &mut StateMachine<Ctx>) {
            m.context_mut().log.push("Idle::entry");
        }
        fn exit(&self, m: &mut StateMachine<Ctx>) {
            m.context_mut().log.push("Idle::exit");
        }
    }

    #[derive(Default)]
    struct Active;
    impl StateNode<Ctx> for Active {
        fn entry(&self, m: &mut StateMachine<Ctx>) {
            m.context_mut().log.push("Active::entry");
        }
        fn exit(&self, m: &mut StateMachine<Ctx>) {
            m.context_mut().log.push("Active::exit");
        }
        fn init(&self, m: &mut StateMachine<Ctx>) {
            m.context_mut().log.push("Active::init");
            m.set_state::<Receive>();
        }
    }

    #[derive(Default)]
    struct Receive;
    impl StateNode<Ctx> for Receive {
        fn parent_instance(&self) -> Option<Box<dyn StateNode<Ctx>>> {
            Some(Box::new(Active))
        }
        fn entry(&self, m: &mut StateMachine<Ctx>) {
            m.context_mut().log.push("Receive::entry");
        }
        fn exit(&self, m: &mut StateMachine<Ctx>) {
            m.context_mut().log.push("Receive::exit");
        }
    }

    #[derive(Default)]
    struct Transmit;
    impl StateNode<Ctx> for Transmit {
        fn parent_instance(&self) -> Option<Box<dyn StateNode<Ctx>>> {
            Some(Box::new(Active))
        }
        fn entry(&self, m: &mut StateMachine<Ctx>) {
            m.context_mut().log.push("Transmit::entry");
        }
        fn exit(&self, m: &mut StateMachine<Ctx>) {
            m.context_mut().log.push("Transmit::exit");
        }
        fn timeout_event(&self, m: &mut StateMachine<Ctx>) {
            m.context_mut().log.push("Transmit::timeout");
            m.set_state::<Receive>();
        }
    }

    fn machine() -> StateMachine<Ctx> {
        StateMachine::new(Ctx::default(), Reactor::new())
    }

    #[test]
    fn s5_start_cascades_through_composite_init() {
        let mut m = machine();
        m.start::<Active>();
        assert_eq!(
            m.context().log,
            vec!["Active::entry", "Active::init", "Receive::entry"]
        );
        assert!(m.is_active::<Active>());
        assert!(m.is_active::<Receive>());
        assert!(!m.is_active::<Transmit>());
        assert!(m.state::<Receive>().is_some());
    }

    #[test]
    fn s6_sibling_transition_does_not_touch_shared_ancestor() {
        let mut m = machine();
        m.start::<Active>();
        m.context_mut().log.clear();

        m.set_state::<Transmit>();

        assert_eq!(m.context().log, vec!["Receive::exit", "Transmit::entry"]);
        assert!(m.is_active::<Active>(), "shared ancestor stays active");
    }

    #[test]
    fn transition_out_of_root_exits_full_chain() {
        let mut m = machine();
        m.start::<Active>();
        m.context_mut().log.clear();

        m.set_state::<Idle>();

        assert_eq!(m.context().log, vec!["Receive::exit", "Active::exit", "Idle::entry"]);
    }

    #[test]
    fn invariant_transition_clears_pending_timeout() {
        let mut m = machine();
        m.start::<Active>();
        m.set_timeout(50, false);
        assert!(m.timeout_timer().is_some());

        m.set_state::<Transmit>();

        assert!(m.timeout_timer().is_none());
    }

    #[test]
    fn set_state_to_active_leaf_type_is_a_no_op() {
        let mut m = machine();
        m.start::<Active>();
        m.set_timeout(50, false);
        m.context_mut().log.clear();

        m.set_state::<Receive>();

        assert!(m.context().log.is_empty(), "no exit/entry/init must run");
        assert!(m.timeout_timer().is_some(), "timeout must be left armed");
        assert!(m.is_active::<Receive>());
    }

    #[test]
    fn dispatch_timeout_can_cascade_into_a_transition() {
        let mut m = machine();
        m.start::<Active>();
        m.set_state::<Transmit>();
        m.context_mut().log.clear();

        m.dispatch_timeout();

        assert_eq!(
            m.context().log,
            vec!["Transmit::timeout", "Transmit::exit", "Receive::entry"]
        );
    }
}
