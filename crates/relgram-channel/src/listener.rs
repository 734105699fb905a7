use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

/// Observer notified when a tagged packet is acknowledged by the peer.
pub trait AckListener {
    /// Called once per acknowledged tagged packet, with the tag the
    /// sender attached to it.
    fn on_packet_acked(&mut self, tag: i32);
}

/// Registry of listeners held by weak reference.
///
/// The channel never extends a listener's lifetime: entries whose owner
/// has gone away are pruned on the next notification.
pub(crate) struct AckListeners {
    listeners: Vec<Weak<RefCell<dyn AckListener>>>,
}

impl AckListeners {
    pub(crate) fn new() -> Self {
        Self { listeners: Vec::new() }
    }

    pub(crate) fn add<L: AckListener + 'static>(&mut self, listener: &Rc<RefCell<L>>) {
        let listener: Rc<RefCell<dyn AckListener>> = listener.clone();
        let weak: Weak<RefCell<dyn AckListener>> = Rc::downgrade(&listener);
        self.listeners.push(weak);
    }

    pub(crate) fn remove<L: AckListener + 'static>(&mut self, listener: &Rc<RefCell<L>>) {
        let target = Rc::as_ptr(listener) as *const ();
        self.listeners.retain(|weak| weak.as_ptr() as *const () != target);
    }

    pub(crate) fn notify(&mut self, tag: i32) {
        self.listeners.retain(|weak| match weak.upgrade() {
            Some(listener) => {
                listener.borrow_mut().on_packet_acked(tag);
                true
            }
            None => false,
        });
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        tags: Vec<i32>,
    }

    impl AckListener for Recorder {
        fn on_packet_acked(&mut self, tag: i32) {
            self.tags.push(tag);
        }
    }

    #[test]
    fn notifies_registered_listeners() {
        let mut listeners = AckListeners::new();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        listeners.add(&recorder);
        listeners.notify(7);
        listeners.notify(8);
        assert_eq!(recorder.borrow().tags, vec![7, 8]);
    }

    #[test]
    fn removed_listener_is_silent() {
        let mut listeners = AckListeners::new();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        listeners.add(&recorder);
        listeners.remove(&recorder);
        listeners.notify(7);
        assert!(recorder.borrow().tags.is_empty());
    }

    #[test]
    fn dropped_listener_is_pruned() {
        let mut listeners = AckListeners::new();
        {
            let recorder = Rc::new(RefCell::new(Recorder::default()));
            listeners.add(&recorder);
        }
        assert_eq!(listeners.len(), 1);
        listeners.notify(1);
        assert_eq!(listeners.len(), 0);
    }
}
