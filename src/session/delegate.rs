//! Session delegates
//!
//! Delegates observe session milestones and command lifecycle. They receive
//! the session id rather than the session itself.

use drone_shared::{CameraFile, CommandId, KernelCommand, SessionError};
use parking_lot::RwLock;
use std::sync::Arc;

pub trait SessionDelegate: Send + Sync {
    /// Serial number and firmware version are known
    fn on_initialized(&self, _session_id: &str) {}

    /// A first valid location was observed
    fn on_located(&self, _session_id: &str) {}

    fn on_command_executed(&self, _session_id: &str, _id: CommandId, _command: &KernelCommand) {}

    fn on_command_finished(
        &self,
        _session_id: &str,
        _id: CommandId,
        _command: &KernelCommand,
        _result: &Result<(), SessionError>,
    ) {
    }

    fn on_camera_file_generated(&self, _session_id: &str, _file: &CameraFile) {}

    fn on_closed(&self, _session_id: &str) {}
}

/// Fan-out to registered delegates
///
/// Delegates are invoked outside the lock, so a delegate may add or remove
/// delegates from its callback.
pub struct SessionNotifier {
    id: RwLock<String>,
    delegates: RwLock<Vec<Arc<dyn SessionDelegate>>>,
}

impl SessionNotifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: RwLock::new(id.into()),
            delegates: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> String {
        self.id.read().clone()
    }

    pub fn set_id(&self, id: impl Into<String>) {
        *self.id.write() = id.into();
    }

    pub fn add(&self, delegate: Arc<dyn SessionDelegate>) {
        self.delegates.write().push(delegate);
    }

    /// Register `delegate` and evaluate `missed` under the registration lock.
    ///
    /// Milestones are marked under the same lock by [`Self::initialized_once`]
    /// and [`Self::located_once`], so a milestone either reaches `delegate`
    /// through the fan-out or shows up in `missed`, never both.
    pub fn add_with_replay<R>(
        &self,
        delegate: Arc<dyn SessionDelegate>,
        missed: impl FnOnce() -> R,
    ) -> R {
        let mut delegates = self.delegates.write();
        delegates.push(delegate);
        missed()
    }

    pub fn remove(&self, delegate: &Arc<dyn SessionDelegate>) {
        self.delegates
            .write()
            .retain(|existing| !Arc::ptr_eq(existing, delegate));
    }

    pub fn len(&self) -> usize {
        self.delegates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn invoke(&self, f: impl Fn(&dyn SessionDelegate, &str)) {
        let delegates = self.delegates.read().clone();
        let id = self.id();
        for delegate in delegates {
            f(delegate.as_ref(), &id);
        }
    }

    /// Fan out a one-shot milestone if `mark` reports the first transition
    fn publish_once(
        &self,
        mark: impl FnOnce() -> bool,
        f: impl Fn(&dyn SessionDelegate, &str),
    ) -> bool {
        let delegates = {
            let delegates = self.delegates.read();
            if !mark() {
                return false;
            }
            delegates.clone()
        };
        let id = self.id();
        for delegate in delegates {
            f(delegate.as_ref(), &id);
        }
        true
    }

    pub fn initialized_once(&self, mark: impl FnOnce() -> bool) -> bool {
        self.publish_once(mark, |d, id| d.on_initialized(id))
    }

    pub fn located_once(&self, mark: impl FnOnce() -> bool) -> bool {
        self.publish_once(mark, |d, id| d.on_located(id))
    }

    pub fn command_executed(&self, command_id: CommandId, command: &KernelCommand) {
        self.invoke(|d, id| d.on_command_executed(id, command_id, command));
    }

    pub fn command_finished(
        &self,
        command_id: CommandId,
        command: &KernelCommand,
        result: &Result<(), SessionError>,
    ) {
        self.invoke(|d, id| d.on_command_finished(id, command_id, command, result));
    }

    pub fn camera_file_generated(&self, file: &CameraFile) {
        self.invoke(|d, id| d.on_camera_file_generated(id, file));
    }

    pub fn closed(&self) {
        self.invoke(|d, id| d.on_closed(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl SessionDelegate for Recorder {
        fn on_initialized(&self, session_id: &str) {
            self.events.lock().push(format!("initialized {}", session_id));
        }

        fn on_located(&self, session_id: &str) {
            self.events.lock().push(format!("located {}", session_id));
        }
    }

    #[test]
    fn test_notifies_with_current_id() {
        let notifier = SessionNotifier::new("a");
        let recorder = Arc::new(Recorder::default());
        notifier.add(recorder.clone());

        assert!(notifier.initialized_once(|| true));
        notifier.set_id("b");
        assert!(notifier.located_once(|| true));
        assert!(!notifier.located_once(|| false));

        assert_eq!(
            *recorder.events.lock(),
            vec!["initialized a".to_string(), "located b".to_string()]
        );
    }

    #[test]
    fn test_milestone_reaches_racing_delegate_once() {
        let notifier = Arc::new(SessionNotifier::new("a"));
        let initialized = Arc::new(AtomicBool::new(false));
        let recorder = Arc::new(Recorder::default());
        let mut registration = None;

        notifier.initialized_once(|| {
            // Register from another thread while the milestone is being marked
            let late_notifier = notifier.clone();
            let late_flag = initialized.clone();
            let late = recorder.clone();
            registration = Some(std::thread::spawn(move || {
                let missed =
                    late_notifier.add_with_replay(late.clone(), || late_flag.load(Ordering::SeqCst));
                if missed {
                    late.on_initialized(&late_notifier.id());
                }
            }));
            std::thread::sleep(std::time::Duration::from_millis(50));
            !initialized.swap(true, Ordering::SeqCst)
        });
        registration.unwrap().join().unwrap();

        assert_eq!(*recorder.events.lock(), vec!["initialized a".to_string()]);
        assert_eq!(notifier.len(), 1);
    }

    #[test]
    fn test_remove_by_identity() {
        let notifier = SessionNotifier::new("a");
        let first: Arc<dyn SessionDelegate> = Arc::new(Recorder::default());
        let second: Arc<dyn SessionDelegate> = Arc::new(Recorder::default());
        notifier.add(first.clone());
        notifier.add(second.clone());

        notifier.remove(&first);
        assert_eq!(notifier.len(), 1);
    }
}
