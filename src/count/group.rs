use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{GroupCount, State};

/// Locks `mutex`, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Members of one event group, shared by the leader and its followers.
///
/// Members are kept in open order, which is also the order the kernel
/// reports them in a group read: the leader first, then followers as
/// they were attached.
// https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L5773
#[derive(Debug, Default)]
pub(crate) struct Group {
    members: Mutex<Vec<Member>>,
    next_key: AtomicU64,
}

#[derive(Clone, Debug)]
struct Member {
    key: u64,
    label: String,
    state: Arc<AtomicU8>,
}

impl Group {
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    /// Appends a member and returns the key to leave with.
    pub fn join(&self, label: String, state: Arc<AtomicU8>) -> u64 {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let mut members = lock(&self.members);
        log::debug!("{label:?} joined group as member {}", members.len());
        members.push(Member { key, label, state });
        key
    }

    pub fn leave(&self, key: u64) {
        let mut members = lock(&self.members);
        if let Some(at) = members.iter().position(|it| it.key == key) {
            let member = members.remove(at);
            log::debug!("{:?} left group", member.label);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.members).len()
    }

    /// Copies member labels onto a group read, in member order.
    pub fn label(&self, counts: &mut GroupCount) {
        let members = lock(&self.members);
        for (count, member) in counts.values.iter_mut().zip(members.iter()) {
            count.label.clone_from(&member.label);
        }
    }

    /// Moves every healthy member to `state` after a group-wide ioctl.
    pub fn set_state(&self, state: State) {
        for member in lock(&self.members).iter() {
            State::transition(&member.state, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(group: &Group) -> Vec<String> {
        let mut counts = GroupCount {
            values: vec![Default::default(); group.len()],
            ..Default::default()
        };
        group.label(&mut counts);
        counts.values.into_iter().map(|it| it.label).collect()
    }

    fn member(group: &Group, label: &str) -> (u64, Arc<AtomicU8>) {
        let state = Arc::new(AtomicU8::new(State::Open as u8));
        (group.join(label.into(), state.clone()), state)
    }

    #[test]
    fn test_members_in_open_order() {
        let group = Group::new();
        let (_, _) = member(&group, "leader");
        let (b, _) = member(&group, "b");
        let (_, _) = member(&group, "c");
        assert_eq!(labels(&group), ["leader", "b", "c"]);

        group.leave(b);
        assert_eq!(labels(&group), ["leader", "c"]);
        assert_eq!(group.len(), 2);
        group.leave(b);
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_group_state_skips_poisoned() {
        let group = Group::new();
        let (_, leader) = member(&group, "leader");
        let (_, follower) = member(&group, "follower");
        follower.store(State::Poisoned as u8, Ordering::Relaxed);

        group.set_state(State::Enabled);
        assert_eq!(State::load(&leader), State::Enabled);
        assert_eq!(State::load(&follower), State::Poisoned);
    }

    #[test]
    fn test_label_group_read() {
        use crate::count::Count;

        let group = Group::new();
        member(&group, "cycles");
        member(&group, "instructions");
        let mut counts = GroupCount {
            values: vec![Count::default(), Count::default()],
            ..Default::default()
        };
        group.label(&mut counts);
        assert_eq!(counts.get("instructions"), Some(&counts.values[1]));
        assert_eq!(counts.values[0].label, "cycles");
    }
}
