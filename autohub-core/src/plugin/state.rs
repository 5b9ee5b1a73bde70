use std::sync::atomic::{AtomicU8, Ordering};

use tracing::info;

use crate::plugin::LifecycleState;

pub(crate) fn load_state(state: &AtomicU8) -> LifecycleState {
    match state.load(Ordering::Acquire) {
        0 => LifecycleState::New,
        1 => LifecycleState::Starting,
        2 => LifecycleState::Running,
        3 => LifecycleState::Stopping,
        4 => LifecycleState::Stopped,
        _ => LifecycleState::Failed,
    }
}

pub(crate) fn cas_state(state: &AtomicU8, from: LifecycleState, to: LifecycleState) -> bool {
    state
        .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

pub(crate) fn store_state(id: &str, state: &AtomicU8, to: LifecycleState) {
    let from = load_state(state);
    state.store(to as u8, Ordering::Release);
    info!("[{}]{} -> {}", id, from, to);
}
