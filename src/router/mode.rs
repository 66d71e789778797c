//! 라우팅 모드
//!
//! 현재 대상 연결(마스터/슬레이브)을 추적하는 상태 기계와 스코프 가드

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

// ============================================================================
// Mode - 라우팅 모드
// ============================================================================

/// 라우팅 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// 마스터 (쓰기)
    Master,
    /// 슬레이브 (읽기)
    #[default]
    Slave,
}

impl Mode {
    /// 모드 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Master => "master",
            Mode::Slave => "slave",
        }
    }

    /// 마스터 여부
    pub fn is_master(&self) -> bool {
        matches!(self, Mode::Master)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ModeScope - 모드 공유 범위
// ============================================================================

/// 모드 상태의 공유 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeScope {
    /// 프로세스 전역 (모든 스레드가 하나의 모드를 공유)
    ///
    /// 한 스레드의 마스터 스코프가 다른 스레드의 호출에도 보입니다.
    #[default]
    Global,
    /// 스레드별 모드
    ThreadLocal,
}

// ============================================================================
// ModeState - 모드 상태
// ============================================================================

/// 모드 상태
///
/// 활성 마스터 스코프 수(`depth`)와 고정 플래그(`pinned`)로 구성됩니다.
/// 둘 중 하나라도 있으면 모드는 마스터입니다. 중첩된 스코프 중 안쪽
/// 스코프가 끝나도 바깥 스코프가 남아 있으면 마스터가 유지됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeState {
    depth: usize,
    pinned: bool,
}

impl ModeState {
    /// 현재 모드
    pub fn mode(&self) -> Mode {
        if self.depth > 0 || self.pinned {
            Mode::Master
        } else {
            Mode::Slave
        }
    }

    /// 활성 스코프 수
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 마스터 고정 여부
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    fn is_idle(&self) -> bool {
        self.depth == 0 && !self.pinned
    }

    fn enter(&mut self) {
        self.depth += 1;
    }

    fn exit(&mut self, revert: bool) {
        self.depth = self.depth.saturating_sub(1);
        if !revert {
            self.pinned = true;
        } else if self.depth == 0 {
            self.pinned = false;
        }
    }
}

// ============================================================================
// ModeTracker - 모드 추적기
// ============================================================================

/// 모드 추적기
#[derive(Debug, Default)]
pub struct ModeTracker {
    scope: ModeScope,
    global: Mutex<ModeState>,
    per_thread: Mutex<HashMap<ThreadId, ModeState>>,
}

impl ModeTracker {
    /// 새 추적기 생성
    pub fn new(scope: ModeScope) -> Self {
        Self {
            scope,
            global: Mutex::new(ModeState::default()),
            per_thread: Mutex::new(HashMap::new()),
        }
    }

    /// 공유 범위
    pub fn scope(&self) -> ModeScope {
        self.scope
    }

    /// 현재 상태 스냅샷
    pub fn state(&self) -> ModeState {
        match self.scope {
            ModeScope::Global => *self.global.lock(),
            ModeScope::ThreadLocal => self
                .per_thread
                .lock()
                .get(&thread::current().id())
                .copied()
                .unwrap_or_default(),
        }
    }

    /// 현재 모드
    pub fn mode(&self) -> Mode {
        self.state().mode()
    }

    /// 마스터 스코프 진입
    ///
    /// 반환된 가드가 해제될 때 스코프를 빠져나옵니다. 정상 반환, 에러, 패닉
    /// 언와인드 모두 같은 경로를 탑니다.
    pub fn enter(&self, revert_after: bool) -> MasterScope<'_> {
        let depth = self.update(|state| {
            state.enter();
            state.depth()
        });
        tracing::debug!(depth, revert_after, "entered master scope");

        MasterScope {
            tracker: self,
            revert_after,
            _not_send: PhantomData,
        }
    }

    /// 마스터로 고정 (스코프 없이)
    pub fn set_to_master(&self) {
        self.update(|state| state.pinned = true);
    }

    /// 고정 해제
    ///
    /// 활성 스코프가 남아 있으면 그 스코프가 끝날 때까지 마스터가 유지됩니다.
    pub fn set_to_slave(&self) {
        self.update(|state| state.pinned = false);
    }

    /// 스레드별 상태를 보유한 스레드 수
    pub fn tracked_threads(&self) -> usize {
        self.per_thread.lock().len()
    }

    fn exit(&self, revert_after: bool) {
        let state = self.update(|state| {
            state.exit(revert_after);
            *state
        });
        tracing::debug!(
            depth = state.depth(),
            mode = %state.mode(),
            "left master scope"
        );
    }

    fn update<R>(&self, f: impl FnOnce(&mut ModeState) -> R) -> R {
        match self.scope {
            ModeScope::Global => f(&mut self.global.lock()),
            ModeScope::ThreadLocal => {
                let id = thread::current().id();
                let mut states = self.per_thread.lock();
                let state = states.entry(id).or_default();
                let result = f(state);
                let idle = state.is_idle();
                if idle {
                    states.remove(&id);
                }
                result
            }
        }
    }
}

// ============================================================================
// MasterScope - 마스터 스코프 가드
// ============================================================================

/// 마스터 스코프 가드
///
/// 스코프를 연 스레드에서만 해제되어야 하므로 `Send`가 아닙니다.
#[must_use = "the master scope ends as soon as the guard is dropped"]
pub struct MasterScope<'a> {
    tracker: &'a ModeTracker,
    revert_after: bool,
    _not_send: PhantomData<*const ()>,
}

impl MasterScope<'_> {
    /// 해제 시 슬레이브로 되돌리는지 여부
    pub fn revert_after(&self) -> bool {
        self.revert_after
    }
}

impl fmt::Debug for MasterScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterScope")
            .field("revert_after", &self.revert_after)
            .finish()
    }
}

impl Drop for MasterScope<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::warn!("master scope unwinding after panic");
        }
        self.tracker.exit(self.revert_after);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;

    #[test]
    fn test_mode_default() {
        assert_eq!(Mode::default(), Mode::Slave);
        assert_eq!(ModeScope::default(), ModeScope::Global);
        assert_eq!(Mode::Master.to_string(), "master");
        assert!(Mode::Master.is_master());
        assert!(!Mode::Slave.is_master());
    }

    #[test]
    fn test_mode_state_transitions() {
        let mut state = ModeState::default();
        assert_eq!(state.mode(), Mode::Slave);

        state.enter();
        assert_eq!(state.mode(), Mode::Master);
        state.exit(true);
        assert_eq!(state.mode(), Mode::Slave);
        assert!(state.is_idle());
    }

    #[test]
    fn test_mode_state_nested_depth_counting() {
        let mut state = ModeState::default();
        state.enter();
        state.enter();
        assert_eq!(state.depth(), 2);

        state.exit(true);
        assert_eq!(state.mode(), Mode::Master); // 바깥 스코프가 남아 있음

        state.exit(true);
        assert_eq!(state.mode(), Mode::Slave);
    }

    #[test]
    fn test_mode_state_no_revert_pins_master() {
        let mut state = ModeState::default();
        state.enter();
        state.exit(false);
        assert_eq!(state.depth(), 0);
        assert!(state.is_pinned());
        assert_eq!(state.mode(), Mode::Master);

        // 이후 되돌리는 바깥 스코프가 끝나면 고정이 풀림
        state.enter();
        state.exit(true);
        assert_eq!(state.mode(), Mode::Slave);
    }

    #[test]
    fn test_exit_never_underflows() {
        let mut state = ModeState::default();
        state.exit(true);
        assert_eq!(state.depth(), 0);
        assert_eq!(state.mode(), Mode::Slave);
    }

    #[test]
    fn test_tracker_guard_releases() {
        let tracker = ModeTracker::new(ModeScope::Global);
        {
            let _scope = tracker.enter(true);
            assert_eq!(tracker.mode(), Mode::Master);
        }
        assert_eq!(tracker.mode(), Mode::Slave);
    }

    #[test]
    fn test_tracker_guard_releases_on_panic() {
        let tracker = ModeTracker::new(ModeScope::Global);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _scope = tracker.enter(true);
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(tracker.mode(), Mode::Slave);
        assert_eq!(tracker.state().depth(), 0);
    }

    #[test]
    fn test_set_to_slave_inside_scope() {
        let tracker = ModeTracker::new(ModeScope::Global);
        tracker.set_to_master();
        assert_eq!(tracker.mode(), Mode::Master);

        let scope = tracker.enter(true);
        tracker.set_to_slave();
        assert_eq!(tracker.mode(), Mode::Master);
        drop(scope);
        assert_eq!(tracker.mode(), Mode::Slave);
    }

    #[test]
    fn test_global_scope_is_shared_between_threads() {
        let tracker = Arc::new(ModeTracker::new(ModeScope::Global));
        let _scope = tracker.enter(true);

        let other = Arc::clone(&tracker);
        let seen = thread::spawn(move || other.mode()).join().unwrap();
        assert_eq!(seen, Mode::Master);
    }

    #[test]
    fn test_thread_local_scope_is_isolated() {
        let tracker = Arc::new(ModeTracker::new(ModeScope::ThreadLocal));
        let scope = tracker.enter(true);
        assert_eq!(tracker.mode(), Mode::Master);
        assert_eq!(tracker.tracked_threads(), 1);

        let other = Arc::clone(&tracker);
        let seen = thread::spawn(move || other.mode()).join().unwrap();
        assert_eq!(seen, Mode::Slave);

        drop(scope);
        assert_eq!(tracker.mode(), Mode::Slave);
        assert_eq!(tracker.tracked_threads(), 0);
    }
}
