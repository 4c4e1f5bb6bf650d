use super::*;

const IDLE_AFTER: Duration = Duration::from_secs(60);

#[test]
fn starts_active_and_unarmed() {
    let tracker = IdleTracker::new(IDLE_AFTER);
    assert_eq!(tracker.state(), UserIdleState::Active);
    assert!(tracker.deadline().is_none());
}

#[test]
fn goes_idle_after_threshold() {
    let start = Instant::now();
    let mut tracker = IdleTracker::new(IDLE_AFTER);
    tracker.start(start);

    assert_eq!(tracker.poll(start + Duration::from_secs(59)), None);
    assert_eq!(tracker.poll(start + IDLE_AFTER), Some(UserIdleState::Idle));
    assert_eq!(tracker.poll(start + IDLE_AFTER * 2), None);
}

#[test]
fn activity_pushes_deadline_back() {
    let start = Instant::now();
    let mut tracker = IdleTracker::new(IDLE_AFTER);
    tracker.start(start);

    let later = start + Duration::from_secs(50);
    assert_eq!(tracker.on_activity(later), None);
    assert_eq!(tracker.poll(start + IDLE_AFTER), None);
    assert_eq!(tracker.deadline(), Some(later + IDLE_AFTER));
}

#[test]
fn activity_after_idle_reports_active_once() {
    let start = Instant::now();
    let mut tracker = IdleTracker::new(IDLE_AFTER);
    tracker.start(start);
    tracker.poll(start + IDLE_AFTER);

    let back = start + IDLE_AFTER + Duration::from_secs(1);
    assert_eq!(tracker.on_activity(back), Some(UserIdleState::Active));
    assert_eq!(tracker.on_activity(back), None);
}

#[test]
fn hidden_page_is_away_and_disarms_idle() {
    let start = Instant::now();
    let mut tracker = IdleTracker::new(IDLE_AFTER);
    tracker.start(start);

    assert_eq!(tracker.on_visibility(true, start), Some(UserIdleState::Away));
    assert_eq!(tracker.poll(start + IDLE_AFTER * 3), None);
    assert_eq!(tracker.on_visibility(false, start + IDLE_AFTER * 3), Some(UserIdleState::Active));
}

#[test]
fn stop_disarms() {
    let start = Instant::now();
    let mut tracker = IdleTracker::new(IDLE_AFTER);
    tracker.start(start);
    tracker.stop();
    assert_eq!(tracker.poll(start + IDLE_AFTER), None);
}

#[test]
fn serializes_lowercase() {
    assert_eq!(serde_json::to_string(&UserIdleState::Away).unwrap(), "\"away\"");
}
