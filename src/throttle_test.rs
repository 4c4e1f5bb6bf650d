use super::*;

const WINDOW: Duration = Duration::from_secs(20);

#[test]
fn first_trigger_fires_immediately() {
    let mut throttle = ResyncThrottle::new(WINDOW);
    assert!(throttle.trigger(Instant::now()));
    assert!(throttle.deadline().is_none());
}

#[test]
fn triggers_inside_window_collapse_to_one_trailing_fire() {
    let start = Instant::now();
    let mut throttle = ResyncThrottle::new(WINDOW);

    let mut immediate = 0;
    for i in 0..10u64 {
        if throttle.trigger(start + Duration::from_millis(i * 100)) {
            immediate += 1;
        }
    }
    assert_eq!(immediate, 1);
    assert_eq!(throttle.deadline(), Some(start + WINDOW));

    assert!(!throttle.poll(start + Duration::from_secs(19)));
    assert!(throttle.poll(start + WINDOW));
    assert!(!throttle.poll(start + WINDOW));
}

#[test]
fn trigger_after_quiet_window_fires_immediately_again() {
    let start = Instant::now();
    let mut throttle = ResyncThrottle::new(WINDOW);
    assert!(throttle.trigger(start));
    assert!(throttle.trigger(start + WINDOW + Duration::from_millis(1)));
}

#[test]
fn trailing_fire_opens_a_new_window() {
    let start = Instant::now();
    let mut throttle = ResyncThrottle::new(WINDOW);
    throttle.trigger(start);
    throttle.trigger(start + Duration::from_secs(1));
    assert!(throttle.poll(start + WINDOW));

    assert!(!throttle.trigger(start + WINDOW + Duration::from_secs(1)));
    assert_eq!(throttle.deadline(), Some(start + WINDOW * 2));
}

#[test]
fn cancel_drops_pending_fire() {
    let start = Instant::now();
    let mut throttle = ResyncThrottle::new(WINDOW);
    throttle.trigger(start);
    throttle.trigger(start + Duration::from_secs(1));
    throttle.cancel();
    assert!(throttle.deadline().is_none());
    assert!(!throttle.poll(start + WINDOW));
    assert!(throttle.trigger(start + Duration::from_secs(2)));
}
