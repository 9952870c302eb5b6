//! Concurrent appends must neither lose nor duplicate buffered events.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use pulse_appender::test_utils::{ManualClock, RecordingTransport};
use pulse_appender::{AppenderBuilder, Level, LogEvent};
use rstest::rstest;

const THREADS: usize = 8;
const EVENTS_PER_THREAD: usize = 250;

#[rstest]
fn concurrent_appends_are_drained_exactly_once() {
    let transport = RecordingTransport::default();
    let clock = ManualClock::starting_at_secs(1_000);
    let appender = Arc::new(
        AppenderBuilder::new()
            .with_address("http://localhost:9999/json")
            .with_hostname("web-1")
            .with_buffer_size(10)
            .build_with_transport(Box::new(transport.clone()), clock.provider())
            .expect("appender"),
    );

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let appender = Arc::clone(&appender);
            thread::spawn(move || {
                for i in 0..EVENTS_PER_THREAD {
                    let level = if i % 50 == 0 { Level::Error } else { Level::Info };
                    appender.append(LogEvent::new("load", level, &format!("{t}-{i}")));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("appender thread");
    }
    appender.close();

    let mut seen = HashSet::new();
    for index in 0..transport.batch_count() {
        for message in transport.messages(index) {
            assert!(seen.insert(message), "event delivered twice");
        }
    }
    assert_eq!(seen.len(), THREADS * EVENTS_PER_THREAD);
}

#[rstest]
fn per_thread_order_is_preserved() {
    let transport = RecordingTransport::default();
    let clock = ManualClock::starting_at_secs(1_000);
    let appender = AppenderBuilder::new()
        .with_address("http://localhost:9999/json")
        .with_buffer_size(7)
        .build_with_transport(Box::new(transport.clone()), clock.provider())
        .expect("appender");

    for i in 0..20 {
        appender.append(LogEvent::new("seq", Level::Info, &i.to_string()));
    }
    appender.close();

    let delivered: Vec<String> = (0..transport.batch_count())
        .flat_map(|index| transport.messages(index))
        .collect();
    let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    assert_eq!(delivered, expected);
}

#[rstest]
fn close_racing_writers_loses_and_duplicates_nothing() {
    const WRITERS: usize = 4;
    const MAX_PER_WRITER: usize = 100_000;

    let transport = RecordingTransport::default();
    transport.delay_sends(Duration::from_millis(2));
    let clock = ManualClock::starting_at_secs(1_000);
    let appender = Arc::new(
        AppenderBuilder::new()
            .with_address("http://localhost:9999/json")
            .with_buffer_size(5)
            .build_with_transport(Box::new(transport.clone()), clock.provider())
            .expect("appender"),
    );
    let appended = Arc::new(AtomicUsize::new(0));

    let writers: Vec<_> = (0..WRITERS)
        .map(|t| {
            let appender = Arc::clone(&appender);
            let appended = Arc::clone(&appended);
            thread::spawn(move || {
                let mut attempted = Vec::new();
                let mut accepted = Vec::new();
                for i in 0..MAX_PER_WRITER {
                    let id = format!("{t}-{i}");
                    appender.append(LogEvent::new("race", Level::Info, &id));
                    // Still open after the append returned, so close has not
                    // taken the lock yet and the event must be delivered.
                    let open = !appender.is_closed();
                    attempted.push(id.clone());
                    if !open {
                        break;
                    }
                    accepted.push(id);
                    appended.fetch_add(1, Ordering::SeqCst);
                }
                (attempted, accepted)
            })
        })
        .collect();

    while appended.load(Ordering::SeqCst) < 100 {
        thread::sleep(Duration::from_millis(1));
    }
    appender.close();

    let mut attempted = HashSet::new();
    let mut accepted = Vec::new();
    for writer in writers {
        let (tried, kept) = writer.join().expect("writer thread");
        attempted.extend(tried);
        accepted.extend(kept);
    }

    let mut delivered = HashSet::new();
    for index in 0..transport.batch_count() {
        for message in transport.messages(index) {
            assert!(attempted.contains(&message), "unknown event {message}");
            assert!(delivered.insert(message), "event delivered twice");
        }
    }
    for id in &accepted {
        assert!(delivered.contains(id), "event {id} appended before close was lost");
    }
    assert!(attempted.len() > accepted.len(), "writers stopped before close");
    assert_eq!(appender.buffered(), 0);
    assert_eq!(transport.close_count(), 1);
}
