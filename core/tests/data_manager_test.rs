use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use trellis_core::{DataFrame, DataManager, Result, Scalar, TrellisError};

mod common;

#[test]
fn loader_runs_on_first_use_only() -> Result<()> {
    let manager = DataManager::new();
    manager.register("gapminder", || Ok(common::gapminder()));
    assert_eq!(manager.load_count("gapminder"), 0);

    let first = manager.get("gapminder")?;
    let second = manager.get("gapminder")?;

    assert_eq!(manager.load_count("gapminder"), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.num_rows(), 12);
    Ok(())
}

#[test]
fn concurrent_first_use_populates_once() {
    let manager = Arc::new(DataManager::new());
    manager.register("slow", || {
        thread::sleep(Duration::from_millis(50));
        Ok(common::gapminder())
    });

    let frames: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                s.spawn(move || manager.get("slow").unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(manager.load_count("slow"), 1);
    assert!(frames.iter().all(|f| Arc::ptr_eq(f, &frames[0])));
}

#[test]
fn reload_runs_the_loader_again() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let manager = DataManager::new();
    let counter = Arc::clone(&calls);
    manager.register("versioned", move || {
        let version = counter.fetch_add(1, Ordering::SeqCst) as i64;
        DataFrame::from_rows(&["version"], vec![vec![version.into()]]).map_err(Into::into)
    });

    let before = manager.get("versioned")?;
    manager.reload("versioned")?;
    let after = manager.get("versioned")?;

    assert_eq!(manager.load_count("versioned"), 2);
    assert_ne!(before, after);
    assert_eq!(after.column("version").unwrap().values()[0], Scalar::Int(1));
    Ok(())
}

#[test]
fn static_frames_never_call_a_loader() -> Result<()> {
    let manager = DataManager::new();
    manager.register_frame("gapminder", common::gapminder());

    assert_eq!(manager.get("gapminder")?.num_rows(), 12);
    assert_eq!(manager.load_count("gapminder"), 0);
    assert_eq!(manager.names(), ["gapminder"]);
    Ok(())
}

#[test]
fn unknown_source_is_an_error() {
    let manager = DataManager::new();
    assert!(matches!(
        manager.get("missing"),
        Err(TrellisError::UnknownDataSource(name)) if name == "missing"
    ));
    assert!(matches!(
        manager.reload("missing"),
        Err(TrellisError::UnknownDataSource(_))
    ));
}

#[test]
fn failed_load_is_not_cached() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let manager = DataManager::new();
    let counter = Arc::clone(&attempts);
    manager.register("flaky", move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err("connection refused".into())
        } else {
            Ok(common::gapminder())
        }
    });

    let first = manager.get("flaky");
    assert!(matches!(
        first,
        Err(TrellisError::DataLoad { ref name, ref message })
            if name == "flaky" && message.contains("connection refused")
    ));

    assert!(manager.get("flaky").is_ok());
    assert_eq!(manager.load_count("flaky"), 2);
}
