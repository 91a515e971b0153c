#![cfg(feature = "test-utils")]

use std::thread;
use std::time::Duration;

use rand::Rng;
use sql_mapper::prelude::*;
use sql_mapper::test_utils::{MemoryDriver, memory_pool, test_config};

fn jitter() -> Duration {
    Duration::from_millis(rand::rng().random_range(1..=5))
}

#[test]
fn strict_pool_never_exceeds_its_size() -> Result<(), OrmError> {
    const WORKERS: usize = 16;
    let (pool, driver) = memory_pool(test_config(DriverKind::MySql, 4))?;

    let completed = thread::scope(|scope| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                scope.spawn(|| -> Result<(), OrmError> {
                    for _ in 0..5 {
                        let mut conn = pool.acquire()?;
                        assert!(conn.is_valid());
                        thread::sleep(jitter());
                    }
                    Ok(())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .filter(Result::is_ok)
            .count()
    });

    assert_eq!(completed, WORKERS);
    assert!(driver.max_live_connections() <= 4);
    let status = pool.status();
    assert_eq!(status.idle, status.live);
    assert_eq!(status.capacity, 4);
    Ok(())
}

#[test]
fn burst_pool_overflows_within_bound_and_shrinks_back() -> Result<(), OrmError> {
    let mut cfg = test_config(DriverKind::Postgres, 2);
    cfg.acquire_policy = AcquirePolicy::Burst;
    cfg.max_overflow = 2;
    let (pool, driver) = memory_pool(cfg)?;

    thread::scope(|scope| {
        for _ in 0..12 {
            scope.spawn(|| {
                let _conn = pool.acquire().expect("acquire");
                thread::sleep(jitter());
            });
        }
    });

    assert!(driver.max_live_connections() <= 4);
    assert!(pool.status().live <= 2);
    assert_eq!(pool.status().capacity, 4);
    Ok(())
}

#[test]
fn stale_connections_are_replaced_on_acquire() -> Result<(), OrmError> {
    let (pool, driver) = memory_pool(test_config(DriverKind::MySql, 1))?;
    let opened = driver.connections_opened();

    driver.invalidate_connections();
    {
        let mut conn = pool.acquire()?;
        assert!(conn.is_valid());
    }
    assert_eq!(driver.connections_opened(), opened + 1);
    assert_eq!(pool.status().live, 1);
    assert_eq!(driver.live_connections(), 1);
    Ok(())
}

#[test]
fn failed_replacement_is_a_connection_error() -> Result<(), OrmError> {
    let (pool, driver) = memory_pool(test_config(DriverKind::MySql, 1))?;
    driver.invalidate_connections();
    driver.refuse_connects(true);

    let err = pool.acquire().err().expect("replacement must fail");
    assert!(matches!(err, OrmError::Connection(_)));
    assert_eq!(pool.status().live, 0);

    driver.refuse_connects(false);
    assert!(pool.acquire().is_ok());
    Ok(())
}

#[test]
fn short_warm_up_is_filled_lazily() -> Result<(), OrmError> {
    let driver = MemoryDriver::new();
    driver.fail_next_connects(2);
    let pool = ConnectionPool::with_driver(test_config(DriverKind::MySql, 3), driver.boxed())?;
    assert_eq!(pool.status().live, 1);

    let a = pool.acquire()?;
    let b = pool.acquire()?;
    let c = pool.acquire()?;
    assert_eq!(pool.status().live, 3);
    drop((a, b, c));
    assert_eq!(pool.status().idle, 3);
    Ok(())
}

#[test]
fn unreachable_backend_fails_instead_of_blocking() -> Result<(), OrmError> {
    let driver = MemoryDriver::new();
    driver.refuse_connects(true);
    let pool = ConnectionPool::with_driver(test_config(DriverKind::MySql, 2), driver.boxed())?;
    assert_eq!(pool.status().live, 0);
    assert!(matches!(pool.acquire(), Err(OrmError::Connection(_))));
    Ok(())
}

#[test]
fn acquire_timeout_is_honored() -> Result<(), OrmError> {
    let mut cfg = test_config(DriverKind::MySql, 1);
    cfg.acquire_timeout_ms = Some(50);
    let (pool, _driver) = memory_pool(cfg)?;

    let held = pool.acquire()?;
    let err = pool.acquire().err().expect("pool is exhausted");
    assert!(err.to_string().contains("timed out"));
    drop(held);
    assert!(pool.acquire().is_ok());
    Ok(())
}

#[test]
fn waiter_wakes_when_a_lease_is_returned() -> Result<(), OrmError> {
    let (pool, _driver) = memory_pool(test_config(DriverKind::MySql, 1))?;
    let held = pool.acquire()?;

    thread::scope(|scope| {
        let waiter = scope.spawn(|| pool.acquire().map(|_| ()));
        thread::sleep(Duration::from_millis(20));
        drop(held);
        waiter.join().expect("waiter panicked")
    })?;
    assert_eq!(pool.status().idle, 1);
    Ok(())
}

#[test]
fn lease_is_returned_on_error_paths() -> Result<(), OrmError> {
    fn failing_work(pool: &ConnectionPool) -> Result<(), OrmError> {
        let mut conn = pool.acquire()?;
        conn.execute("NOT SQL AT ALL")?;
        Ok(())
    }

    let (pool, _driver) = memory_pool(test_config(DriverKind::MySql, 1))?;
    assert!(failing_work(&pool).is_err());
    assert_eq!(pool.status().idle, 1);
    Ok(())
}

#[test]
fn mysql_connections_select_the_configured_schema() -> Result<(), OrmError> {
    let (pool, driver) = memory_pool(test_config(DriverKind::MySql, 1))?;
    assert_eq!(driver.active_schema().as_deref(), Some("test_db"));
    assert_eq!(pool.dialect(), Dialect::MySql);

    let (pool, driver) = memory_pool(test_config(DriverKind::Postgres, 1))?;
    assert_eq!(driver.active_schema(), None);
    assert_eq!(pool.dialect(), Dialect::Postgres);
    Ok(())
}

#[test]
fn mysql_without_driver_is_a_connection_error() {
    let err = ConnectionPool::new(test_config(DriverKind::MySql, 1)).unwrap_err();
    assert!(err.to_string().contains("not compiled into this build"));
}

#[test]
fn oversized_pool_is_rejected_before_warm_up() {
    let driver = MemoryDriver::new();
    let err = ConnectionPool::with_driver(
        test_config(DriverKind::Postgres, usize::MAX),
        driver.boxed(),
    )
    .unwrap_err();
    assert!(matches!(err, OrmError::Config(_)));
    assert_eq!(driver.connections_opened(), 0);
}
