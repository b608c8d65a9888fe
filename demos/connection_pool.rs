//! Connection pool example for resource-registry.
//!
//! Demonstrates:
//! - Declaring a process-wide registry with `define_registry!`
//! - Adding a default and a named connection configuration
//! - Many threads asking for the same pool while it is being opened
//! - Shutting the registry down and observing that it stays closed
//!
//! Run with: `cargo run --example connection_pool`

use resource_registry::{define_registry, BoxError, Resource};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

static OPENED: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub max_connections: u32,
}

#[derive(Debug)]
pub struct PgPool {
    pub dsn: String,
    pub max_connections: u32,
    open: AtomicBool,
}

impl Resource for PgPool {
    fn release(&self) -> Result<(), BoxError> {
        if self.open.swap(false, Ordering::SeqCst) {
            println!("   closed pool {}", self.dsn);
        }
        Ok(())
    }
}

pub fn open_pool(config: &PgConfig) -> Result<PgPool, BoxError> {
    if config.max_connections == 0 {
        return Err("max_connections must be positive".into());
    }

    // Stand-in for the handshake with the server.
    thread::sleep(Duration::from_millis(50));
    OPENED.fetch_add(1, Ordering::SeqCst);

    Ok(PgPool {
        dsn: format!(
            "host={} port={} dbname={}",
            config.host, config.port, config.database
        ),
        max_connections: config.max_connections,
        open: AtomicBool::new(true),
    })
}

define_registry!(postgres: PgConfig => PgPool, open_pool);

fn main() {
    println!("=== resource-registry: Connection Pools ===\n");

    // -------------------------------------------------------------------------
    // 1. Register configurations
    // -------------------------------------------------------------------------
    println!("1. Adding configurations...");

    postgres::add_default(PgConfig {
        host: "localhost".to_string(),
        port: 5432,
        database: "app".to_string(),
        max_connections: 16,
    });
    postgres::add(
        "reporting",
        PgConfig {
            host: "replica".to_string(),
            port: 5432,
            database: "app".to_string(),
            max_connections: 4,
        },
    );
    postgres::add(
        "misconfigured",
        PgConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "app".to_string(),
            max_connections: 0,
        },
    );

    println!("   Added: default, reporting, misconfigured (nothing opened yet)");

    // -------------------------------------------------------------------------
    // 2. Concurrent first use
    // -------------------------------------------------------------------------
    println!("\n2. Ten threads ask for the default pool at once...");

    let handles: Vec<_> = (0..10)
        .map(|_| thread::spawn(postgres::get_default))
        .collect();
    let pools: Vec<Arc<PgPool>> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked").expect("pool"))
        .collect();

    let all_same = pools.iter().all(|p| Arc::ptr_eq(p, &pools[0]));
    println!(
        "   Pools opened: {}, all threads share one pool: {}",
        OPENED.load(Ordering::SeqCst),
        all_same
    );

    // -------------------------------------------------------------------------
    // 3. Named pool and failures
    // -------------------------------------------------------------------------
    println!("\n3. Named pools...");

    match postgres::get("reporting") {
        Ok(pool) => println!("   reporting -> {} (max {})", pool.dsn, pool.max_connections),
        Err(err) => println!("   reporting failed: {err}"),
    }
    match postgres::get("misconfigured") {
        Ok(_) => println!("   misconfigured unexpectedly opened"),
        Err(err) => println!("   misconfigured failed: {err}"),
    }
    match postgres::get("unknown") {
        Ok(_) => println!("   unknown unexpectedly opened"),
        Err(err) => println!("   unknown failed: {err}"),
    }

    // -------------------------------------------------------------------------
    // 4. Shutdown
    // -------------------------------------------------------------------------
    println!("\n4. Shutting down...");

    if let Err(err) = postgres::close_all() {
        println!("   shutdown reported: {err}");
    }
    println!("   closing: {}", postgres::is_closing());

    match postgres::get_default() {
        Ok(_) => println!("   default pool still served (unexpected)"),
        Err(err) => println!("   default pool after shutdown: {err}"),
    }

    println!("\n=== Done ===");
}
