//! Example: Scan a port specification and optionally kill the owners.
//!
//! ```text
//! cargo run --example scan_ports -- "80,443,3000-3005"
//! cargo run --example scan_ports -- all
//! cargo run --example scan_ports -- 3000 --kill
//! ```

use portsweep_core::{KillSummary, PortSweepEngine, ScanTarget};

fn main() {
    let mut args = std::env::args().skip(1);
    let spec = args.next().unwrap_or_else(|| "all".to_string());
    let kill = args.any(|a| a == "--kill");

    let engine = match PortSweepEngine::new() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to start engine: {}", e);
            std::process::exit(1);
        }
    };

    let target = if spec.eq_ignore_ascii_case("all") {
        ScanTarget::All
    } else if engine.is_valid_input(&spec) {
        ScanTarget::Ports(engine.parse(&spec))
    } else {
        eprintln!("No valid ports in {:?}", spec);
        std::process::exit(2);
    };

    println!("Scanning ports...\n");
    let rows = engine.scan(&target);

    println!(
        "{:<6} {:<8} {:<24} {:<6} {}",
        "PORT", "PID", "PROCESS", "PROTO", "STATE"
    );
    println!("{}", "-".repeat(60));

    for row in &rows {
        let name: String = row.process_name.chars().take(24).collect();
        println!(
            "{:<6} {:<8} {:<24} {:<6} {}",
            row.port,
            row.pid,
            name,
            row.protocol_label(),
            row.state
        );
    }
    println!("\nTotal: {} rows", rows.len());

    if !kill {
        return;
    }

    println!();
    let records = engine.kill_by_port_infos(&rows);
    for record in &records {
        println!("{}", record.display_message());
    }

    let summary = KillSummary::from_records(&records);
    println!(
        "\n{} terminated, {} failed",
        summary.succeeded, summary.failed
    );
}
