// Attach to a JVM started with
//   -agentlib:jdwp=transport=dt_socket,server=y,suspend=n,address=5005
// and dump every event set the VM pushes.

use jdwp_transport::{JdwpConnection, JdwpError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("jdwp_transport=debug")
        .init();

    let conn = JdwpConnection::open("localhost", 5005).await?;
    println!("✓ Connected to JVM on localhost:5005");

    let version = conn.get_version().await?;
    println!("✓ {} (JDWP {}.{})", version.vm_name, version.jdwp_major, version.jdwp_minor);
    println!("\n📡 Waiting for events (Ctrl+C to quit)...\n");

    loop {
        match conn.next_event_set().await {
            Ok(set) => {
                println!(
                    "event set (suspend_policy={}):",
                    set.suspend_policy
                );
                for event in &set.events {
                    println!("  request {} → {:?}", event.request_id, event.details);
                }
            }
            Err(JdwpError::Disconnected) => {
                println!("\n👋 Debuggee disconnected");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
