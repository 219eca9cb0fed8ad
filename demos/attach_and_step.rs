// Attach to a suspended JVM (started with suspend=y), watch lifecycle
// events, and single-step the main thread a few times.
//
//   java -agentlib:jdwp=transport=dt_socket,server=y,suspend=y,address=5005 Main

use debugger_core::{
    Connection, CoreSettings, Session, SessionEvent, SessionListener, SessionState,
};
use jdwp_transport::SocketAttachConnector;
use std::sync::Arc;

struct PrintEvents;

impl SessionListener for PrintEvents {
    fn session_event(&self, event: &SessionEvent) {
        let brief = if event.brief { " (brief)" } else { "" };
        println!("  [{}] {:?}{}", event.session, event.kind, brief);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("debugger_core=debug,jdwp_transport=info")
        .init();

    let session = Session::new("demo", CoreSettings::with_jdk_excludes());
    let _events = session.add_listener(Arc::new(PrintEvents))?;

    println!("🔌 Attaching to localhost:5005...");
    let connector = Arc::new(SocketAttachConnector::new("localhost", 5005));
    session.connect(Connection::new(connector)).await?;
    println!("✓ Attached");

    // A VM started with suspend=y reports its start event right after the
    // handshake, which suspends the session with the context captured.
    while !session.is_suspended() {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    println!("✓ Debuggee suspended at VM start");

    for round in 1..=5 {
        let stepper = session.stepper()?;
        match stepper.step_over().await {
            Ok(()) => println!("→ step {} armed", round),
            Err(e) => {
                println!("✗ step failed: {}", e);
                break;
            }
        }

        // Wait for the stop and show where we are.
        while session.state() == SessionState::Connected {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let context = session.context();
        if let (Some(location), Some(transport)) = (context.location(), session.transport()) {
            match transport.describe_location(&location).await {
                Ok(described) => println!("  stopped at {}", described),
                Err(_) => println!("  stopped at {:?}", location),
            }
        }
    }

    println!("👋 Detaching");
    session.disconnect(false).await?;
    Ok(())
}
