use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use optolink_link::{LinkManager, LinkName, Reactor};
use optolink_message::{Command, MotorPosition};
use optolink_transport::SerialOpener;
use tracing::{info, warn};

use crate::cmd::send::build_command;
use crate::cmd::{parse_duration, RunArgs};
use crate::exit::{link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, print_status, OutputFormat};

/// Longest single wait for readiness; bounds Ctrl-C and status-poll latency.
const TICK: Duration = Duration::from_millis(200);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.devices.link_config()?;
    let poll_status = args
        .poll_status
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    let status_request = build_command(Command::GetStatus, MotorPosition::default())?;

    let mut links = LinkManager::new(SerialOpener::new(args.devices.serial_config()), &config);
    for name in LinkName::ALL {
        links.set_handler(name, move |link, message| {
            info!(link = %link, fields = message.len(), "received message");
            print_message(&message, Some(link), format);
        });
    }
    links
        .start_all()
        .map_err(|err| link_error("link start failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut reactor = Reactor::new(config.retry_interval);
    let mut received = 0usize;
    let mut last_poll: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        if let Some(interval) = poll_status {
            if last_poll.is_none_or(|at| at.elapsed() >= interval) {
                last_poll = Some(Instant::now());
                if let Err(err) = links.send(LinkName::Motors, &status_request) {
                    warn!(error = %err, "status request failed");
                }
            }
        }

        received += reactor
            .run_once(&mut links, TICK)
            .map_err(|err| link_error("poll failed", err))?;

        if let Some(count) = args.count {
            if received >= count {
                break;
            }
        }
    }

    print_status(&links.status(), format);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
